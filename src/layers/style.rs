//! Paint values and the pure styling functions behind them.
//!
//! Nothing here touches the map; the registry turns these values into
//! `set_paint_property` calls and the headless map evaluates them.

use crate::core::config::Theme;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Density breakpoints (people per km²) of the choropleth ramp
pub const DENSITY_BREAKPOINTS: [f64; 4] = [0.0, 5_000.0, 15_000.0, 25_000.0];

pub const HOVER_WIDTH_DELTA: f64 = 2.0;
pub const HOVER_RADIUS_DELTA: f64 = 2.0;

/// Light theme ramp, every channel non-increasing from stop to stop
pub const LIGHT_DENSITY_STOPS: [Rgba; 4] = [
    Rgba::rgb(254, 240, 217),
    Rgba::rgb(253, 204, 138),
    Rgba::rgb(252, 141, 89),
    Rgba::rgb(215, 48, 31),
];

/// Dark theme ramp, every channel non-decreasing from stop to stop
pub const DARK_DENSITY_STOPS: [Rgba; 4] = [
    Rgba::rgb(30, 41, 59),
    Rgba::rgb(43, 111, 143),
    Rgba::rgb(63, 167, 201),
    Rgba::rgb(165, 243, 252),
];

/// 8-bit RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').filter(|d| d.is_ascii())?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match digits.len() {
            3 => {
                let mut it = digits.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Self::rgb(it.next()??, it.next()??, it.next()??))
            }
            6 => Some(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            8 => Some(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
                channel(&digits[6..8])?,
            )),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Channel-wise linear blend, `t` clamped to `[0, 1]`
    pub fn lerp(&self, other: &Rgba, t: f64) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Relative luminance in `[0, 1]` over the raw sRGB channels
    pub fn luminance(&self) -> f64 {
        (0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64) / 255.0
    }
}

/// Perceived intensity of a choropleth colour: darker reads as denser on a
/// light map, brighter reads as denser on a dark one.
pub fn intensity(color: &Rgba, theme: Theme) -> f64 {
    if theme.is_dark {
        color.luminance()
    } else {
        1.0 - color.luminance()
    }
}

pub fn density_stops(theme: Theme) -> &'static [Rgba; 4] {
    if theme.is_dark {
        &DARK_DENSITY_STOPS
    } else {
        &LIGHT_DENSITY_STOPS
    }
}

/// Piecewise-linear interpolation over `(breakpoint, colour)` stops sorted
/// by breakpoint. Values outside the range clamp to the end stops.
pub fn interpolate_stops(stops: &[(f64, Rgba)], value: f64) -> Option<Rgba> {
    let (first, last) = (stops.first()?, stops.last()?);
    if value.is_nan() || value <= first.0 {
        return Some(first.1);
    }
    if value >= last.0 {
        return Some(last.1);
    }
    stops.windows(2).find_map(|pair| {
        let ((lo, lo_color), (hi, hi_color)) = (pair[0], pair[1]);
        if value >= lo && value < hi {
            Some(lo_color.lerp(&hi_color, (value - lo) / (hi - lo)))
        } else {
            None
        }
    })
}

/// Choropleth colour for a population density under the given theme
pub fn density_color(value: f64, theme: Theme) -> Rgba {
    let stops = density_stop_table(theme);
    interpolate_stops(&stops, value).unwrap_or(stops[0].1)
}

fn density_stop_table(theme: Theme) -> [(f64, Rgba); 4] {
    let colors = density_stops(theme);
    [
        (DENSITY_BREAKPOINTS[0], colors[0]),
        (DENSITY_BREAKPOINTS[1], colors[1]),
        (DENSITY_BREAKPOINTS[2], colors[2]),
        (DENSITY_BREAKPOINTS[3], colors[3]),
    ]
}

pub fn hover_aware_width(base_width: f64, is_hovered: bool) -> f64 {
    if is_hovered {
        base_width + HOVER_WIDTH_DELTA
    } else {
        base_width
    }
}

pub fn hover_aware_radius(base_radius: f64, is_hovered: bool) -> f64 {
    if is_hovered {
        base_radius + HOVER_RADIUS_DELTA
    } else {
        base_radius
    }
}

pub fn background_color(theme: Theme) -> Rgba {
    if theme.is_dark {
        Rgba::rgb(15, 23, 42)
    } else {
        Rgba::rgb(248, 250, 252)
    }
}

/// Density ramp expression for the choropleth fill
pub fn density_fill_expression(theme: Theme) -> PaintValue {
    PaintValue::Interpolate {
        property: "density".to_string(),
        stops: density_stop_table(theme).to_vec(),
    }
}

pub fn hover_width_expression(base_width: f64) -> PaintValue {
    PaintValue::HoverCase {
        base: base_width,
        hovered: hover_aware_width(base_width, true),
    }
}

pub fn hover_radius_expression(base_radius: f64) -> PaintValue {
    PaintValue::HoverCase {
        base: base_radius,
        hovered: hover_aware_radius(base_radius, true),
    }
}

/// Paint properties the engine sets on concrete layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaintProperty {
    FillColor,
    FillOpacity,
    LineColor,
    LineWidth,
    LineOpacity,
    LineDasharray,
    CircleColor,
    CircleRadius,
    CircleStrokeColor,
    CircleStrokeWidth,
}

impl PaintProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaintProperty::FillColor => "fill-color",
            PaintProperty::FillOpacity => "fill-opacity",
            PaintProperty::LineColor => "line-color",
            PaintProperty::LineWidth => "line-width",
            PaintProperty::LineOpacity => "line-opacity",
            PaintProperty::LineDasharray => "line-dasharray",
            PaintProperty::CircleColor => "circle-color",
            PaintProperty::CircleRadius => "circle-radius",
            PaintProperty::CircleStrokeColor => "circle-stroke-color",
            PaintProperty::CircleStrokeWidth => "circle-stroke-width",
        }
    }
}

impl std::fmt::Display for PaintProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paint value: a constant or a data/feature-state driven expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaintValue {
    Color(Rgba),
    Number(f64),
    Numbers(Vec<f64>),
    /// `hovered` while the feature's `hover` state is set, `base` otherwise
    HoverCase { base: f64, hovered: f64 },
    /// Linear colour ramp over a numeric feature property
    Interpolate {
        property: String,
        stops: Vec<(f64, Rgba)>,
    },
}

impl PaintValue {
    pub fn color(hex: &str) -> Self {
        PaintValue::Color(Rgba::from_hex(hex).unwrap_or(Rgba::rgb(0, 0, 0)))
    }

    /// MapLibre style-spec JSON for this value
    pub fn to_expression(&self) -> Value {
        match self {
            PaintValue::Color(c) => json!(c.to_hex()),
            PaintValue::Number(n) => json!(n),
            PaintValue::Numbers(ns) => json!(ns),
            PaintValue::HoverCase { base, hovered } => json!([
                "case",
                ["boolean", ["feature-state", "hover"], false],
                hovered,
                base
            ]),
            PaintValue::Interpolate { property, stops } => {
                let mut expr = vec![json!("interpolate"), json!(["linear"]), json!(["get", property])];
                for (at, color) in stops {
                    expr.push(json!(at));
                    expr.push(json!(color.to_hex()));
                }
                Value::Array(expr)
            }
        }
    }

    /// Numeric value for a feature with the given hover flag
    pub fn resolve_number(&self, hovered: bool) -> Option<f64> {
        match self {
            PaintValue::Number(n) => Some(*n),
            PaintValue::HoverCase { base, hovered: h } => Some(if hovered { *h } else { *base }),
            _ => None,
        }
    }

    /// Colour value for a feature with the given properties
    pub fn resolve_color(&self, properties: &serde_json::Map<String, Value>) -> Option<Rgba> {
        match self {
            PaintValue::Color(c) => Some(*c),
            PaintValue::Interpolate { property, stops } => {
                let value = properties.get(property).and_then(Value::as_f64).unwrap_or(0.0);
                interpolate_stops(stops, value)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_stop_at_breakpoints() {
        for theme in [Theme::light(), Theme::dark()] {
            let stops = density_stops(theme);
            for (idx, at) in DENSITY_BREAKPOINTS.iter().enumerate() {
                assert_eq!(density_color(*at, theme), stops[idx], "breakpoint {}", at);
            }
        }
    }

    #[test]
    fn test_density_color_monotonic() {
        for theme in [Theme::light(), Theme::dark()] {
            let mut previous = intensity(&density_color(0.0, theme), theme);
            let mut value = 0.0;
            while value <= 40_000.0 {
                let current = intensity(&density_color(value, theme), theme);
                assert!(
                    current >= previous,
                    "intensity dropped at {} ({} < {})",
                    value,
                    current,
                    previous
                );
                previous = current;
                value += 137.0;
            }
        }
    }

    #[test]
    fn test_density_clamps_out_of_range() {
        let theme = Theme::light();
        assert_eq!(density_color(-50.0, theme), LIGHT_DENSITY_STOPS[0]);
        assert_eq!(density_color(f64::NAN, theme), LIGHT_DENSITY_STOPS[0]);
        assert_eq!(density_color(1_000_000.0, theme), LIGHT_DENSITY_STOPS[3]);
    }

    #[test]
    fn test_midpoint_is_between_stops() {
        let mid = density_color(10_000.0, Theme::light());
        assert_eq!(mid, LIGHT_DENSITY_STOPS[1].lerp(&LIGHT_DENSITY_STOPS[2], 0.5));
    }

    #[test]
    fn test_hover_deltas() {
        assert_eq!(hover_aware_width(2.0, false), 2.0);
        assert_eq!(hover_aware_width(2.0, true), 4.0);
        assert_eq!(hover_aware_radius(6.0, true), 8.0);
        assert_eq!(hover_aware_radius(6.0, false), 6.0);
    }

    #[test]
    fn test_hex_round_trip_and_short_form() {
        assert_eq!(Rgba::from_hex("#00A9E0"), Some(Rgba::rgb(0, 169, 224)));
        assert_eq!(Rgba::from_hex("#888"), Some(Rgba::rgb(136, 136, 136)));
        assert_eq!(Rgba::from_hex("#ff000080").map(|c| c.a), Some(128));
        assert!(Rgba::from_hex("00A9E0").is_none());
        assert_eq!(Rgba::rgb(0, 169, 224).to_hex(), "#00a9e0");
    }

    #[test]
    fn test_hover_case_expression() {
        let expr = hover_width_expression(2.0).to_expression();
        assert_eq!(
            expr,
            json!(["case", ["boolean", ["feature-state", "hover"], false], 4.0, 2.0])
        );
        assert_eq!(hover_radius_expression(5.0).resolve_number(true), Some(7.0));
    }

    #[test]
    fn test_interpolate_expression_resolves_like_density_color() {
        let theme = Theme::dark();
        let paint = density_fill_expression(theme);
        let mut props = serde_json::Map::new();
        props.insert("density".to_string(), json!(12_963));
        assert_eq!(paint.resolve_color(&props), Some(density_color(12_963.0, theme)));

        let expr = paint.to_expression();
        assert_eq!(expr[0], json!("interpolate"));
        assert_eq!(expr[2], json!(["get", "density"]));
        assert_eq!(expr.as_array().map(|a| a.len()), Some(3 + 8));
    }
}
