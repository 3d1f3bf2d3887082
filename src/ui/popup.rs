use crate::{
    core::geo::LatLng,
    data::geojson::{AreaProperties, FeatureProperties, StationProperties},
};

const MISSING: &str = "N/A";

/// The one popup open on the map
#[derive(Debug, Clone, PartialEq)]
pub struct PopupState {
    pub lng_lat: LatLng,
    pub html: String,
}

impl PopupState {
    pub fn new(lng_lat: LatLng, html: String) -> Self {
        Self { lng_lat, html }
    }
}

/// Renders feature properties into popup HTML
pub struct PopupRenderer;

impl PopupRenderer {
    pub fn render(properties: &FeatureProperties) -> String {
        match properties {
            FeatureProperties::Area(area) => Self::area(area),
            FeatureProperties::MetroStation(station) => Self::station(
                station,
                "Lines",
                station.lines.as_ref().map(|lines| lines.join(", ")),
            ),
            FeatureProperties::RailwayStation(station) => {
                Self::station(station, "Category", station.category.clone())
            }
            other => format!(
                "<div class=\"popup\"><strong>{}</strong></div>",
                escape(other.name().unwrap_or("Feature"))
            ),
        }
    }

    fn area(area: &AreaProperties) -> String {
        block(
            area.name.as_deref().unwrap_or("Unknown Area"),
            &[
                ("Population", area.population.map(format_count)),
                ("Density", area.density.map(|d| format!("{} /km²", format_count(d)))),
                ("Literacy Rate", area.literacy_rate.map(|r| format!("{}%", format_decimal(r)))),
                ("Sex Ratio", area.sex_ratio.map(format_decimal)),
            ],
        )
    }

    fn station(station: &StationProperties, extra_label: &str, extra: Option<String>) -> String {
        block(
            station.name.as_deref().unwrap_or("Unknown Station"),
            &[
                ("Type", station.station_type.clone()),
                ("Opening Year", station.opening_year.map(|y| y.to_string())),
                (extra_label, extra),
            ],
        )
    }
}

fn block(title: &str, rows: &[(&str, Option<String>)]) -> String {
    let mut html = format!("<div class=\"popup\"><strong>{}</strong>", escape(title));
    for (label, value) in rows {
        html.push_str(&format!(
            "<br/>{}: {}",
            label,
            escape(value.as_deref().unwrap_or(MISSING))
        ));
    }
    html.push_str("</div>");
    html
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Integer with thousands separators: 1234567 -> "1,234,567"
fn format_count(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// At most one decimal, dropped when zero
fn format_decimal(value: f64) -> String {
    let tenths = (value * 10.0).round() / 10.0;
    if tenths.fract() == 0.0 {
        format!("{}", tenths as i64)
    } else {
        format!("{:.1}", tenths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geojson::{ContourProperties, TransitLineProperties};

    #[test]
    fn test_area_popup() {
        let html = PopupRenderer::render(&FeatureProperties::Area(AreaProperties {
            name: Some("Central Delhi".to_string()),
            population: Some(582_320.0),
            density: Some(27_730.0),
            literacy_rate: Some(89.25),
            sex_ratio: Some(892.0),
        }));

        assert!(html.contains("<strong>Central Delhi</strong>"));
        assert!(html.contains("Population: 582,320"));
        assert!(html.contains("Density: 27,730 /km²"));
        assert!(html.contains("Literacy Rate: 89.3%"));
        assert!(html.contains("Sex Ratio: 892"));
    }

    #[test]
    fn test_missing_values_render_placeholders() {
        let html = PopupRenderer::render(&FeatureProperties::Area(AreaProperties::default()));
        assert!(html.contains("Unknown Area"));
        assert_eq!(html.matches("N/A").count(), 4);

        let html = PopupRenderer::render(&FeatureProperties::RailwayStation(StationProperties::default()));
        assert!(html.contains("Unknown Station"));
        assert!(html.contains("Category: N/A"));
    }

    #[test]
    fn test_metro_station_lines_joined() {
        let html = PopupRenderer::render(&FeatureProperties::MetroStation(StationProperties {
            name: Some("Rajiv Chowk".to_string()),
            station_type: Some("Interchange".to_string()),
            opening_year: Some(2005),
            lines: Some(vec!["Blue Line".to_string(), "Yellow Line".to_string()]),
            category: None,
        }));

        assert!(html.contains("Type: Interchange"));
        assert!(html.contains("Opening Year: 2005"));
        assert!(html.contains("Lines: Blue Line, Yellow Line"));
    }

    #[test]
    fn test_other_categories_render_minimal_block() {
        let line = PopupRenderer::render(&FeatureProperties::TransitLine(TransitLineProperties {
            name: Some("Blue Line".to_string()),
            ..Default::default()
        }));
        assert_eq!(line, "<div class=\"popup\"><strong>Blue Line</strong></div>");

        let contour = PopupRenderer::render(&FeatureProperties::Contour(ContourProperties::default()));
        assert!(contour.contains("<strong>Feature</strong>"));
    }

    #[test]
    fn test_values_are_escaped() {
        let html = PopupRenderer::render(&FeatureProperties::Other {
            name: Some("<script>alert('x')</script>".to_string()),
        });
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(1_000.0), "1,000");
        assert_eq!(format_count(-1_234_567.0), "-1,234,567");
        assert_eq!(format_decimal(86.0), "86");
        assert_eq!(format_decimal(86.34), "86.3");
    }
}
