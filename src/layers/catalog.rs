//! The static layer catalog: what the sidebar can toggle, and which concrete
//! map layers back each entry.

use crate::{
    core::{config::Theme, palette},
    data::{
        geojson::{FeatureCategory, ShapeClass},
        source::DatasetName,
        upload::UploadedLayer,
    },
    layers::style::{
        density_fill_expression, hover_radius_expression, hover_width_expression, PaintProperty,
        PaintValue,
    },
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Polygon,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerCategory {
    Administrative,
    Population,
    Infrastructure,
    Facilities,
    Environment,
    Uploaded,
}

/// A toggleable entry of the application state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub kind: GeometryKind,
    pub category: LayerCategory,
    pub visible: bool,
}

impl LayerDescriptor {
    pub fn new(
        id: &str,
        name: &str,
        icon: &str,
        kind: GeometryKind,
        category: LayerCategory,
        visible: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            kind,
            category,
            visible,
        }
    }
}

/// The layer list the dashboard starts with
pub fn default_descriptors() -> Vec<LayerDescriptor> {
    use GeometryKind::*;
    use LayerCategory::*;

    vec![
        LayerDescriptor::new("tehsils", "Tehsils", "🗺️", Polygon, Administrative, true),
        LayerDescriptor::new("districts", "Districts", "🏛️", Polygon, Administrative, false),
        LayerDescriptor::new("population-density", "Population Density", "👥", Polygon, Population, true),
        LayerDescriptor::new("age-groups", "Age Demographics", "📊", Polygon, Population, false),
        LayerDescriptor::new("metro-lines", "Metro Lines", "🚇", Line, Infrastructure, true),
        LayerDescriptor::new("railway-lines", "Railway Lines", "🚆", Line, Infrastructure, true),
        LayerDescriptor::new("metro-stations", "Metro Stations", "🎯", Point, Infrastructure, true),
        LayerDescriptor::new("railway-stations", "Railway Stations", "🎯", Point, Infrastructure, true),
        LayerDescriptor::new("hospitals", "Hospitals", "🏥", Point, Facilities, false),
        LayerDescriptor::new("schools", "Schools", "🏫", Point, Facilities, false),
        LayerDescriptor::new("contours", "Contours", "🏔️", Line, Environment, false),
        LayerDescriptor::new("green-spaces", "Green Spaces", "🌳", Polygon, Environment, false),
    ]
}

/// MapLibre layer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    Fill,
    Line,
    Circle,
}

impl RenderType {
    /// Whether a paint property applies to layers of this type
    pub fn supports(&self, property: PaintProperty) -> bool {
        use PaintProperty::*;
        match self {
            RenderType::Fill => matches!(property, FillColor | FillOpacity),
            RenderType::Line => matches!(
                property,
                LineColor | LineWidth | LineOpacity | LineDasharray
            ),
            RenderType::Circle => matches!(
                property,
                CircleColor | CircleRadius | CircleStrokeColor | CircleStrokeWidth
            ),
        }
    }
}

/// One concrete map layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteLayerSpec {
    pub id: String,
    pub source: String,
    pub render_type: RenderType,
    pub paint: Vec<(PaintProperty, PaintValue)>,
    /// Category of the features a hit on this layer selects; `None` for
    /// decorative layers
    pub interactive: Option<FeatureCategory>,
}

impl ConcreteLayerSpec {
    pub fn new(id: impl Into<String>, source: impl Into<String>, render_type: RenderType) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            render_type,
            paint: Vec::new(),
            interactive: None,
        }
    }

    pub fn paint(mut self, property: PaintProperty, value: PaintValue) -> Self {
        self.paint.push((property, value));
        self
    }

    pub fn interactive(mut self, category: FeatureCategory) -> Self {
        self.interactive = Some(category);
        self
    }
}

/// An abstract layer and its concrete layers, bottom to top
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRegistration {
    pub abstract_id: String,
    pub specs: Vec<ConcreteLayerSpec>,
}

impl LayerRegistration {
    fn new(abstract_id: &str, specs: Vec<ConcreteLayerSpec>) -> Self {
        Self {
            abstract_id: abstract_id.to_string(),
            specs,
        }
    }
}

/// Layers built on the base datasets, in stacking order (first = bottom).
///
/// Stations sit on top of lines, lines on top of areas, so a point on a
/// station inside a tehsil resolves to the station.
pub fn base_layers(theme: Theme) -> Vec<LayerRegistration> {
    use PaintProperty::*;

    let tehsils = DatasetName::Tehsils.source_id();
    let color = PaintValue::color;

    vec![
        LayerRegistration::new(
            "population-density",
            vec![ConcreteLayerSpec::new("population-density-fill", tehsils, RenderType::Fill)
                .paint(FillColor, density_fill_expression(theme))
                .paint(FillOpacity, PaintValue::Number(0.6))
                .interactive(FeatureCategory::Area)],
        ),
        LayerRegistration::new(
            "tehsils",
            vec![
                ConcreteLayerSpec::new("tehsils-fill", tehsils, RenderType::Fill)
                    .paint(FillColor, color(palette::TEHSIL_FILL))
                    .paint(FillOpacity, PaintValue::Number(0.3))
                    .interactive(FeatureCategory::Area),
                ConcreteLayerSpec::new("tehsils-border", tehsils, RenderType::Line)
                    .paint(LineColor, color(palette::TEHSIL_BORDER))
                    .paint(LineWidth, hover_width_expression(1.0)),
            ],
        ),
        LayerRegistration::new(
            "contours",
            vec![ConcreteLayerSpec::new(
                "contours-line",
                DatasetName::Contours.source_id(),
                RenderType::Line,
            )
            .paint(LineColor, color(palette::CONTOUR_LINE))
            .paint(LineWidth, PaintValue::Number(1.5))
            .paint(LineDasharray, PaintValue::Numbers(vec![2.0, 2.0]))],
        ),
        LayerRegistration::new(
            "railway-lines",
            vec![ConcreteLayerSpec::new(
                "railway-line-layer",
                DatasetName::RailwayLine.source_id(),
                RenderType::Line,
            )
            .paint(LineColor, color(palette::RAILWAY_LINE))
            .paint(LineWidth, hover_width_expression(3.0))
            .interactive(FeatureCategory::TransitLine)],
        ),
        LayerRegistration::new(
            "metro-lines",
            vec![ConcreteLayerSpec::new(
                "metro-line-layer",
                DatasetName::MetroLine.source_id(),
                RenderType::Line,
            )
            .paint(LineColor, color(palette::METRO_LINE))
            .paint(LineWidth, hover_width_expression(2.0))
            .paint(LineDasharray, PaintValue::Numbers(vec![2.0, 2.0]))
            .interactive(FeatureCategory::TransitLine)],
        ),
        LayerRegistration::new(
            "railway-stations",
            vec![ConcreteLayerSpec::new(
                "railway-stations-layer",
                DatasetName::RailwayStations.source_id(),
                RenderType::Circle,
            )
            .paint(CircleColor, color(palette::RAILWAY_STATION))
            .paint(CircleRadius, hover_radius_expression(5.0))
            .interactive(FeatureCategory::RailwayStation)],
        ),
        LayerRegistration::new(
            "metro-stations",
            vec![ConcreteLayerSpec::new(
                "metro-stations-layer",
                DatasetName::MetroStations.source_id(),
                RenderType::Circle,
            )
            .paint(CircleColor, color(palette::METRO_STATION))
            .paint(CircleRadius, hover_radius_expression(6.0))
            .interactive(FeatureCategory::MetroStation)],
        ),
    ]
}

/// Paint properties that depend on the theme: `(abstract id, property, value)`
pub fn theme_paints(theme: Theme) -> Vec<(&'static str, PaintProperty, PaintValue)> {
    vec![(
        "population-density",
        PaintProperty::FillColor,
        density_fill_expression(theme),
    )]
}

/// Concrete layers for an upload, one or two per shape class present.
///
/// The upload's id doubles as its source id.
pub fn upload_layers(upload: &UploadedLayer) -> LayerRegistration {
    use PaintProperty::*;

    let color = PaintValue::Color(upload.color);
    let mut specs = Vec::new();
    let classes = upload.data.shape_classes();

    if classes.contains(&ShapeClass::Polygon) {
        specs.push(
            ConcreteLayerSpec::new(format!("{}-fill", upload.id), &upload.id, RenderType::Fill)
                .paint(FillColor, color.clone())
                .paint(FillOpacity, PaintValue::Number(0.4))
                .interactive(FeatureCategory::Uploaded),
        );
        specs.push(
            ConcreteLayerSpec::new(format!("{}-border", upload.id), &upload.id, RenderType::Line)
                .paint(LineColor, color.clone())
                .paint(LineWidth, hover_width_expression(2.0)),
        );
    }
    if classes.contains(&ShapeClass::Line) {
        specs.push(
            ConcreteLayerSpec::new(format!("{}-line", upload.id), &upload.id, RenderType::Line)
                .paint(LineColor, color.clone())
                .paint(LineWidth, hover_width_expression(3.0))
                .interactive(FeatureCategory::Uploaded),
        );
    }
    if classes.contains(&ShapeClass::Point) {
        specs.push(
            ConcreteLayerSpec::new(format!("{}-circle", upload.id), &upload.id, RenderType::Circle)
                .paint(CircleColor, color)
                .paint(CircleRadius, hover_radius_expression(6.0))
                .interactive(FeatureCategory::Uploaded),
        );
    }

    LayerRegistration {
        abstract_id: upload.id.clone(),
        specs,
    }
}
