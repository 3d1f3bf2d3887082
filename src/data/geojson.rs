use crate::{core::geo::LatLng, MapError, Result};
use fxhash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw feature attributes as they appear in the payload
pub type PropertyMap = Map<String, Value>;

/// A GeoJSON position; extra ordinates (elevation) are accepted and dropped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(values: Vec<f64>) -> std::result::Result<Self, Self::Error> {
        match values.as_slice() {
            [lng, lat, ..] => Ok(Position { lng: *lng, lat: *lat }),
            _ => Err(format!("position needs at least 2 ordinates, got {}", values.len())),
        }
    }
}

impl From<Position> for [f64; 2] {
    fn from(p: Position) -> Self {
        [p.lng, p.lat]
    }
}

impl From<Position> for LatLng {
    fn from(p: Position) -> Self {
        LatLng::new(p.lat, p.lng)
    }
}

impl From<Position> for geo_types::Coord<f64> {
    fn from(p: Position) -> Self {
        geo_types::coord! { x: p.lng, y: p.lat }
    }
}

/// GeoJSON geometry types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point {
        coordinates: Position,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJsonGeometry>,
    },
}

/// Coarse shape of a geometry, used to pick concrete layer types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    Point,
    Line,
    Polygon,
}

impl GeoJsonGeometry {
    pub fn shape_classes(&self) -> Vec<ShapeClass> {
        match self {
            GeoJsonGeometry::Point { .. } | GeoJsonGeometry::MultiPoint { .. } => {
                vec![ShapeClass::Point]
            }
            GeoJsonGeometry::LineString { .. } | GeoJsonGeometry::MultiLineString { .. } => {
                vec![ShapeClass::Line]
            }
            GeoJsonGeometry::Polygon { .. } | GeoJsonGeometry::MultiPolygon { .. } => {
                vec![ShapeClass::Polygon]
            }
            GeoJsonGeometry::GeometryCollection { geometries } => {
                geometries.iter().flat_map(|g| g.shape_classes()).collect()
            }
        }
    }

    /// Converts into a `geo` geometry for spatial predicates
    pub fn to_geo(&self) -> geo_types::Geometry<f64> {
        use geo_types::{
            Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
            Point, Polygon,
        };

        fn line(coords: &[Position]) -> LineString<f64> {
            LineString::from(coords.iter().map(|p| (*p).into()).collect::<Vec<geo_types::Coord<f64>>>())
        }

        fn polygon(rings: &[Vec<Position>]) -> Polygon<f64> {
            let mut rings = rings.iter();
            let exterior = rings.next().map(|r| line(r)).unwrap_or_else(|| LineString::new(vec![]));
            Polygon::new(exterior, rings.map(|r| line(r)).collect())
        }

        match self {
            GeoJsonGeometry::Point { coordinates } => {
                Geometry::Point(Point::from(geo_types::Coord::from(*coordinates)))
            }
            GeoJsonGeometry::LineString { coordinates } => Geometry::LineString(line(coordinates)),
            GeoJsonGeometry::Polygon { coordinates } => Geometry::Polygon(polygon(coordinates)),
            GeoJsonGeometry::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
                coordinates
                    .iter()
                    .map(|p| Point::from(geo_types::Coord::from(*p)))
                    .collect(),
            )),
            GeoJsonGeometry::MultiLineString { coordinates } => Geometry::MultiLineString(
                MultiLineString::new(coordinates.iter().map(|l| line(l)).collect()),
            ),
            GeoJsonGeometry::MultiPolygon { coordinates } => Geometry::MultiPolygon(
                MultiPolygon::new(coordinates.iter().map(|p| polygon(p)).collect()),
            ),
            GeoJsonGeometry::GeometryCollection { geometries } => Geometry::GeometryCollection(
                GeometryCollection::new_from(geometries.iter().map(|g| g.to_geo()).collect()),
            ),
        }
    }
}

/// Stable identifier of a feature within its source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// GeoJSON feature with geometry and properties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    pub properties: Option<PropertyMap>,
}

impl GeoJsonFeature {
    /// The feature id as a string; `None` for missing or non-scalar ids
    pub fn feature_id(&self) -> Option<FeatureId> {
        match self.id.as_ref()? {
            Value::String(s) => Some(FeatureId::new(s.clone())),
            Value::Number(n) => Some(FeatureId::new(n.to_string())),
            _ => None,
        }
    }

    pub fn properties(&self) -> PropertyMap {
        self.properties.clone().unwrap_or_default()
    }
}

/// A FeatureCollection, the unit every dataset and upload resolves to
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<GeoJsonFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<GeoJsonFeature>) -> Self {
        Self { features }
    }

    /// Parses a FeatureCollection, a single Feature or a bare geometry.
    ///
    /// Any other top-level object is rejected whole.
    pub fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| MapError::MalformedGeoJson(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| MapError::MalformedGeoJson("missing \"type\" member".to_string()))?
            .to_string();

        let malformed = |e: serde_json::Error| MapError::MalformedGeoJson(format!("{}: {}", kind, e));
        let collection = match kind.as_str() {
            "FeatureCollection" => serde_json::from_value::<FeatureCollection>(value).map_err(malformed)?,
            "Feature" => FeatureCollection::new(vec![serde_json::from_value(value).map_err(malformed)?]),
            "Point" | "LineString" | "Polygon" | "MultiPoint" | "MultiLineString" | "MultiPolygon"
            | "GeometryCollection" => FeatureCollection::new(vec![GeoJsonFeature {
                geometry: Some(serde_json::from_value(value).map_err(malformed)?),
                ..Default::default()
            }]),
            other => {
                return Err(MapError::MalformedGeoJson(format!(
                    "unsupported GeoJSON type \"{}\"",
                    other
                )))
            }
        };

        Ok(collection.with_generated_ids())
    }

    /// Gives every feature lacking a usable id a numeric one.
    ///
    /// The feature index is used unless another feature already claims it,
    /// in which case the next free number is taken.
    pub fn with_generated_ids(mut self) -> Self {
        let mut taken: FxHashSet<FeatureId> =
            self.features.iter().filter_map(GeoJsonFeature::feature_id).collect();
        let mut next = 0usize;
        for (index, feature) in self.features.iter_mut().enumerate() {
            if feature.feature_id().is_some() {
                continue;
            }
            let mut candidate = index.max(next);
            while taken.contains(&FeatureId::new(candidate.to_string())) {
                candidate += 1;
            }
            taken.insert(FeatureId::new(candidate.to_string()));
            feature.id = Some(Value::from(candidate));
            next = candidate + 1;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature_ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.features.iter().filter_map(GeoJsonFeature::feature_id)
    }

    pub fn find(&self, id: &FeatureId) -> Option<&GeoJsonFeature> {
        self.features.iter().find(|f| f.feature_id().as_ref() == Some(id))
    }

    /// Distinct shape classes present, in first-seen order
    pub fn shape_classes(&self) -> Vec<ShapeClass> {
        let mut classes = Vec::new();
        for class in self
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(|g| g.shape_classes())
        {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }
        classes
    }
}

/// What kind of thing a feature is, as declared by the layer it was hit on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureCategory {
    Area,
    MetroStation,
    RailwayStation,
    TransitLine,
    Contour,
    Uploaded,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AreaProperties {
    pub name: Option<String>,
    pub population: Option<f64>,
    pub density: Option<f64>,
    pub literacy_rate: Option<f64>,
    pub sex_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StationProperties {
    pub name: Option<String>,
    pub station_type: Option<String>,
    pub opening_year: Option<i64>,
    pub lines: Option<Vec<String>>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TransitLineProperties {
    pub name: Option<String>,
    pub opening_year: Option<i64>,
    pub length_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ContourProperties {
    pub elevation: Option<f64>,
}

/// Feature attributes decoded per category, every field optional
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category")]
pub enum FeatureProperties {
    Area(AreaProperties),
    MetroStation(StationProperties),
    RailwayStation(StationProperties),
    TransitLine(TransitLineProperties),
    Contour(ContourProperties),
    Other { name: Option<String> },
}

fn text(props: &PropertyMap, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match props.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(props: &PropertyMap, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match props.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn year(props: &PropertyMap, keys: &[&str]) -> Option<i64> {
    number(props, keys).map(|y| y.round() as i64)
}

fn string_list(props: &PropertyMap, key: &str) -> Option<Vec<String>> {
    match props.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        Value::String(s) => Some(s.split(',').map(|p| p.trim().to_string()).collect()),
        _ => None,
    }
}

impl FeatureProperties {
    /// Decodes a property bag for the given category.
    ///
    /// Wrongly typed or absent attributes decode to `None` instead of failing.
    /// Census exports spell some keys differently (`NAME`, `Density_2021`);
    /// both spellings are accepted.
    pub fn decode(category: FeatureCategory, props: &PropertyMap) -> Self {
        match category {
            FeatureCategory::Area => FeatureProperties::Area(AreaProperties {
                name: text(props, &["name", "NAME"]),
                population: number(props, &["population", "Population_2021", "Population_2011"]),
                density: number(props, &["density", "Density_2021"]),
                literacy_rate: number(props, &["literacyRate", "literacy_rate"]),
                sex_ratio: number(props, &["sexRatio", "sex_ratio"]),
            }),
            FeatureCategory::MetroStation | FeatureCategory::RailwayStation => {
                let station = StationProperties {
                    name: text(props, &["name", "NAME"]),
                    station_type: text(props, &["type"]),
                    opening_year: year(props, &["openingYear", "opening_year"]),
                    lines: string_list(props, "lines"),
                    category: text(props, &["category"]),
                };
                if category == FeatureCategory::MetroStation {
                    FeatureProperties::MetroStation(station)
                } else {
                    FeatureProperties::RailwayStation(station)
                }
            }
            FeatureCategory::TransitLine => FeatureProperties::TransitLine(TransitLineProperties {
                name: text(props, &["name", "NAME"]),
                opening_year: year(props, &["openingYear", "opening_year"]),
                length_km: number(props, &["length"]),
            }),
            FeatureCategory::Contour => FeatureProperties::Contour(ContourProperties {
                elevation: number(props, &["elevation", "ELEV"]),
            }),
            FeatureCategory::Uploaded => FeatureProperties::Other {
                name: text(props, &["name", "NAME", "title"]),
            },
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            FeatureProperties::Area(a) => a.name.as_deref(),
            FeatureProperties::MetroStation(s) | FeatureProperties::RailwayStation(s) => {
                s.name.as_deref()
            }
            FeatureProperties::TransitLine(l) => l.name.as_deref(),
            FeatureProperties::Contour(_) => None,
            FeatureProperties::Other { name } => name.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_geojson_parsing() {
        let collection = FeatureCollection::from_str(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "id": "tehsil-1",
                        "properties": {"name": "Central Delhi"},
                        "geometry": {"type": "Point", "coordinates": [77.2088, 28.6328]}
                    },
                    {
                        "type": "Feature",
                        "properties": {"elevation": 200},
                        "geometry": {"type": "LineString", "coordinates": [[77.18, 28.61, 212.0], [77.19, 28.615]]}
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(collection.len(), 2);
        let ids: Vec<_> = collection.feature_ids().collect();
        assert_eq!(ids, vec![FeatureId::new("tehsil-1"), FeatureId::new("1")]);
        assert_eq!(collection.shape_classes(), vec![ShapeClass::Point, ShapeClass::Line]);
    }

    #[test]
    fn test_generated_ids_skip_explicit_ones() {
        let collection = FeatureCollection::from_str(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "A"}, "geometry": {"type": "Point", "coordinates": [70.0, 10.0]}},
                {"type": "Feature", "id": 0, "properties": {"name": "B"}, "geometry": {"type": "Point", "coordinates": [71.0, 10.0]}},
                {"type": "Feature", "id": "2", "geometry": {"type": "Point", "coordinates": [72.0, 10.0]}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [73.0, 10.0]}}
            ]}"#,
        )
        .unwrap();

        let ids: Vec<_> = collection.feature_ids().collect();
        assert_eq!(
            ids,
            vec![FeatureId::new("1"), FeatureId::new("0"), FeatureId::new("2"), FeatureId::new("3")]
        );
    }

    #[test]
    fn test_single_feature_and_bare_geometry_are_wrapped() {
        let feature = FeatureCollection::from_str(
            r#"{"type": "Feature", "properties": null, "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}"#,
        )
        .unwrap();
        assert_eq!(feature.len(), 1);

        let geometry = FeatureCollection::from_str(
            r#"{"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}"#,
        )
        .unwrap();
        assert_eq!(geometry.shape_classes(), vec![ShapeClass::Polygon]);
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        for text in [
            "not json",
            r#"{"features": []}"#,
            r#"{"type": "Topology"}"#,
            r#"{"type": "FeatureCollection", "features": [{"geometry": {"type": "Point", "coordinates": [1]}}]}"#,
        ] {
            let err = FeatureCollection::from_str(text).unwrap_err();
            assert!(matches!(err, MapError::MalformedGeoJson(_)), "{}", text);
        }
    }

    #[test]
    fn test_area_properties_tolerate_missing_and_aliases() {
        let props = json!({"NAME": "Andheri", "Density_2021": "23149", "sexRatio": "n/a"});
        let decoded = FeatureProperties::decode(FeatureCategory::Area, props.as_object().unwrap());

        match decoded {
            FeatureProperties::Area(area) => {
                assert_eq!(area.name.as_deref(), Some("Andheri"));
                assert_eq!(area.density, Some(23149.0));
                assert_eq!(area.population, None);
                assert_eq!(area.sex_ratio, None);
            }
            other => panic!("expected area, got {:?}", other),
        }
    }

    #[test]
    fn test_station_lines_decode() {
        let props = json!({"name": "Rajiv Chowk", "type": "Metro", "openingYear": 2002, "lines": ["Red Line", "Blue Line"]});
        let decoded =
            FeatureProperties::decode(FeatureCategory::MetroStation, props.as_object().unwrap());

        match decoded {
            FeatureProperties::MetroStation(s) => {
                assert_eq!(s.opening_year, Some(2002));
                assert_eq!(s.lines, Some(vec!["Red Line".to_string(), "Blue Line".to_string()]));
            }
            other => panic!("expected metro station, got {:?}", other),
        }
    }

    #[test]
    fn test_geo_conversion_contains_point() {
        use geo::Contains;

        let geometry = GeoJsonGeometry::Polygon {
            coordinates: vec![vec![
                Position { lng: 0.0, lat: 0.0 },
                Position { lng: 2.0, lat: 0.0 },
                Position { lng: 2.0, lat: 2.0 },
                Position { lng: 0.0, lat: 2.0 },
                Position { lng: 0.0, lat: 0.0 },
            ]],
        };
        let geo = geometry.to_geo();
        assert!(geo.contains(&geo_types::Point::new(1.0, 1.0)));
        assert!(!geo.contains(&geo_types::Point::new(3.0, 1.0)));
    }
}
