//! User-uploaded GeoJSON layers.
//!
//! Uploads live outside the base dataset group: each one is parsed on its
//! own and either accepted whole or rejected with a message for the user.

use crate::{
    core::palette::UPLOAD_COLORS,
    data::geojson::{FeatureCollection, ShapeClass},
    layers::{
        catalog::{GeometryKind, LayerCategory, LayerDescriptor},
        style::Rgba,
    },
    MapError, Result,
};

const ACCEPTED_EXTENSIONS: [&str; 2] = [".geojson", ".json"];

/// A parsed upload, ready to be registered as source + layers
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedLayer {
    pub id: String,
    pub name: String,
    pub color: Rgba,
    pub visible: bool,
    pub data: FeatureCollection,
}

impl UploadedLayer {
    /// Parses an uploaded file. `sequence` numbers uploads within a mount
    /// and picks the id and the colour from the upload palette.
    pub fn parse(file_name: &str, text: &str, sequence: usize) -> Result<Self> {
        let lower = file_name.to_ascii_lowercase();
        let Some(extension) = ACCEPTED_EXTENSIONS.iter().find(|ext| lower.ends_with(*ext)) else {
            return Err(MapError::MalformedGeoJson(format!(
                "{}: please upload a .geojson file",
                file_name
            )));
        };

        let data = FeatureCollection::from_str(text).map_err(|e| match e {
            MapError::MalformedGeoJson(reason) => {
                MapError::MalformedGeoJson(format!("{}: {}", file_name, reason))
            }
            other => other,
        })?;
        if data.is_empty() {
            return Err(MapError::MalformedGeoJson(format!("{}: no features", file_name)));
        }
        if data.shape_classes().is_empty() {
            return Err(MapError::MalformedGeoJson(format!("{}: no geometries", file_name)));
        }

        let name = file_name[..file_name.len() - extension.len()].to_string();
        let color = Rgba::from_hex(UPLOAD_COLORS[sequence % UPLOAD_COLORS.len()])
            .unwrap_or(Rgba::rgb(255, 107, 107));

        Ok(Self {
            id: format!("upload_{}", sequence),
            name,
            color,
            visible: true,
            data,
        })
    }

    /// Dominant geometry kind, polygons taking precedence over lines over points
    pub fn kind(&self) -> GeometryKind {
        let classes = self.data.shape_classes();
        if classes.contains(&ShapeClass::Polygon) {
            GeometryKind::Polygon
        } else if classes.contains(&ShapeClass::Line) {
            GeometryKind::Line
        } else {
            GeometryKind::Point
        }
    }

    pub fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            icon: "📁".to_string(),
            kind: self.kind(),
            category: LayerCategory::Uploaded,
            visible: self.visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WARDS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "Ward A"},
             "geometry": {"type": "Polygon", "coordinates": [[[77.0,28.0],[77.1,28.0],[77.1,28.1],[77.0,28.0]]]}},
            {"type": "Feature", "properties": {"name": "Gate"},
             "geometry": {"type": "Point", "coordinates": [77.05, 28.05]}}
        ]
    }"#;

    #[test]
    fn test_upload_parses_and_names_layer() {
        let layer = UploadedLayer::parse("wards.geojson", WARDS, 0).unwrap();
        assert_eq!(layer.id, "upload_0");
        assert_eq!(layer.name, "wards");
        assert_eq!(layer.color, Rgba::from_hex(UPLOAD_COLORS[0]).unwrap());
        assert_eq!(layer.kind(), GeometryKind::Polygon);
        assert!(layer.visible);

        let descriptor = layer.descriptor();
        assert_eq!(descriptor.category, LayerCategory::Uploaded);
    }

    #[test]
    fn test_upload_colors_rotate() {
        let a = UploadedLayer::parse("a.geojson", WARDS, 1).unwrap();
        let b = UploadedLayer::parse("b.geojson", WARDS, 1 + UPLOAD_COLORS.len()).unwrap();
        assert_eq!(a.color, b.color);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_upload_rejects_wrong_extension_and_bad_json() {
        assert!(matches!(
            UploadedLayer::parse("wards.csv", WARDS, 0),
            Err(MapError::MalformedGeoJson(_))
        ));
        assert!(matches!(
            UploadedLayer::parse("wards.geojson", "{\"type\": \"Feature\"", 0),
            Err(MapError::MalformedGeoJson(_))
        ));
        assert!(matches!(
            UploadedLayer::parse(
                "empty.geojson",
                r#"{"type": "FeatureCollection", "features": []}"#,
                0
            ),
            Err(MapError::MalformedGeoJson(_))
        ));
    }

    #[test]
    fn test_upload_error_names_file_once() {
        match UploadedLayer::parse("broken.geojson", "{not json", 0) {
            Err(MapError::MalformedGeoJson(reason)) => {
                assert!(reason.starts_with("broken.geojson: invalid JSON"));
                assert_eq!(reason.matches("Malformed GeoJSON").count(), 0);
            }
            other => panic!("expected a malformed upload, got {:?}", other),
        }
    }

    #[test]
    fn test_upload_without_geometries_rejected() {
        let result = UploadedLayer::parse(
            "nulls.geojson",
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "a"}, "geometry": null},
                {"type": "Feature", "properties": {"name": "b"}, "geometry": null}
            ]}"#,
            0,
        );
        match result {
            Err(MapError::MalformedGeoJson(reason)) => assert!(reason.ends_with("no geometries")),
            other => panic!("expected a malformed upload, got {:?}", other),
        }
    }
}
