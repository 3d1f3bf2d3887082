pub mod geojson;
pub mod source;
pub mod upload;

pub use geojson::{FeatureCollection, FeatureId, FeatureProperties, GeoJsonFeature};
pub use source::{DataSource, DatasetName, HttpDataSource, StaticDataSource};
pub use upload::UploadedLayer;
