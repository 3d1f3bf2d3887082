//! # geodash
//!
//! A map synchronization engine for layered geographic dashboards.
//!
//! The engine owns a single imperative map instance and keeps it consistent
//! with a declarative application state (layer visibility, theme, time
//! filter), while turning low-level map interaction events (load, click,
//! hover) back into state updates and popups.

pub mod core;
pub mod data;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod sync;
pub mod ui;

// Re-export public API
pub use crate::core::{
    config::{MapConfig, Theme, TimeRange},
    geo::LatLng,
    headless::HeadlessMap,
    map::{MapCommand, MapHandle, MapInstance, Visibility},
};

pub use data::{
    geojson::{FeatureCollection, FeatureId, FeatureProperties, GeoJsonFeature},
    source::{DataSource, DatasetName, HttpDataSource, LoadedDatasets, StaticDataSource},
};

pub use layers::{
    catalog::{GeometryKind, LayerCategory, LayerDescriptor},
    registry::LayerRegistry,
    style::{PaintValue, Rgba},
};

pub use input::{dispatcher::InteractionDispatcher, events::MapEvent};

pub use ui::popup::PopupState;

pub use sync::{
    controller::{LoadTicket, SyncController},
    state::{AppStateSnapshot, AreaKpis, FeatureSelection, StateAction},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to load dataset {dataset}: {reason}")]
    DataLoad { dataset: String, reason: String },

    #[error("Malformed GeoJSON: {0}")]
    MalformedGeoJson(String),

    #[error("Source not registered: {0}")]
    SourceNotRegistered(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error type alias for convenience
pub type Error = MapError;

/// Initialises `env_logger` from `RUST_LOG`; later calls are ignored
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::builder().format_timestamp_millis().try_init();
}
