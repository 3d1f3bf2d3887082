//! Prelude module for common geodash types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use geodash::prelude::*;`

pub use crate::core::{
    config::{DatasetEndpoints, MapConfig, Theme, TimeRange},
    geo::LatLng,
    headless::HeadlessMap,
    map::{Cursor, MapCommand, MapHandle, MapInstance, RenderedFeature, Visibility},
    palette::{SdgGoal, SDG_GOALS},
};

pub use crate::data::{
    geojson::{FeatureCollection, FeatureId, FeatureProperties, GeoJsonFeature, GeoJsonGeometry},
    source::{DataSource, DatasetName, HttpDataSource, LoadedDatasets, StaticDataSource},
    upload::UploadedLayer,
};

pub use crate::layers::{
    catalog::{ConcreteLayerSpec, GeometryKind, LayerCategory, LayerDescriptor, RenderType},
    registry::LayerRegistry,
    style::{PaintProperty, PaintValue, Rgba},
};

pub use crate::input::{
    dispatcher::{HoverState, InteractionDispatcher, InteractionOutcome},
    events::{EventQueue, MapEvent},
};

pub use crate::ui::popup::{PopupState, PopupRenderer};

pub use crate::sync::{
    controller::{LoadTicket, SyncController},
    state::{AppStateSnapshot, AreaKpis, FeatureSelection, StateAction},
};

pub use crate::{Error as MapError, Result};

pub use std::sync::Arc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
