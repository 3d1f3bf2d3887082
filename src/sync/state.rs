//! The contract with the external application state container: the snapshot
//! the engine reads and the actions it emits.

use crate::{
    core::{
        config::{Theme, TimeRange},
        geo::LatLng,
    },
    data::geojson::{AreaProperties, FeatureCategory, FeatureId, FeatureProperties},
    layers::catalog::{default_descriptors, LayerDescriptor},
};
use serde::{Deserialize, Serialize};

/// Desired map state as held by the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStateSnapshot {
    pub layers: Vec<LayerDescriptor>,
    #[serde(default)]
    pub uploaded_layers: Vec<LayerDescriptor>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub time_range: TimeRange,
}

impl Default for AppStateSnapshot {
    fn default() -> Self {
        Self {
            layers: default_descriptors(),
            uploaded_layers: Vec::new(),
            theme: Theme::default(),
            time_range: TimeRange::default(),
        }
    }
}

impl AppStateSnapshot {
    /// Base and uploaded descriptors, in that order
    pub fn descriptors(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter().chain(self.uploaded_layers.iter())
    }

    pub fn layer(&self, id: &str) -> Option<&LayerDescriptor> {
        self.descriptors().find(|d| d.id == id)
    }

    /// Flips a layer's visibility; returns the new value
    pub fn toggle_layer(&mut self, id: &str) -> Option<bool> {
        let descriptor = self
            .layers
            .iter_mut()
            .chain(self.uploaded_layers.iter_mut())
            .find(|d| d.id == id)?;
        descriptor.visible = !descriptor.visible;
        Some(descriptor.visible)
    }

    pub fn set_layer_visibility(&mut self, id: &str, visible: bool) -> bool {
        match self
            .layers
            .iter_mut()
            .chain(self.uploaded_layers.iter_mut())
            .find(|d| d.id == id)
        {
            Some(descriptor) => {
                descriptor.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }
}

/// The selected feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSelection {
    pub abstract_layer: String,
    /// Concrete layer the click landed on
    pub source_layer: String,
    pub source: String,
    pub feature_id: FeatureId,
    pub category: FeatureCategory,
    pub properties: FeatureProperties,
    /// Where the click happened
    pub lng_lat: LatLng,
}

/// Indicators of the selected area shown in the KPI panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaKpis {
    pub id: String,
    pub name: String,
    pub population: Option<f64>,
    pub density: Option<f64>,
    pub literacy_rate: Option<f64>,
    pub sex_ratio: Option<f64>,
}

impl AreaKpis {
    pub fn from_area(id: &FeatureId, area: &AreaProperties) -> Self {
        Self {
            id: id.to_string(),
            name: area.name.clone().unwrap_or_else(|| "Unknown Area".to_string()),
            population: area.population,
            density: area.density,
            literacy_rate: area.literacy_rate,
            sex_ratio: area.sex_ratio,
        }
    }

    /// KPIs of a selection, `None` unless it is an area
    pub fn for_selection(selection: &FeatureSelection) -> Option<Self> {
        match &selection.properties {
            FeatureProperties::Area(area) => Some(Self::from_area(&selection.feature_id, area)),
            _ => None,
        }
    }
}

/// Updates the engine sends back to the state container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StateAction {
    SelectFeature(Option<FeatureId>),
    SetSelectedAreaKpis(Option<AreaKpis>),
    /// A base dataset load failed; message for an error toast
    LoadFailed(String),
    /// An upload was rejected; message for an error toast
    UploadRejected(String),
}
