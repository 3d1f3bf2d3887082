use crate::{
    core::geo::LatLng,
    data::geojson::{FeatureCollection, FeatureId, PropertyMap},
    layers::{
        catalog::ConcreteLayerSpec,
        style::{PaintProperty, PaintValue, Rgba},
    },
};
use serde::Serialize;
use std::collections::VecDeque;

/// Layout visibility of a concrete layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Visibility {
    Visible,
    None,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::None => "none",
        }
    }

    pub fn is_visible(&self) -> bool {
        *self == Visibility::Visible
    }
}

impl From<bool> for Visibility {
    fn from(visible: bool) -> Self {
        if visible {
            Visibility::Visible
        } else {
            Visibility::None
        }
    }
}

/// Canvas cursor style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

impl Cursor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cursor::Default => "",
            Cursor::Pointer => "pointer",
        }
    }
}

/// One imperative mutation of the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MapCommand {
    AddSource {
        id: String,
        data: FeatureCollection,
    },
    SetSourceData {
        id: String,
        data: FeatureCollection,
    },
    RemoveSource {
        id: String,
    },
    AddLayer {
        spec: ConcreteLayerSpec,
        visibility: Visibility,
    },
    RemoveLayer {
        id: String,
    },
    SetLayoutVisibility {
        layer: String,
        visibility: Visibility,
    },
    SetPaintProperty {
        layer: String,
        property: PaintProperty,
        value: PaintValue,
    },
    SetFeatureState {
        source: String,
        feature: FeatureId,
        hover: bool,
    },
    SetCursor(Cursor),
    SetBackground(Rgba),
    ShowPopup {
        lng_lat: LatLng,
        html: String,
    },
    RemovePopup,
}

/// A feature found under a point by a rendered-feature query
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub layer_id: String,
    pub source: String,
    pub feature_id: FeatureId,
    pub properties: PropertyMap,
}

/// The imperative map backend.
///
/// Implementations mirror a MapLibre-style map: sources hold data, layers
/// render a source, and feature state drives hover styling. Only
/// [`MapHandle`] calls the mutating methods.
pub trait MapInstance {
    fn add_source(&mut self, id: &str, data: FeatureCollection);

    fn set_source_data(&mut self, id: &str, data: FeatureCollection);

    fn remove_source(&mut self, id: &str);

    fn add_layer(&mut self, spec: ConcreteLayerSpec, visibility: Visibility);

    fn remove_layer(&mut self, id: &str);

    fn set_layout_visibility(&mut self, layer: &str, visibility: Visibility);

    fn set_paint_property(&mut self, layer: &str, property: PaintProperty, value: PaintValue);

    fn set_feature_state(&mut self, source: &str, feature: &FeatureId, hover: bool);

    fn set_cursor(&mut self, cursor: Cursor);

    fn set_background(&mut self, color: Rgba);

    fn show_popup(&mut self, lng_lat: LatLng, html: &str);

    fn remove_popup(&mut self);

    /// Visible features of `layers` under `at`, topmost layer first
    fn query_rendered_features(&self, at: LatLng, layers: &[String]) -> Vec<RenderedFeature>;

    /// Tear the map down, releasing all listeners
    fn remove(&mut self);

    /// Dispatch a command to the matching method
    fn execute(&mut self, command: MapCommand) {
        match command {
            MapCommand::AddSource { id, data } => self.add_source(&id, data),
            MapCommand::SetSourceData { id, data } => self.set_source_data(&id, data),
            MapCommand::RemoveSource { id } => self.remove_source(&id),
            MapCommand::AddLayer { spec, visibility } => self.add_layer(spec, visibility),
            MapCommand::RemoveLayer { id } => self.remove_layer(&id),
            MapCommand::SetLayoutVisibility { layer, visibility } => {
                self.set_layout_visibility(&layer, visibility)
            }
            MapCommand::SetPaintProperty {
                layer,
                property,
                value,
            } => self.set_paint_property(&layer, property, value),
            MapCommand::SetFeatureState {
                source,
                feature,
                hover,
            } => self.set_feature_state(&source, &feature, hover),
            MapCommand::SetCursor(cursor) => self.set_cursor(cursor),
            MapCommand::SetBackground(color) => self.set_background(color),
            MapCommand::ShowPopup { lng_lat, html } => self.show_popup(lng_lat, &html),
            MapCommand::RemovePopup => self.remove_popup(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Created, load signal not yet fired; mutations are buffered
    Loading,
    Ready,
    Destroyed,
}

/// Exclusive owner of the map instance.
///
/// Mutations requested before the load signal are queued and flushed once,
/// in request order, by [`MapHandle::mark_loaded`]. After [`MapHandle::destroy`]
/// every request is dropped.
pub struct MapHandle<M: MapInstance> {
    map: Option<M>,
    phase: Phase,
    pending: VecDeque<MapCommand>,
}

impl<M: MapInstance> MapHandle<M> {
    pub fn new(map: M) -> Self {
        Self {
            map: Some(map),
            phase: Phase::Loading,
            pending: VecDeque::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn is_destroyed(&self) -> bool {
        self.phase == Phase::Destroyed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Issue or buffer a mutation depending on the lifecycle phase
    pub fn request(&mut self, command: MapCommand) {
        match (self.phase, self.map.as_mut()) {
            (Phase::Ready, Some(map)) => map.execute(command),
            (Phase::Loading, _) => self.pending.push_back(command),
            _ => log::trace!("dropping map command after unmount: {:?}", command),
        }
    }

    /// Handle the load signal. Returns how many buffered commands were
    /// flushed; a repeated signal flushes nothing.
    pub fn mark_loaded(&mut self) -> usize {
        if self.phase != Phase::Loading {
            return 0;
        }
        self.phase = Phase::Ready;

        let Some(map) = self.map.as_mut() else {
            return 0;
        };
        let flushed = self.pending.len();
        for command in self.pending.drain(..) {
            map.execute(command);
        }
        flushed
    }

    pub fn query_rendered_features(&self, at: LatLng, layers: &[String]) -> Vec<RenderedFeature> {
        match (self.phase, self.map.as_ref()) {
            (Phase::Ready, Some(map)) if !layers.is_empty() => map.query_rendered_features(at, layers),
            _ => Vec::new(),
        }
    }

    /// Read-only access to the live map
    pub fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }

    /// Remove the map and drop anything still buffered
    pub fn destroy(&mut self) {
        if let Some(mut map) = self.map.take() {
            map.remove();
        }
        self.pending.clear();
        self.phase = Phase::Destroyed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{config::MapConfig, headless::HeadlessMap};

    fn handle() -> MapHandle<HeadlessMap> {
        MapHandle::new(HeadlessMap::new(&MapConfig::default()))
    }

    #[test]
    fn test_commands_buffer_until_load() {
        let mut handle = handle();
        handle.request(MapCommand::SetCursor(Cursor::Pointer));
        handle.request(MapCommand::SetBackground(Rgba::rgb(1, 2, 3)));

        assert_eq!(handle.pending_len(), 2);
        assert_eq!(handle.map().map(|m| m.mutation_count()), Some(0));

        assert_eq!(handle.mark_loaded(), 2);
        let map = handle.map().unwrap();
        assert_eq!(
            map.commands(),
            &[
                MapCommand::SetCursor(Cursor::Pointer),
                MapCommand::SetBackground(Rgba::rgb(1, 2, 3)),
            ]
        );
    }

    #[test]
    fn test_flush_happens_once() {
        let mut handle = handle();
        handle.request(MapCommand::RemovePopup);
        assert_eq!(handle.mark_loaded(), 1);
        assert_eq!(handle.mark_loaded(), 0);
        assert_eq!(handle.map().map(|m| m.mutation_count()), Some(1));

        handle.request(MapCommand::SetCursor(Cursor::Default));
        assert_eq!(handle.pending_len(), 0);
        assert_eq!(handle.map().map(|m| m.mutation_count()), Some(2));
    }

    #[test]
    fn test_requests_after_destroy_are_dropped() {
        let mut handle = handle();
        handle.mark_loaded();
        handle.destroy();

        handle.request(MapCommand::SetCursor(Cursor::Pointer));
        assert!(handle.is_destroyed());
        assert!(handle.map().is_none());
        assert_eq!(handle.mark_loaded(), 0);
    }

    #[test]
    fn test_visibility_strings() {
        assert_eq!(Visibility::from(true).as_str(), "visible");
        assert_eq!(Visibility::from(false).as_str(), "none");
        assert_eq!(Cursor::Pointer.as_str(), "pointer");
    }
}
