//! In-memory map backend.
//!
//! `HeadlessMap` keeps sources, layers and feature state the way a rendering
//! map would, records every mutation it receives, and answers
//! rendered-feature queries with real geometry predicates. It backs the
//! test-suite and the headless app.

use crate::{
    core::{
        config::MapConfig,
        geo::LatLng,
        map::{Cursor, MapCommand, MapInstance, RenderedFeature, Visibility},
    },
    data::geojson::{FeatureCollection, FeatureId},
    layers::{
        catalog::{ConcreteLayerSpec, RenderType},
        style::{PaintProperty, PaintValue, Rgba},
    },
    prelude::{HashMap, HashSet},
};
use geo::{Contains, EuclideanDistance};
use geo_types::{Geometry, Point};

/// Pick radius for lines and circles, in degrees (roughly 300 m)
pub const DEFAULT_PICK_TOLERANCE: f64 = 0.003;

#[derive(Debug, Clone)]
struct HeadlessLayer {
    spec: ConcreteLayerSpec,
    visibility: Visibility,
    paint: HashMap<PaintProperty, PaintValue>,
}

#[derive(Debug)]
pub struct HeadlessMap {
    style_url: String,
    center: LatLng,
    zoom: f64,
    sources: HashMap<String, FeatureCollection>,
    /// Bottom to top
    layers: Vec<HeadlessLayer>,
    hovered: HashSet<(String, FeatureId)>,
    cursor: Cursor,
    background: Option<Rgba>,
    popup: Option<(LatLng, String)>,
    removed: bool,
    log: Vec<MapCommand>,
    pick_tolerance: f64,
}

impl HeadlessMap {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            style_url: config.style_url.clone(),
            center: config.center,
            zoom: config.zoom,
            sources: HashMap::default(),
            layers: Vec::new(),
            hovered: HashSet::default(),
            cursor: Cursor::Default,
            background: None,
            popup: None,
            removed: false,
            log: Vec::new(),
            pick_tolerance: DEFAULT_PICK_TOLERANCE,
        }
    }

    pub fn with_pick_tolerance(mut self, degrees: f64) -> Self {
        self.pick_tolerance = degrees;
        self
    }

    pub fn style_url(&self) -> &str {
        &self.style_url
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Every mutation received, in order
    pub fn commands(&self) -> &[MapCommand] {
        &self.log
    }

    pub fn mutation_count(&self) -> usize {
        self.log.len()
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    pub fn source(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    pub fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    /// Concrete layer ids, bottom to top
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.spec.id.as_str()).collect()
    }

    pub fn layout_visibility(&self, layer: &str) -> Option<Visibility> {
        self.layer(layer).map(|l| l.visibility)
    }

    pub fn paint(&self, layer: &str, property: PaintProperty) -> Option<&PaintValue> {
        self.layer(layer)?.paint.get(&property)
    }

    /// Numeric paint value as rendered for one feature, hover state applied
    pub fn rendered_number(&self, layer: &str, property: PaintProperty, feature: &FeatureId) -> Option<f64> {
        let l = self.layer(layer)?;
        let hovered = self.is_hovered(&l.spec.source, feature);
        l.paint.get(&property)?.resolve_number(hovered)
    }

    pub fn is_hovered(&self, source: &str, feature: &FeatureId) -> bool {
        self.hovered.contains(&(source.to_string(), feature.clone()))
    }

    pub fn hovered_count(&self) -> usize {
        self.hovered.len()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn background(&self) -> Option<Rgba> {
        self.background
    }

    pub fn popup(&self) -> Option<(LatLng, &str)> {
        self.popup.as_ref().map(|(at, html)| (*at, html.as_str()))
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    fn layer(&self, id: &str) -> Option<&HeadlessLayer> {
        self.layers.iter().find(|l| l.spec.id == id)
    }

    fn layer_mut(&mut self, id: &str) -> Option<&mut HeadlessLayer> {
        self.layers.iter_mut().find(|l| l.spec.id == id)
    }

    fn hit(&self, render_type: RenderType, geometry: &Geometry<f64>, at: &Point<f64>) -> bool {
        let tolerance = self.pick_tolerance;
        match (render_type, geometry) {
            (RenderType::Fill, Geometry::Polygon(p)) => p.contains(at),
            (RenderType::Fill, Geometry::MultiPolygon(mp)) => mp.contains(at),
            // Line layers over polygon sources draw the outline
            (RenderType::Line, Geometry::Polygon(p)) => at.euclidean_distance(p.exterior()) <= tolerance,
            (RenderType::Line, Geometry::MultiPolygon(mp)) => mp
                .iter()
                .any(|p| at.euclidean_distance(p.exterior()) <= tolerance),
            (RenderType::Line, Geometry::LineString(l)) => at.euclidean_distance(l) <= tolerance,
            (RenderType::Line, Geometry::MultiLineString(ml)) => {
                ml.iter().any(|l| at.euclidean_distance(l) <= tolerance)
            }
            (RenderType::Circle, Geometry::Point(p)) => at.euclidean_distance(p) <= tolerance,
            (RenderType::Circle, Geometry::MultiPoint(mp)) => {
                mp.iter().any(|p| at.euclidean_distance(p) <= tolerance)
            }
            (_, Geometry::GeometryCollection(gc)) => gc.iter().any(|g| self.hit(render_type, g, at)),
            _ => false,
        }
    }
}

impl MapInstance for HeadlessMap {
    fn add_source(&mut self, id: &str, data: FeatureCollection) {
        self.log.push(MapCommand::AddSource {
            id: id.to_string(),
            data: data.clone(),
        });
        if self.sources.contains_key(id) {
            log::warn!("source {} already exists", id);
            return;
        }
        self.sources.insert(id.to_string(), data);
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) {
        self.log.push(MapCommand::SetSourceData {
            id: id.to_string(),
            data: data.clone(),
        });
        match self.sources.get_mut(id) {
            Some(existing) => *existing = data,
            None => log::warn!("set_source_data on missing source {}", id),
        }
    }

    fn remove_source(&mut self, id: &str) {
        self.log.push(MapCommand::RemoveSource { id: id.to_string() });
        if self.layers.iter().any(|l| l.spec.source == id) {
            log::warn!("source {} is still in use", id);
            return;
        }
        self.sources.remove(id);
        self.hovered.retain(|(source, _)| source != id);
    }

    fn add_layer(&mut self, spec: ConcreteLayerSpec, visibility: Visibility) {
        self.log.push(MapCommand::AddLayer {
            spec: spec.clone(),
            visibility,
        });
        if !self.sources.contains_key(&spec.source) {
            log::warn!("layer {} references missing source {}", spec.id, spec.source);
            return;
        }
        if self.has_layer(&spec.id) {
            log::warn!("layer {} already exists", spec.id);
            return;
        }
        let paint = spec.paint.iter().cloned().collect();
        self.layers.push(HeadlessLayer {
            spec,
            visibility,
            paint,
        });
    }

    fn remove_layer(&mut self, id: &str) {
        self.log.push(MapCommand::RemoveLayer { id: id.to_string() });
        self.layers.retain(|l| l.spec.id != id);
    }

    fn set_layout_visibility(&mut self, layer: &str, visibility: Visibility) {
        self.log.push(MapCommand::SetLayoutVisibility {
            layer: layer.to_string(),
            visibility,
        });
        match self.layer_mut(layer) {
            Some(l) => l.visibility = visibility,
            None => log::warn!("visibility on missing layer {}", layer),
        }
    }

    fn set_paint_property(&mut self, layer: &str, property: PaintProperty, value: PaintValue) {
        self.log.push(MapCommand::SetPaintProperty {
            layer: layer.to_string(),
            property,
            value: value.clone(),
        });
        match self.layer_mut(layer) {
            Some(l) => {
                l.paint.insert(property, value);
            }
            None => log::warn!("paint {} on missing layer {}", property, layer),
        }
    }

    fn set_feature_state(&mut self, source: &str, feature: &FeatureId, hover: bool) {
        self.log.push(MapCommand::SetFeatureState {
            source: source.to_string(),
            feature: feature.clone(),
            hover,
        });
        let key = (source.to_string(), feature.clone());
        if hover {
            self.hovered.insert(key);
        } else {
            self.hovered.remove(&key);
        }
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.log.push(MapCommand::SetCursor(cursor));
        self.cursor = cursor;
    }

    fn set_background(&mut self, color: Rgba) {
        self.log.push(MapCommand::SetBackground(color));
        self.background = Some(color);
    }

    fn show_popup(&mut self, lng_lat: LatLng, html: &str) {
        self.log.push(MapCommand::ShowPopup {
            lng_lat,
            html: html.to_string(),
        });
        self.popup = Some((lng_lat, html.to_string()));
    }

    fn remove_popup(&mut self) {
        self.log.push(MapCommand::RemovePopup);
        self.popup = None;
    }

    fn query_rendered_features(&self, at: LatLng, layers: &[String]) -> Vec<RenderedFeature> {
        let point: Point<f64> = at.into();
        let mut hits = Vec::new();

        for layer in self.layers.iter().rev() {
            if !layer.visibility.is_visible() || !layers.contains(&layer.spec.id) {
                continue;
            }
            let Some(source) = self.sources.get(&layer.spec.source) else {
                continue;
            };
            for feature in &source.features {
                let (Some(geometry), Some(id)) = (feature.geometry.as_ref(), feature.feature_id()) else {
                    continue;
                };
                if self.hit(layer.spec.render_type, &geometry.to_geo(), &point) {
                    hits.push(RenderedFeature {
                        layer_id: layer.spec.id.clone(),
                        source: layer.spec.source.clone(),
                        feature_id: id,
                        properties: feature.properties(),
                    });
                }
            }
        }
        hits
    }

    fn remove(&mut self) {
        log::debug!("removing headless map ({} layers)", self.layers.len());
        self.layers.clear();
        self.sources.clear();
        self.hovered.clear();
        self.popup = None;
        self.removed = true;
    }
}
