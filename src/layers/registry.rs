use crate::{
    core::map::{MapCommand, MapHandle, MapInstance, Visibility},
    data::geojson::{FeatureCollection, FeatureId},
    layers::{
        catalog::{ConcreteLayerSpec, LayerDescriptor},
        style::{PaintProperty, PaintValue},
    },
    prelude::{HashMap, HashSet},
    MapError, Result,
};

struct RegisteredLayer {
    specs: Vec<ConcreteLayerSpec>,
    /// Visibility last issued for every concrete layer of this entry
    visible: bool,
}

/// Maps abstract layer ids to the concrete map layers that render them and
/// tracks what has been issued to the map.
pub struct LayerRegistry {
    /// Feature ids per registered source
    sources: HashMap<String, HashSet<FeatureId>>,
    layers: HashMap<String, RegisteredLayer>,
    /// Concrete layer ids, bottom to top
    render_order: Vec<String>,
    owners: HashMap<String, String>,
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self {
            sources: HashMap::default(),
            layers: HashMap::default(),
            render_order: Vec::new(),
            owners: HashMap::default(),
        }
    }

    /// Adds a source, or replaces its data when it already exists.
    /// Returns `true` on replacement.
    pub fn register_source<M: MapInstance>(
        &mut self,
        map: &mut MapHandle<M>,
        name: &str,
        data: FeatureCollection,
    ) -> bool {
        let data = data.with_generated_ids();
        let ids = data.feature_ids().collect();
        let replaced = self.sources.insert(name.to_string(), ids).is_some();

        let id = name.to_string();
        if replaced {
            log::debug!("replacing data of source {}", name);
            map.request(MapCommand::SetSourceData { id, data });
        } else {
            log::debug!("adding source {} ({} features)", name, data.len());
            map.request(MapCommand::AddSource { id, data });
        }
        replaced
    }

    /// Adds the concrete layers of `abstract_id` on top of the stack.
    ///
    /// Every referenced source must already be registered; otherwise nothing
    /// is added. Registering an id twice keeps the first registration.
    pub fn register_layer<M: MapInstance>(
        &mut self,
        map: &mut MapHandle<M>,
        abstract_id: &str,
        specs: Vec<ConcreteLayerSpec>,
        visible: bool,
    ) -> Result<()> {
        if let Some(missing) = specs.iter().find(|s| !self.sources.contains_key(&s.source)) {
            return Err(MapError::SourceNotRegistered(missing.source.clone()));
        }
        if self.layers.contains_key(abstract_id) {
            log::debug!("layer {} already registered", abstract_id);
            return Ok(());
        }

        for spec in &specs {
            self.render_order.push(spec.id.clone());
            self.owners.insert(spec.id.clone(), abstract_id.to_string());
            map.request(MapCommand::AddLayer {
                spec: spec.clone(),
                visibility: Visibility::from(visible),
            });
        }
        self.layers
            .insert(abstract_id.to_string(), RegisteredLayer { specs, visible });
        Ok(())
    }

    /// Sets the layout visibility of every concrete layer of `abstract_id`.
    /// Returns the number of mutations issued; unknown ids issue none.
    pub fn set_visibility<M: MapInstance>(
        &mut self,
        map: &mut MapHandle<M>,
        abstract_id: &str,
        visible: bool,
    ) -> usize {
        let Some(layer) = self.layers.get_mut(abstract_id) else {
            log::debug!("ignoring visibility of unknown layer {}", abstract_id);
            return 0;
        };

        layer.visible = visible;
        for spec in &layer.specs {
            map.request(MapCommand::SetLayoutVisibility {
                layer: spec.id.clone(),
                visibility: Visibility::from(visible),
            });
        }
        layer.specs.len()
    }

    /// Brings registered layers in line with `desired`, touching only the
    /// entries whose visibility differs. Returns the number of mutations.
    pub fn reconcile<'a, M, I>(&mut self, map: &mut MapHandle<M>, desired: I) -> usize
    where
        M: MapInstance,
        I: IntoIterator<Item = &'a LayerDescriptor>,
    {
        let mut issued = 0;
        for descriptor in desired {
            let differs = self
                .layers
                .get(&descriptor.id)
                .is_some_and(|l| l.visible != descriptor.visible);
            if differs {
                issued += self.set_visibility(map, &descriptor.id, descriptor.visible);
            }
        }
        if issued > 0 {
            log::debug!("reconcile issued {} visibility changes", issued);
        }
        issued
    }

    /// Sets a paint property on the concrete layers of `abstract_id` whose
    /// type supports it. Returns the number of mutations issued.
    pub fn set_paint<M: MapInstance>(
        &mut self,
        map: &mut MapHandle<M>,
        abstract_id: &str,
        property: PaintProperty,
        value: PaintValue,
    ) -> usize {
        let Some(layer) = self.layers.get_mut(abstract_id) else {
            log::debug!("ignoring paint of unknown layer {}", abstract_id);
            return 0;
        };

        let mut issued = 0;
        for spec in layer
            .specs
            .iter_mut()
            .filter(|s| s.render_type.supports(property))
        {
            match spec.paint.iter_mut().find(|(p, _)| *p == property) {
                Some((_, current)) => *current = value.clone(),
                None => spec.paint.push((property, value.clone())),
            }
            map.request(MapCommand::SetPaintProperty {
                layer: spec.id.clone(),
                property,
                value: value.clone(),
            });
            issued += 1;
        }
        issued
    }

    /// Removes every concrete layer of `abstract_id`
    pub fn remove_layer<M: MapInstance>(&mut self, map: &mut MapHandle<M>, abstract_id: &str) -> bool {
        let Some(layer) = self.layers.remove(abstract_id) else {
            return false;
        };
        for spec in layer.specs.iter().rev() {
            self.render_order.retain(|id| id != &spec.id);
            self.owners.remove(&spec.id);
            map.request(MapCommand::RemoveLayer {
                id: spec.id.clone(),
            });
        }
        true
    }

    /// Removes a source no layer renders any more
    pub fn remove_source<M: MapInstance>(&mut self, map: &mut MapHandle<M>, name: &str) -> bool {
        let in_use = self
            .layers
            .values()
            .flat_map(|l| l.specs.iter())
            .any(|s| s.source == name);
        if in_use {
            log::warn!("not removing source {}: still rendered", name);
            return false;
        }
        if self.sources.remove(name).is_none() {
            return false;
        }
        map.request(MapCommand::RemoveSource {
            id: name.to_string(),
        });
        true
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn has_layer(&self, abstract_id: &str) -> bool {
        self.layers.contains_key(abstract_id)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn concrete_layer_count(&self) -> usize {
        self.render_order.len()
    }

    pub fn is_visible(&self, abstract_id: &str) -> Option<bool> {
        self.layers.get(abstract_id).map(|l| l.visible)
    }

    /// Whether the concrete layer is currently shown
    pub fn is_concrete_visible(&self, concrete_id: &str) -> bool {
        self.owner_of(concrete_id)
            .and_then(|owner| self.is_visible(owner))
            .unwrap_or(false)
    }

    pub fn concrete_ids(&self, abstract_id: &str) -> Vec<&str> {
        self.layers
            .get(abstract_id)
            .map(|l| l.specs.iter().map(|s| s.id.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, concrete_id: &str) -> Option<&str> {
        self.owners.get(concrete_id).map(String::as_str)
    }

    /// Interactive concrete layers, topmost first
    pub fn interactive_layers(&self) -> Vec<&ConcreteLayerSpec> {
        self.render_order
            .iter()
            .rev()
            .filter_map(|id| {
                let owner = self.owners.get(id)?;
                self.layers.get(owner)?.specs.iter().find(|s| &s.id == id)
            })
            .filter(|s| s.interactive.is_some())
            .collect()
    }

    pub fn feature_ids(&self, source: &str) -> Option<&HashSet<FeatureId>> {
        self.sources.get(source)
    }

    pub fn contains_feature(&self, source: &str, id: &FeatureId) -> bool {
        self.sources.get(source).is_some_and(|ids| ids.contains(id))
    }

    /// Forgets everything without issuing commands; the map is gone
    pub fn clear(&mut self) {
        self.sources.clear();
        self.layers.clear();
        self.render_order.clear();
        self.owners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{config::MapConfig, headless::HeadlessMap},
        layers::catalog::{GeometryKind, LayerCategory, RenderType},
    };

    fn ready_handle() -> MapHandle<HeadlessMap> {
        let mut handle = MapHandle::new(HeadlessMap::new(&MapConfig::default()));
        handle.mark_loaded();
        handle
    }

    fn points() -> FeatureCollection {
        FeatureCollection::from_str(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": "a", "geometry": {"type": "Point", "coordinates": [0, 0]}}
            ]}"#,
        )
        .unwrap()
    }

    fn descriptor(id: &str, visible: bool) -> LayerDescriptor {
        LayerDescriptor::new(id, id, "", GeometryKind::Point, LayerCategory::Facilities, visible)
    }

    fn mutations(handle: &MapHandle<HeadlessMap>) -> usize {
        handle.map().map(|m| m.mutation_count()).unwrap_or(0)
    }

    #[test]
    fn test_layer_requires_registered_source() {
        let mut handle = ready_handle();
        let mut registry = LayerRegistry::new();

        let err = registry
            .register_layer(
                &mut handle,
                "stops",
                vec![ConcreteLayerSpec::new("stops-circle", "stops", RenderType::Circle)],
                true,
            )
            .unwrap_err();
        assert!(matches!(err, MapError::SourceNotRegistered(s) if s == "stops"));
        assert_eq!(mutations(&handle), 0);
        assert!(!registry.has_layer("stops"));
    }

    #[test]
    fn test_register_source_twice_replaces_data() {
        let mut handle = ready_handle();
        let mut registry = LayerRegistry::new();

        assert!(!registry.register_source(&mut handle, "stops", points()));
        assert!(registry.register_source(&mut handle, "stops", FeatureCollection::default()));
        assert!(!registry.contains_feature("stops", &FeatureId::new("a")));

        let map = handle.map().unwrap();
        assert!(matches!(map.commands()[1], MapCommand::SetSourceData { .. }));
        assert_eq!(map.source("stops").map(|s| s.len()), Some(0));
    }

    #[test]
    fn test_reconcile_only_touches_changed_entries() {
        let mut handle = ready_handle();
        let mut registry = LayerRegistry::new();
        registry.register_source(&mut handle, "stops", points());
        registry
            .register_layer(
                &mut handle,
                "stops",
                vec![
                    ConcreteLayerSpec::new("stops-halo", "stops", RenderType::Circle),
                    ConcreteLayerSpec::new("stops-circle", "stops", RenderType::Circle),
                ],
                true,
            )
            .unwrap();

        let desired = vec![descriptor("stops", true), descriptor("unknown", false)];
        assert_eq!(registry.reconcile(&mut handle, &desired), 0);

        let desired = vec![descriptor("stops", false)];
        assert_eq!(registry.reconcile(&mut handle, &desired), 2);
        assert_eq!(registry.reconcile(&mut handle, &desired), 0);

        let map = handle.map().unwrap();
        assert_eq!(map.layout_visibility("stops-halo"), Some(Visibility::None));
        assert_eq!(map.layout_visibility("stops-circle"), Some(Visibility::None));
    }

    #[test]
    fn test_interactive_layers_are_topmost_first() {
        let mut handle = ready_handle();
        let mut registry = LayerRegistry::new();
        registry.register_source(&mut handle, "stops", points());
        for id in ["lower", "upper"] {
            registry
                .register_layer(
                    &mut handle,
                    id,
                    vec![ConcreteLayerSpec::new(id, "stops", RenderType::Circle)
                        .interactive(crate::data::geojson::FeatureCategory::MetroStation)],
                    true,
                )
                .unwrap();
        }
        registry
            .register_layer(
                &mut handle,
                "decor",
                vec![ConcreteLayerSpec::new("decor", "stops", RenderType::Circle)],
                true,
            )
            .unwrap();

        let ids: Vec<_> = registry.interactive_layers().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["upper", "lower"]);
    }

    #[test]
    fn test_remove_layer_then_source() {
        let mut handle = ready_handle();
        let mut registry = LayerRegistry::new();
        registry.register_source(&mut handle, "stops", points());
        registry
            .register_layer(
                &mut handle,
                "stops",
                vec![ConcreteLayerSpec::new("stops-circle", "stops", RenderType::Circle)],
                true,
            )
            .unwrap();

        assert!(!registry.remove_source(&mut handle, "stops"));
        assert!(registry.remove_layer(&mut handle, "stops"));
        assert!(registry.remove_source(&mut handle, "stops"));
        assert_eq!(registry.set_visibility(&mut handle, "stops", true), 0);

        let map = handle.map().unwrap();
        assert!(!map.has_layer("stops-circle"));
        assert!(!map.has_source("stops"));
    }
}
