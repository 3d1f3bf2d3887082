//! Hover and selection state machines for interactive layers.
//!
//! The dispatcher never touches the map. It consumes rendered-feature hits
//! (topmost first) and reports what changed as an [`InteractionOutcome`];
//! the controller turns outcomes into feature-state, cursor and popup
//! mutations.

use crate::{
    core::{geo::LatLng, map::{Cursor, RenderedFeature}},
    data::geojson::{FeatureCategory, FeatureId, FeatureProperties},
    layers::catalog::ConcreteLayerSpec,
    prelude::HashMap,
    sync::state::FeatureSelection,
};

/// The feature currently under the pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverState {
    pub abstract_layer: String,
    pub concrete_layer_id: String,
    pub source: String,
    pub feature_id: FeatureId,
}

#[derive(Debug, Clone, PartialEq)]
enum HoverMachine {
    Idle,
    Hovering(HoverState),
}

#[derive(Debug, Clone)]
struct Binding {
    abstract_layer: String,
    category: FeatureCategory,
}

/// What an input event changed
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    Unchanged,
    /// `left` loses its hover flag, `entered` gains it. `cursor` is set only
    /// on the idle/hovering edges.
    Hover {
        left: Option<HoverState>,
        entered: Option<HoverState>,
        cursor: Option<Cursor>,
    },
    Selected {
        previous: Option<FeatureSelection>,
        current: FeatureSelection,
    },
    Deselected(FeatureSelection),
}

/// Routes pointer and click events to the interactive layer hit on top
#[derive(Default)]
pub struct InteractionDispatcher {
    /// Concrete layer id to the abstract layer it belongs to
    bindings: HashMap<String, Binding>,
    /// One hover machine per abstract layer
    machines: HashMap<String, HoverMachine>,
    selection: Option<FeatureSelection>,
}

impl InteractionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires a concrete layer; decorative layers are ignored
    pub fn attach(&mut self, abstract_layer: &str, spec: &ConcreteLayerSpec) {
        let Some(category) = spec.interactive else {
            return;
        };
        self.bindings.insert(
            spec.id.clone(),
            Binding {
                abstract_layer: abstract_layer.to_string(),
                category,
            },
        );
        self.machines
            .entry(abstract_layer.to_string())
            .or_insert(HoverMachine::Idle);
    }

    /// Unwires every concrete layer of `abstract_layer`, releasing its hover
    pub fn detach(&mut self, abstract_layer: &str) -> InteractionOutcome {
        let outcome = match self.machines.get(abstract_layer) {
            Some(HoverMachine::Hovering(_)) => self.clear_hover(),
            _ => InteractionOutcome::Unchanged,
        };
        self.bindings.retain(|_, b| b.abstract_layer != abstract_layer);
        self.machines.remove(abstract_layer);
        outcome
    }

    /// Drops every binding, machine and the selection without reporting
    pub fn detach_all(&mut self) {
        self.bindings.clear();
        self.machines.clear();
        self.selection = None;
    }

    pub fn is_attached(&self, concrete_layer_id: &str) -> bool {
        self.bindings.contains_key(concrete_layer_id)
    }

    pub fn hover(&self) -> Option<&HoverState> {
        self.machines.values().find_map(|m| match m {
            HoverMachine::Hovering(state) => Some(state),
            HoverMachine::Idle => None,
        })
    }

    pub fn selection(&self) -> Option<&FeatureSelection> {
        self.selection.as_ref()
    }

    /// The topmost hit on an attached layer
    pub fn pick<'a>(&self, hits: &'a [RenderedFeature]) -> Option<&'a RenderedFeature> {
        hits.iter().find(|hit| self.is_attached(&hit.layer_id))
    }

    pub fn pointer_move(&mut self, hits: &[RenderedFeature]) -> InteractionOutcome {
        let target = self.pick(hits).and_then(|hit| {
            let binding = self.bindings.get(&hit.layer_id)?;
            Some(HoverState {
                abstract_layer: binding.abstract_layer.clone(),
                concrete_layer_id: hit.layer_id.clone(),
                source: hit.source.clone(),
                feature_id: hit.feature_id.clone(),
            })
        });

        match (self.hover().cloned(), target) {
            (None, None) => InteractionOutcome::Unchanged,
            (Some(current), Some(target)) if current == target => InteractionOutcome::Unchanged,
            (None, Some(entered)) => {
                self.set_machine(&entered.abstract_layer, HoverMachine::Hovering(entered.clone()));
                InteractionOutcome::Hover {
                    left: None,
                    entered: Some(entered),
                    cursor: Some(Cursor::Pointer),
                }
            }
            (Some(_), None) => self.clear_hover(),
            (Some(left), Some(entered)) => {
                // leave(a) + enter(b) as one transition, cursor untouched
                self.set_machine(&left.abstract_layer, HoverMachine::Idle);
                self.set_machine(&entered.abstract_layer, HoverMachine::Hovering(entered.clone()));
                InteractionOutcome::Hover {
                    left: Some(left),
                    entered: Some(entered),
                    cursor: None,
                }
            }
        }
    }

    pub fn pointer_leave(&mut self) -> InteractionOutcome {
        self.clear_hover()
    }

    /// Returns every machine to idle
    pub fn clear_hover(&mut self) -> InteractionOutcome {
        let Some(left) = self.hover().cloned() else {
            return InteractionOutcome::Unchanged;
        };
        for machine in self.machines.values_mut() {
            *machine = HoverMachine::Idle;
        }
        InteractionOutcome::Hover {
            left: Some(left),
            entered: None,
            cursor: Some(Cursor::Default),
        }
    }

    /// Selects, toggles off or replaces the selection. A click that hits no
    /// interactive layer leaves the selection as it is.
    pub fn click(&mut self, hits: &[RenderedFeature], lng_lat: LatLng) -> InteractionOutcome {
        let Some(hit) = self.pick(hits) else {
            return InteractionOutcome::Unchanged;
        };
        let Some(binding) = self.bindings.get(&hit.layer_id) else {
            return InteractionOutcome::Unchanged;
        };

        let same_feature = self
            .selection
            .as_ref()
            .is_some_and(|s| s.source == hit.source && s.feature_id == hit.feature_id);
        if same_feature {
            return self.deselect();
        }

        let current = FeatureSelection {
            abstract_layer: binding.abstract_layer.clone(),
            source_layer: hit.layer_id.clone(),
            source: hit.source.clone(),
            feature_id: hit.feature_id.clone(),
            category: binding.category,
            properties: FeatureProperties::decode(binding.category, &hit.properties),
            lng_lat,
        };
        let previous = self.selection.replace(current.clone());
        InteractionOutcome::Selected { previous, current }
    }

    pub fn deselect(&mut self) -> InteractionOutcome {
        match self.selection.take() {
            Some(previous) => InteractionOutcome::Deselected(previous),
            None => InteractionOutcome::Unchanged,
        }
    }

    /// Drops the selection when `keep` rejects it
    pub fn retain_selection(&mut self, keep: impl FnOnce(&FeatureSelection) -> bool) -> InteractionOutcome {
        match &self.selection {
            Some(selection) if !keep(selection) => self.deselect(),
            _ => InteractionOutcome::Unchanged,
        }
    }

    fn set_machine(&mut self, abstract_layer: &str, machine: HoverMachine) {
        if let Some(slot) = self.machines.get_mut(abstract_layer) {
            *slot = machine;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::catalog::RenderType;
    use serde_json::json;

    fn dispatcher() -> InteractionDispatcher {
        let mut dispatcher = InteractionDispatcher::new();
        dispatcher.attach(
            "tehsils",
            &ConcreteLayerSpec::new("tehsils-fill", "tehsils", RenderType::Fill)
                .interactive(FeatureCategory::Area),
        );
        dispatcher.attach(
            "tehsils",
            &ConcreteLayerSpec::new("tehsils-border", "tehsils", RenderType::Line),
        );
        dispatcher.attach(
            "metro-stations",
            &ConcreteLayerSpec::new("metro-stations-layer", "metroStations", RenderType::Circle)
                .interactive(FeatureCategory::MetroStation),
        );
        dispatcher
    }

    fn hit(layer: &str, source: &str, id: &str) -> RenderedFeature {
        RenderedFeature {
            layer_id: layer.to_string(),
            source: source.to_string(),
            feature_id: FeatureId::new(id),
            properties: json!({"name": id}).as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_decorative_layers_are_not_attached() {
        let dispatcher = dispatcher();
        assert!(dispatcher.is_attached("tehsils-fill"));
        assert!(!dispatcher.is_attached("tehsils-border"));
    }

    #[test]
    fn test_hover_enter_move_leave() {
        let mut dispatcher = dispatcher();
        let a = [hit("tehsils-fill", "tehsils", "a")];
        let b = [hit("tehsils-fill", "tehsils", "b")];

        match dispatcher.pointer_move(&a) {
            InteractionOutcome::Hover { left, entered, cursor } => {
                assert!(left.is_none());
                assert_eq!(entered.map(|e| e.feature_id), Some(FeatureId::new("a")));
                assert_eq!(cursor, Some(Cursor::Pointer));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(dispatcher.pointer_move(&a), InteractionOutcome::Unchanged);

        match dispatcher.pointer_move(&b) {
            InteractionOutcome::Hover { left, entered, cursor } => {
                assert_eq!(left.map(|l| l.feature_id), Some(FeatureId::new("a")));
                assert_eq!(entered.map(|e| e.feature_id), Some(FeatureId::new("b")));
                assert_eq!(cursor, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        match dispatcher.pointer_leave() {
            InteractionOutcome::Hover { left, entered, cursor } => {
                assert_eq!(left.map(|l| l.feature_id), Some(FeatureId::new("b")));
                assert!(entered.is_none());
                assert_eq!(cursor, Some(Cursor::Default));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(dispatcher.hover().is_none());
        assert_eq!(dispatcher.pointer_leave(), InteractionOutcome::Unchanged);
    }

    #[test]
    fn test_hover_across_layers_keeps_single_hover() {
        let mut dispatcher = dispatcher();
        dispatcher.pointer_move(&[hit("tehsils-fill", "tehsils", "a")]);
        dispatcher.pointer_move(&[
            hit("metro-stations-layer", "metroStations", "s1"),
            hit("tehsils-fill", "tehsils", "a"),
        ]);

        let hover = dispatcher.hover().unwrap();
        assert_eq!(hover.abstract_layer, "metro-stations");
        assert_eq!(
            dispatcher
                .machines
                .values()
                .filter(|m| matches!(m, HoverMachine::Hovering(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_click_select_toggle_replace() {
        let mut dispatcher = dispatcher();
        let at = LatLng::new(28.63, 77.21);
        let a = [hit("tehsils-fill", "tehsils", "a")];
        let b = [hit("tehsils-fill", "tehsils", "b")];

        assert!(matches!(
            dispatcher.click(&a, at),
            InteractionOutcome::Selected { previous: None, .. }
        ));
        assert!(matches!(dispatcher.click(&a, at), InteractionOutcome::Deselected(_)));
        assert!(dispatcher.selection().is_none());

        dispatcher.click(&a, at);
        match dispatcher.click(&b, at) {
            InteractionOutcome::Selected { previous, current } => {
                assert_eq!(previous.map(|p| p.feature_id), Some(FeatureId::new("a")));
                assert_eq!(current.feature_id, FeatureId::new("b"));
                assert_eq!(current.properties.name(), Some("b"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_click_on_empty_map_keeps_selection() {
        let mut dispatcher = dispatcher();
        let at = LatLng::new(28.63, 77.21);
        dispatcher.click(&[hit("tehsils-fill", "tehsils", "a")], at);

        assert_eq!(dispatcher.click(&[], at), InteractionOutcome::Unchanged);
        assert_eq!(
            dispatcher.click(&[hit("tehsils-border", "tehsils", "a")], at),
            InteractionOutcome::Unchanged
        );
        assert!(dispatcher.selection().is_some());
    }

    #[test]
    fn test_detach_releases_hover() {
        let mut dispatcher = dispatcher();
        dispatcher.pointer_move(&[hit("metro-stations-layer", "metroStations", "s1")]);

        assert!(matches!(
            dispatcher.detach("metro-stations"),
            InteractionOutcome::Hover { cursor: Some(Cursor::Default), .. }
        ));
        assert!(!dispatcher.is_attached("metro-stations-layer"));
        assert!(dispatcher.hover().is_none());
    }
}
