//! The synchronization controller.
//!
//! `SyncController` owns the map for the lifetime of a mount. It loads the
//! base datasets once the map signals readiness, keeps layer visibility and
//! theme paint in line with the application state, and turns map events into
//! hover styling, popups and state actions.

use crate::{
    core::{
        config::{MapConfig, Theme, TimeRange},
        geo::LatLng,
        map::{MapCommand, MapHandle, MapInstance, RenderedFeature},
    },
    data::{
        source::{DataSource, DatasetName, LoadedDatasets},
        upload::UploadedLayer,
    },
    input::{
        dispatcher::{HoverState, InteractionDispatcher, InteractionOutcome},
        events::{EventQueue, MapEvent},
    },
    layers::{
        catalog::{self, LayerDescriptor},
        registry::LayerRegistry,
        style::background_color,
    },
    sync::state::{AppStateSnapshot, AreaKpis, FeatureSelection, StateAction},
    ui::popup::{PopupRenderer, PopupState},
    MapError, Result,
};
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Receives every action the engine emits towards the state container
pub type StateCallback = Box<dyn FnMut(StateAction)>;

/// A pending fetch of the base dataset group.
///
/// Tickets carry the load generation they were issued under; completing a
/// ticket from an older generation, or after unmount, is a no-op.
pub struct LoadTicket {
    generation: u64,
    names: Vec<DatasetName>,
    source: Arc<dyn DataSource>,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn datasets(&self) -> &[DatasetName] {
        &self.names
    }

    /// Fetches every dataset of the group concurrently
    pub async fn fetch(&self) -> Result<LoadedDatasets> {
        self.source.load(&self.names).await
    }
}

pub struct SyncController<M: MapInstance> {
    config: MapConfig,
    map: MapHandle<M>,
    registry: LayerRegistry,
    dispatcher: InteractionDispatcher,
    source: Arc<dyn DataSource>,
    on_change: StateCallback,
    events: EventQueue,
    popup: Option<PopupState>,
    /// Last snapshot passed to `apply_state`
    desired: Option<AppStateSnapshot>,
    /// Theme the map is currently painted with
    theme: Theme,
    time_range: TimeRange,
    generation: u64,
    base_loaded: bool,
    uploads: Vec<UploadedLayer>,
    upload_sequence: usize,
}

impl<M: MapInstance> SyncController<M> {
    /// Creates the map through `factory` and takes ownership of it
    pub fn mount<F>(
        config: MapConfig,
        factory: F,
        source: Arc<dyn DataSource>,
        on_change: impl FnMut(StateAction) + 'static,
    ) -> Self
    where
        F: FnOnce(&MapConfig) -> M,
    {
        log::info!(
            "mounting map at {:.4}, {:.4} (zoom {})",
            config.center.lat,
            config.center.lng,
            config.zoom
        );

        let mut map = MapHandle::new(factory(&config));
        map.request(MapCommand::SetBackground(background_color(config.theme)));

        Self {
            theme: config.theme,
            time_range: config.time_range,
            config,
            map,
            registry: LayerRegistry::new(),
            dispatcher: InteractionDispatcher::new(),
            source,
            on_change: Box::new(on_change),
            events: EventQueue::new(),
            popup: None,
            desired: None,
            generation: 0,
            base_loaded: false,
            uploads: Vec::new(),
            upload_sequence: 0,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// The live map; `None` after unmount
    pub fn map(&self) -> Option<&M> {
        self.map.map()
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn selection(&self) -> Option<&FeatureSelection> {
        self.dispatcher.selection()
    }

    pub fn hover(&self) -> Option<&HoverState> {
        self.dispatcher.hover()
    }

    pub fn popup(&self) -> Option<&PopupState> {
        self.popup.as_ref()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self) -> bool {
        self.map.is_ready()
    }

    pub fn is_base_loaded(&self) -> bool {
        self.base_loaded
    }

    pub fn is_mounted(&self) -> bool {
        !self.map.is_destroyed()
    }

    pub fn uploads(&self) -> &[UploadedLayer] {
        &self.uploads
    }

    /// Handle for delivering map events from elsewhere
    pub fn event_sender(&self) -> Sender<MapEvent> {
        self.events.sender()
    }

    pub fn push_event(&self, event: MapEvent) {
        self.events.push(event);
    }

    /// Handles every queued event in arrival order, returning the load
    /// tickets they produced
    pub fn pump_events(&mut self) -> Vec<LoadTicket> {
        let events = self.events.drain();
        events
            .into_iter()
            .filter_map(|event| self.handle_event(event))
            .collect()
    }

    /// Handles one map event. Only `Load` yields a ticket.
    pub fn handle_event(&mut self, event: MapEvent) -> Option<LoadTicket> {
        if self.map.is_destroyed() {
            log::debug!("ignoring {:?} after unmount", event);
            return None;
        }

        match event {
            MapEvent::Load => return self.on_load(),
            MapEvent::Click { lng_lat } => {
                let hits = self.hits_at(lng_lat);
                let outcome = self.dispatcher.click(&hits, lng_lat);
                self.apply_outcome(outcome);
            }
            MapEvent::PointerMove { lng_lat } => {
                let hits = self.hits_at(lng_lat);
                let outcome = self.dispatcher.pointer_move(&hits);
                self.apply_outcome(outcome);
            }
            MapEvent::PointerLeave => {
                let outcome = self.dispatcher.pointer_leave();
                self.apply_outcome(outcome);
            }
        }
        None
    }

    fn on_load(&mut self) -> Option<LoadTicket> {
        if self.map.is_ready() {
            log::debug!("ignoring repeated load signal");
            return None;
        }
        let flushed = self.map.mark_loaded();
        log::info!("map loaded, flushed {} buffered mutations", flushed);
        Some(self.begin_load())
    }

    fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
            names: DatasetName::ALL.to_vec(),
            source: Arc::clone(&self.source),
        }
    }

    /// Starts a fresh load of the base datasets, superseding any load still
    /// in flight. `None` until the map has loaded.
    pub fn reload(&mut self) -> Option<LoadTicket> {
        if !self.map.is_ready() {
            return None;
        }
        Some(self.begin_load())
    }

    /// Applies the outcome of a fetch.
    ///
    /// Returns the number of abstract layers newly registered. A failed
    /// group registers nothing and is reported through
    /// [`StateAction::LoadFailed`].
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<LoadedDatasets>) -> Result<usize> {
        if self.map.is_destroyed() || ticket.generation != self.generation {
            log::debug!(
                "discarding stale load (generation {}, current {})",
                ticket.generation,
                self.generation
            );
            return Ok(0);
        }

        let datasets = match result.and_then(|datasets| check_complete(&ticket, datasets)) {
            Ok(datasets) => datasets,
            Err(e) => {
                log::error!("base dataset load failed: {}", e);
                self.emit(StateAction::LoadFailed(e.to_string()));
                return Err(e);
            }
        };
        self.register_base(datasets)
    }

    /// Fires the load signal, fetches the base datasets and registers them
    pub async fn initialize(&mut self) -> Result<usize> {
        let Some(ticket) = self.handle_event(MapEvent::Load) else {
            return Ok(0);
        };
        let result = ticket.fetch().await;
        self.complete_load(ticket, result)
    }

    fn register_base(&mut self, datasets: LoadedDatasets) -> Result<usize> {
        for (name, data) in datasets {
            self.registry
                .register_source(&mut self.map, name.source_id(), data);
        }

        let mut registered = 0;
        for layer in catalog::base_layers(self.theme) {
            if self.registry.has_layer(&layer.abstract_id) {
                continue;
            }
            let visible = self.desired_visibility(&layer.abstract_id);
            self.registry
                .register_layer(&mut self.map, &layer.abstract_id, layer.specs.clone(), visible)?;
            for spec in &layer.specs {
                self.dispatcher.attach(&layer.abstract_id, spec);
            }
            registered += 1;
        }
        self.base_loaded = true;
        log::info!(
            "registered {} layers ({} concrete)",
            registered,
            self.registry.concrete_layer_count()
        );

        self.validate_selection();
        self.validate_hover();
        if let Some(desired) = self.desired.clone() {
            self.registry.reconcile(&mut self.map, desired.descriptors());
        }
        Ok(registered)
    }

    /// Visibility from the last snapshot, falling back to the catalog default
    /// for layers the snapshot does not mention
    fn desired_visibility(&self, abstract_id: &str) -> bool {
        match self.desired.as_ref().and_then(|d| d.layer(abstract_id)) {
            Some(descriptor) => descriptor.visible,
            None => catalog::default_descriptors()
                .iter()
                .any(|d| d.id == abstract_id && d.visible),
        }
    }

    /// Brings the map in line with `state`.
    ///
    /// Visibility is reconciled per layer; the density ramp and background
    /// are repainted only when the theme differs from the one on the map.
    /// Applying the same snapshot twice issues nothing the second time.
    /// Returns the number of mutations issued.
    pub fn apply_state(&mut self, state: &AppStateSnapshot) -> usize {
        if self.map.is_destroyed() {
            return 0;
        }

        let mut issued = self.registry.reconcile(&mut self.map, state.descriptors());
        if state.theme != self.theme {
            issued += self.repaint(state.theme);
        }
        if state.time_range != self.time_range {
            log::debug!(
                "time filter {}..{} at {}",
                state.time_range.start,
                state.time_range.end,
                state.time_range.current
            );
            self.time_range = state.time_range;
        }
        issued += self.release_hidden_hover();

        self.desired = Some(state.clone());
        issued
    }

    fn repaint(&mut self, theme: Theme) -> usize {
        log::info!("repainting for {} theme", if theme.is_dark { "dark" } else { "light" });

        let mut issued = 0;
        for (layer, property, value) in catalog::theme_paints(theme) {
            issued += self.registry.set_paint(&mut self.map, layer, property, value);
        }
        self.map
            .request(MapCommand::SetBackground(background_color(theme)));
        self.theme = theme;
        issued + 1
    }

    /// A hovered layer that was just hidden can no longer receive a leave
    fn release_hidden_hover(&mut self) -> usize {
        let hidden = self
            .dispatcher
            .hover()
            .is_some_and(|h| !self.registry.is_concrete_visible(&h.concrete_layer_id));
        if !hidden {
            return 0;
        }
        let outcome = self.dispatcher.clear_hover();
        self.apply_outcome(outcome)
    }

    /// Clears the selection and closes its popup
    pub fn deselect(&mut self) {
        let outcome = self.dispatcher.deselect();
        self.apply_outcome(outcome);
    }

    /// Parses and registers an uploaded GeoJSON file as its own layer.
    ///
    /// Uploads are independent of the base load group: a rejected upload
    /// leaves everything else untouched and is reported through
    /// [`StateAction::UploadRejected`].
    pub fn add_uploaded_layer(&mut self, file_name: &str, text: &str) -> Result<LayerDescriptor> {
        if self.map.is_destroyed() {
            return Err(MapError::Config("map is not mounted".to_string()));
        }

        let upload = match UploadedLayer::parse(file_name, text, self.upload_sequence) {
            Ok(upload) => upload,
            Err(e) => {
                log::warn!("rejected upload {}: {}", file_name, e);
                self.emit(StateAction::UploadRejected(e.to_string()));
                return Err(e);
            }
        };
        self.upload_sequence += 1;

        let registration = catalog::upload_layers(&upload);
        self.registry
            .register_source(&mut self.map, &upload.id, upload.data.clone());
        self.registry.register_layer(
            &mut self.map,
            &registration.abstract_id,
            registration.specs.clone(),
            upload.visible,
        )?;
        for spec in &registration.specs {
            self.dispatcher.attach(&registration.abstract_id, spec);
        }

        log::info!(
            "added uploaded layer {} ({}, {} features)",
            upload.id,
            upload.name,
            upload.data.len()
        );
        let descriptor = upload.descriptor();
        self.uploads.push(upload);
        Ok(descriptor)
    }

    pub fn remove_uploaded_layer(&mut self, id: &str) -> bool {
        let Some(index) = self.uploads.iter().position(|u| u.id == id) else {
            return false;
        };
        self.uploads.remove(index);

        let outcome = self.dispatcher.detach(id);
        self.apply_outcome(outcome);
        self.registry.remove_layer(&mut self.map, id);
        self.registry.remove_source(&mut self.map, id);
        self.validate_selection();
        log::info!("removed uploaded layer {}", id);
        true
    }

    /// Tears the map down. In-flight loads are discarded and later calls
    /// issue nothing.
    pub fn unmount(&mut self) {
        if self.map.is_destroyed() {
            return;
        }
        self.generation += 1;
        self.dispatcher.detach_all();
        self.registry.clear();
        self.popup = None;
        self.uploads.clear();
        self.map.destroy();
        log::info!("map unmounted");
    }

    fn hits_at(&self, lng_lat: LatLng) -> Vec<RenderedFeature> {
        let layers: Vec<String> = self
            .registry
            .interactive_layers()
            .into_iter()
            .filter(|spec| self.dispatcher.is_attached(&spec.id))
            .map(|spec| spec.id.clone())
            .collect();
        self.map.query_rendered_features(lng_lat, &layers)
    }

    /// Drops a selection whose feature no longer exists in its source
    fn validate_selection(&mut self) {
        let registry = &self.registry;
        let outcome = self
            .dispatcher
            .retain_selection(|s| registry.contains_feature(&s.source, &s.feature_id));
        self.apply_outcome(outcome);
    }

    /// Releases a hover whose feature is gone from its source
    fn validate_hover(&mut self) -> usize {
        let stale = self
            .dispatcher
            .hover()
            .is_some_and(|h| !self.registry.contains_feature(&h.source, &h.feature_id));
        if !stale {
            return 0;
        }
        let outcome = self.dispatcher.clear_hover();
        self.apply_outcome(outcome)
    }

    /// Issues the mutations and actions for an interaction outcome. Returns
    /// the number of map mutations.
    fn apply_outcome(&mut self, outcome: InteractionOutcome) -> usize {
        match outcome {
            InteractionOutcome::Unchanged => 0,
            InteractionOutcome::Hover {
                left,
                entered,
                cursor,
            } => {
                let mut issued = 0;
                for (state, hover) in [(left, false), (entered, true)] {
                    if let Some(state) = state {
                        self.map.request(MapCommand::SetFeatureState {
                            source: state.source,
                            feature: state.feature_id,
                            hover,
                        });
                        issued += 1;
                    }
                }
                if let Some(cursor) = cursor {
                    self.map.request(MapCommand::SetCursor(cursor));
                    issued += 1;
                }
                issued
            }
            InteractionOutcome::Selected { current, .. } => {
                let mut issued = self.close_popup();
                let html = PopupRenderer::render(&current.properties);
                self.map.request(MapCommand::ShowPopup {
                    lng_lat: current.lng_lat,
                    html: html.clone(),
                });
                self.popup = Some(PopupState::new(current.lng_lat, html));
                issued += 1;

                log::debug!("selected {} on {}", current.feature_id, current.source_layer);
                self.emit(StateAction::SelectFeature(Some(current.feature_id.clone())));
                self.emit(StateAction::SetSelectedAreaKpis(AreaKpis::for_selection(&current)));
                issued
            }
            InteractionOutcome::Deselected(previous) => {
                log::debug!("deselected {}", previous.feature_id);
                let issued = self.close_popup();
                self.emit(StateAction::SelectFeature(None));
                self.emit(StateAction::SetSelectedAreaKpis(None));
                issued
            }
        }
    }

    fn close_popup(&mut self) -> usize {
        if self.popup.take().is_none() {
            return 0;
        }
        self.map.request(MapCommand::RemovePopup);
        1
    }

    fn emit(&mut self, action: StateAction) {
        log::trace!("state action {:?}", action);
        (self.on_change)(action);
    }
}

impl<M: MapInstance> Drop for SyncController<M> {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// A group result must hold every dataset the ticket asked for
fn check_complete(ticket: &LoadTicket, datasets: LoadedDatasets) -> Result<LoadedDatasets> {
    match ticket.names.iter().find(|name| !datasets.contains_key(*name)) {
        Some(missing) => Err(MapError::DataLoad {
            dataset: missing.to_string(),
            reason: "missing from load result".to_string(),
        }),
        None => Ok(datasets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::headless::HeadlessMap,
        data::source::StaticDataSource,
    };
    use std::{cell::RefCell, rc::Rc};

    fn controller() -> (SyncController<HeadlessMap>, Rc<RefCell<Vec<StateAction>>>) {
        let actions = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&actions);
        let source = Arc::new(StaticDataSource::mock().unwrap());
        let controller = SyncController::mount(
            MapConfig::default(),
            HeadlessMap::new,
            source,
            move |action| sink.borrow_mut().push(action),
        );
        (controller, actions)
    }

    #[test]
    fn test_background_waits_for_load() {
        let (mut controller, _) = controller();
        assert_eq!(controller.map().map(|m| m.mutation_count()), Some(0));

        let ticket = controller.handle_event(MapEvent::Load);
        assert!(ticket.is_some());
        assert_eq!(
            controller.map().and_then(|m| m.background()),
            Some(background_color(Theme::light()))
        );
        assert!(controller.handle_event(MapEvent::Load).is_none());
    }

    #[tokio::test]
    async fn test_superseded_ticket_is_discarded() {
        let (mut controller, _) = controller();
        let first = controller.handle_event(MapEvent::Load).unwrap();
        let second = controller.reload().unwrap();

        let stale = first.fetch().await;
        assert_eq!(controller.complete_load(first, stale).unwrap(), 0);
        assert!(!controller.is_base_loaded());

        let fresh = second.fetch().await;
        assert_eq!(controller.complete_load(second, fresh).unwrap(), 7);
        assert!(controller.is_base_loaded());
    }

    #[test]
    fn test_incomplete_result_registers_nothing() {
        let (mut controller, actions) = controller();
        let ticket = controller.handle_event(MapEvent::Load).unwrap();

        let err = controller
            .complete_load(ticket, Ok(LoadedDatasets::new()))
            .unwrap_err();
        assert!(matches!(err, MapError::DataLoad { .. }));
        assert_eq!(controller.registry().layer_count(), 0);
        assert!(matches!(actions.borrow()[0], StateAction::LoadFailed(_)));
    }

    #[test]
    fn test_events_after_unmount_are_ignored() {
        let (mut controller, actions) = controller();
        controller.unmount();
        assert!(!controller.is_mounted());

        controller.push_event(MapEvent::Load);
        controller.push_event(MapEvent::Click {
            lng_lat: LatLng::new(28.63, 77.21),
        });
        assert!(controller.pump_events().is_empty());
        assert_eq!(controller.apply_state(&AppStateSnapshot::default()), 0);
        assert!(actions.borrow().is_empty());
        assert!(controller.map().is_none());
    }
}
