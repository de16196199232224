//! Mediator between a record model and its view.
//!
//! # Responsibility
//! - Forward user edits from the view to the model.
//! - Push model changes to the view on the view's own context.
//! - Hydrate the view on bind, on interest changes and on navigation.
//!
//! # Invariants
//! - A change is never pushed back to the view while the view's own edit of
//!   the same identity is being applied (no echo).
//! - The presenter's state lock is never held while calling the view or
//!   locking the model.
//! - Updates posted for an earlier binding are dropped when they run.
//! - Errors reach the view through `show_error`; none escape to the caller.

use crate::config::{InterestFilterMode, WindowConfig};
use crate::event::bus::{ChangeNotifier, ListenerError, ModelListener};
use crate::event::model_event::ModelEvent;
use crate::model::property_name::{PropertyIdentity, PropertyName, RowId};
use crate::model::value::PropertyValue;
use crate::presenter::context::ViewContext;
use crate::presenter::view::{ValueFuture, View, ViewListener};
use crate::window::error::{root_cause_message, ModelResult};
use crate::window::navigation::{NavigationDirection, NavigationOutcome, OnChangesFound};
use crate::window::record_model::{RecordModel, SharedModel};
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::error::Error;
use std::sync::{Arc, Weak};

struct Binding {
    model: SharedModel,
    view: Arc<dyn View>,
    bus: Arc<ChangeNotifier>,
    subscription: Arc<dyn ModelListener>,
    generation: u64,
}

#[derive(Default)]
struct PresenterState {
    binding: Option<Binding>,
    interest: HashSet<PropertyName>,
    pending_navigation: Option<NavigationDirection>,
    generation: u64,
}

/// Keeps one `RecordModel` and one `View` consistent.
///
/// Always handled through `Arc`; the model's bus and the view only hold weak
/// references back to it.
pub struct Presenter {
    context: Arc<dyn ViewContext>,
    interest_filter: InterestFilterMode,
    state: Mutex<PresenterState>,
    in_flight: Mutex<HashSet<PropertyIdentity>>,
    this: Weak<Presenter>,
}

impl Presenter {
    pub fn new(context: Arc<dyn ViewContext>, interest_filter: InterestFilterMode) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            context,
            interest_filter,
            state: Mutex::new(PresenterState::default()),
            in_flight: Mutex::new(HashSet::new()),
            this: this.clone(),
        })
    }

    pub fn from_config(context: Arc<dyn ViewContext>, config: &WindowConfig) -> Arc<Self> {
        Self::new(context, config.interest_filter)
    }

    pub fn interest_filter(&self) -> InterestFilterMode {
        self.interest_filter
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().binding.is_some()
    }

    /// Names the view currently displays.
    pub fn view_interest(&self) -> HashSet<PropertyName> {
        self.state.lock().interest.clone()
    }

    /// Binds `model` and `view`, replacing any previous pair, then hydrates
    /// the view.
    pub fn bind(&self, model: SharedModel, view: Arc<dyn View>) {
        self.unbind();

        let bus = model.lock().event_bus();
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.generation
        };
        let subscription: Arc<dyn ModelListener> = Arc::new(ModelSubscription {
            presenter: self.this.clone(),
            generation,
        });
        bus.register(Arc::clone(&subscription));
        view.set_listener(Some(Arc::new(ViewEndpoint {
            presenter: self.this.clone(),
        })));

        self.state.lock().binding = Some(Binding {
            model,
            view,
            bus,
            subscription,
            generation,
        });
        debug!("event=presenter_bind module=presenter status=ok generation={generation}");
        self.hydrate();
    }

    /// Replaces the view-interest set; re-hydrates only when it changed.
    pub fn set_view_interest<I>(&self, names: I)
    where
        I: IntoIterator<Item = PropertyName>,
    {
        let names: HashSet<PropertyName> = names.into_iter().collect();
        {
            let mut state = self.state.lock();
            if state.interest == names {
                trace!("event=view_interest module=presenter status=unchanged");
                return;
            }
            state.interest = names;
        }
        self.hydrate();
    }

    /// Applies an edit reported by the view.
    pub fn view_property_changed(&self, name: &PropertyName, value: PropertyValue) {
        let Some((model, _)) = self.bound_pair() else {
            debug!("event=view_edit module=presenter status=unbound name={name}");
            return;
        };
        let identity = {
            let model = model.lock();
            match model.descriptor().decompose(name) {
                Some((grid, row, cell)) => PropertyIdentity::grid_cell(&grid, &row, &cell),
                None => PropertyIdentity::Scalar(name.clone()),
            }
        };
        self.apply_edit(&model, identity, |model| model.set_property(name, value));
    }

    pub fn view_grid_property_changed(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
        value: PropertyValue,
    ) {
        let Some((model, _)) = self.bound_pair() else {
            debug!("event=view_edit module=presenter status=unbound grid={grid}");
            return;
        };
        let identity = PropertyIdentity::grid_cell(grid, row, cell);
        self.apply_edit(&model, identity, |model| {
            model.set_grid_property(grid, row, cell, value)
        });
    }

    pub fn view_next_record(&self, policy: OnChangesFound) {
        self.navigate(NavigationDirection::Next, policy);
    }

    pub fn view_previous_record(&self, policy: OnChangesFound) {
        self.navigate(NavigationDirection::Previous, policy);
    }

    /// Answer to `View::confirm_discard_changes`.
    pub fn view_discard_changes_confirmed(&self, confirmed: bool) {
        let pending = self.state.lock().pending_navigation.take();
        let Some(direction) = pending else {
            debug!("event=discard_confirmed module=presenter status=nothing_pending");
            return;
        };
        if confirmed {
            self.run_navigation(direction, OnChangesFound::Discard);
        } else {
            debug!(
                "event=discard_confirmed module=presenter status=declined direction={}",
                direction.as_str()
            );
        }
    }

    pub fn view_save_editing(&self) {
        let Some((model, view)) = self.bound_pair() else {
            return;
        };
        view.commit_changes();
        let result = model.lock().save_record();
        if let Err(err) = result {
            self.report_error(&err);
        }
    }

    pub fn view_cancel_editing(&self) {
        let Some((model, _)) = self.bound_pair() else {
            return;
        };
        model.lock().cancel_record_editing();
    }

    pub fn view_request_value(&self, name: &PropertyName) -> ValueFuture {
        let value = self
            .bound_pair()
            .map(|(model, _)| model.lock().get_property_or_null(name).clone())
            .unwrap_or_default();
        ValueFuture::ready(value)
    }

    pub fn view_request_grid_value(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
    ) -> ValueFuture {
        let value = self
            .bound_pair()
            .map(|(model, _)| model.lock().get_grid_property(grid, row, cell).clone())
            .unwrap_or_default();
        ValueFuture::ready(value)
    }

    /// Logs `err` and shows its root cause on the bound view.
    pub fn report_error(&self, err: &(dyn Error + 'static)) {
        warn!("event=presenter_error module=presenter status=error error={err}");
        let Some((generation, view)) = self.bound_view() else {
            return;
        };
        let message = root_cause_message(err);
        self.dispatch(generation, view, move |view| view.show_error(&message));
    }

    /// Detaches from the model's bus and the view. Updates already posted
    /// for this binding are dropped when they run.
    pub fn dispose(&self) {
        self.unbind();
        self.in_flight.lock().clear();
    }

    fn unbind(&self) {
        let binding = {
            let mut state = self.state.lock();
            state.pending_navigation = None;
            let binding = state.binding.take();
            if binding.is_some() {
                state.generation += 1;
            }
            binding
        };
        let Some(binding) = binding else {
            return;
        };
        binding.bus.unregister(&binding.subscription);
        binding.view.set_listener(None);
        debug!(
            "event=presenter_unbind module=presenter status=ok generation={}",
            binding.generation
        );
    }

    fn bound_pair(&self) -> Option<(SharedModel, Arc<dyn View>)> {
        let state = self.state.lock();
        state
            .binding
            .as_ref()
            .map(|binding| (Arc::clone(&binding.model), Arc::clone(&binding.view)))
    }

    fn bound_view(&self) -> Option<(u64, Arc<dyn View>)> {
        let state = self.state.lock();
        state
            .binding
            .as_ref()
            .map(|binding| (binding.generation, Arc::clone(&binding.view)))
    }

    fn is_live(&self, generation: u64) -> bool {
        self.state
            .lock()
            .binding
            .as_ref()
            .is_some_and(|binding| binding.generation == generation)
    }

    fn apply_edit<F>(&self, model: &SharedModel, identity: PropertyIdentity, edit: F)
    where
        F: FnOnce(&mut RecordModel) -> ModelResult<bool>,
    {
        let result = {
            let _guard = InFlightGuard::mark(&self.in_flight, identity.clone());
            let mut model = model.lock();
            edit(&mut model)
        };
        match result {
            Ok(changed) => {
                trace!("event=view_edit module=presenter status=ok name={identity} changed={changed}");
            }
            Err(err) => self.report_error(&err),
        }
    }

    fn navigate(&self, direction: NavigationDirection, policy: OnChangesFound) {
        let Some((_, view)) = self.bound_pair() else {
            return;
        };
        view.commit_changes();
        self.run_navigation(direction, policy);
    }

    fn run_navigation(&self, direction: NavigationDirection, policy: OnChangesFound) {
        let Some((model, _)) = self.bound_pair() else {
            return;
        };
        let outcome = model.lock().navigate(direction, policy);
        match outcome {
            Ok(NavigationOutcome::Moved(record)) => {
                self.state.lock().pending_navigation = None;
                debug!("event=view_navigate module=presenter status=ok record={record}");
            }
            Ok(NavigationOutcome::ConfirmationRequested) => {
                debug!(
                    "event=view_navigate module=presenter status=confirmation_requested direction={}",
                    direction.as_str()
                );
            }
            Ok(NavigationOutcome::NoRecord) => {
                debug!(
                    "event=view_navigate module=presenter status=no_record direction={}",
                    direction.as_str()
                );
            }
            Err(err) => self.report_error(&err),
        }
    }

    /// Pushes the navigation flags and the interesting values of the current
    /// record.
    fn hydrate(&self) {
        let (generation, model, view, interest) = {
            let state = self.state.lock();
            let Some(binding) = state.binding.as_ref() else {
                return;
            };
            (
                binding.generation,
                Arc::clone(&binding.model),
                Arc::clone(&binding.view),
                state.interest.clone(),
            )
        };
        let (has_previous, has_next, values) = {
            let model = model.lock();
            (
                model.has_previous_record(),
                model.has_next_record(),
                model.get_property_value_snapshot(interest.iter()),
            )
        };
        self.dispatch(generation, view, move |view| {
            view.set_previous_record_enabled(has_previous);
            view.set_next_record_enabled(has_next);
            view.set_properties(&values);
        });
    }

    fn on_model_event(&self, generation: u64, event: &ModelEvent) {
        let (view, interest) = {
            let state = self.state.lock();
            match state.binding.as_ref() {
                Some(binding) if binding.generation == generation => {
                    (Arc::clone(&binding.view), state.interest.clone())
                }
                _ => {
                    trace!(
                        "event=model_event module=presenter status=stale kind={}",
                        event.kind()
                    );
                    return;
                }
            }
        };

        if let Some(identity) = event.identity() {
            if self.in_flight.lock().contains(&identity) {
                trace!("event=model_event module=presenter status=suppressed name={identity}");
                return;
            }
        }

        match event {
            ModelEvent::PropertyChanged(change) => {
                if !self.admits(&interest, &[&change.name], event) {
                    return;
                }
                let (name, value) = (change.name.clone(), change.value.clone());
                self.dispatch(generation, view, move |view| view.set_property(&name, &value));
            }
            ModelEvent::GridPropertyChanged(change) => {
                let composite =
                    PropertyIdentity::grid_cell(&change.grid, &change.row, &change.cell)
                        .to_property_name();
                if !self.admits(&interest, &[&change.grid, &composite], event) {
                    return;
                }
                let change = change.clone();
                self.dispatch(generation, view, move |view| {
                    view.set_grid_property(&change.grid, &change.row, &change.cell, &change.value)
                });
            }
            ModelEvent::GridRowAdded(added) => {
                if !self.admits(&interest, &[&added.grid], event) {
                    return;
                }
                let added = added.clone();
                self.dispatch(generation, view, move |view| {
                    view.grid_new_row(&added.grid, &added.row, &added.initial_values)
                });
            }
            ModelEvent::AllPropertiesChanged(all) => {
                let values = match self.interest_filter {
                    InterestFilterMode::Strict => all.values.restricted_to(interest.iter()),
                    InterestFilterMode::Advisory => all.values.clone(),
                };
                let (has_previous, has_next) = (all.has_previous, all.has_next);
                self.dispatch(generation, view, move |view| {
                    view.set_previous_record_enabled(has_previous);
                    view.set_next_record_enabled(has_next);
                    view.set_properties(&values);
                });
            }
            ModelEvent::ConfirmDiscardChanges(confirm) => {
                self.state.lock().pending_navigation = Some(confirm.direction);
                self.dispatch(generation, view, |view| view.confirm_discard_changes());
            }
        }
    }

    /// Interest check for one change; any of `names` in the interest set
    /// admits it.
    fn admits(
        &self,
        interest: &HashSet<PropertyName>,
        names: &[&PropertyName],
        event: &ModelEvent,
    ) -> bool {
        if names.iter().any(|name| interest.contains(*name)) {
            return true;
        }
        match self.interest_filter {
            InterestFilterMode::Strict => {
                trace!(
                    "event=model_event module=presenter status=filtered kind={} name={}",
                    event.kind(),
                    names[0]
                );
                false
            }
            InterestFilterMode::Advisory => {
                debug!(
                    "event=model_event module=presenter status=outside_interest kind={} name={}",
                    event.kind(),
                    names[0]
                );
                true
            }
        }
    }

    /// Runs `task` on the view context: inline when already there, posted
    /// otherwise.
    fn dispatch<F>(&self, generation: u64, view: Arc<dyn View>, task: F)
    where
        F: FnOnce(&dyn View) + Send + 'static,
    {
        if self.context.is_current() {
            task(view.as_ref());
            return;
        }

        let presenter = self.this.clone();
        let posted = self.context.post(Box::new(move || {
            let live = presenter
                .upgrade()
                .is_some_and(|presenter| presenter.is_live(generation));
            if live {
                task(view.as_ref());
            } else {
                trace!("event=view_update module=presenter status=stale generation={generation}");
            }
        }));
        if let Err(err) = posted {
            warn!("event=view_update module=presenter status=error error={err}");
        }
    }
}

impl std::fmt::Debug for Presenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Presenter")
            .field("interest_filter", &self.interest_filter)
            .field("bound", &state.binding.is_some())
            .field("generation", &state.generation)
            .finish()
    }
}

/// Removes an in-flight marker on every exit path, unwinding included.
struct InFlightGuard<'a> {
    markers: &'a Mutex<HashSet<PropertyIdentity>>,
    identity: Option<PropertyIdentity>,
}

impl<'a> InFlightGuard<'a> {
    fn mark(markers: &'a Mutex<HashSet<PropertyIdentity>>, identity: PropertyIdentity) -> Self {
        // A nested edit of the same identity leaves removal to the outer guard.
        let inserted = markers.lock().insert(identity.clone());
        Self {
            markers,
            identity: inserted.then_some(identity),
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(identity) = self.identity.take() {
            self.markers.lock().remove(&identity);
        }
    }
}

/// Bus subscriber of one binding.
struct ModelSubscription {
    presenter: Weak<Presenter>,
    generation: u64,
}

impl ModelListener for ModelSubscription {
    fn on_model_event(&self, event: &ModelEvent) -> Result<(), ListenerError> {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.on_model_event(self.generation, event);
        }
        Ok(())
    }
}

/// Listener installed on the view.
struct ViewEndpoint {
    presenter: Weak<Presenter>,
}

impl ViewListener for ViewEndpoint {
    fn view_property_changed(&self, name: &PropertyName, value: PropertyValue) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.view_property_changed(name, value);
        }
    }

    fn view_grid_property_changed(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
        value: PropertyValue,
    ) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.view_grid_property_changed(grid, row, cell, value);
        }
    }

    fn view_next_record(&self, policy: OnChangesFound) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.view_next_record(policy);
        }
    }

    fn view_previous_record(&self, policy: OnChangesFound) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.view_previous_record(policy);
        }
    }

    fn view_save_editing(&self) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.view_save_editing();
        }
    }

    fn view_cancel_editing(&self) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.view_cancel_editing();
        }
    }

    fn view_subscribe_to_value_changes(&self, names: Vec<PropertyName>) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.set_view_interest(names);
        }
    }

    fn view_discard_changes_confirmed(&self, confirmed: bool) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.view_discard_changes_confirmed(confirmed);
        }
    }

    fn view_request_value(&self, name: &PropertyName) -> ValueFuture {
        self.presenter
            .upgrade()
            .map(|presenter| presenter.view_request_value(name))
            .unwrap_or_default()
    }

    fn view_request_grid_value(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
    ) -> ValueFuture {
        self.presenter
            .upgrade()
            .map(|presenter| presenter.view_request_grid_value(grid, row, cell))
            .unwrap_or_default()
    }
}
