//! Owns the module registry, the active view and the dashboard-wide scenario selection.
//!
//! User actions enter here and leave as bus events; modules react on their own.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde_json::Value;
use shared::{
    domain::{MechanicId, ScenarioId, TaskId, TeamName, ViewKind, ViewName},
    protocol::{AssignmentGenerated, Document, GenerateAssignmentsRequest},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    api_client::{ApiClient, RequestError},
    container::Container,
    event_bus::{DashboardEvent, EventBus, SubscriberId, Topic},
    module::{Lifecycle, Module, ModuleError, ModuleHooks},
    selection::{Selection, SelectionCell, SelectionReader},
    views::ScenarioView,
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("module '{0}' is already registered")]
    DuplicateModule(ViewName),
    #[error("no container provided for module '{0}'")]
    MissingContainer(ViewName),
    #[error("unknown view '{0}'")]
    UnknownView(ViewName),
    #[error("module '{0}' has been destroyed")]
    ModuleDestroyed(ViewName),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Request(#[from] RequestError),
}

pub type ModuleFactory = Box<dyn FnOnce(SelectionReader) -> Arc<dyn ModuleHooks> + Send>;

/// One entry of the module registry: the view it serves, the name it reports in lifecycle
/// events, the container it renders into and how to build its hooks.
pub struct ModuleSpec {
    pub view: ViewName,
    pub module_name: String,
    pub container: Option<Arc<dyn Container>>,
    pub factory: ModuleFactory,
}

impl ModuleSpec {
    pub fn new<F>(
        view: impl Into<ViewName>,
        module_name: impl Into<String>,
        container: Option<Arc<dyn Container>>,
        factory: F,
    ) -> Self
    where
        F: FnOnce(SelectionReader) -> Arc<dyn ModuleHooks> + Send + 'static,
    {
        Self {
            view: view.into(),
            module_name: module_name.into(),
            container,
            factory: Box::new(factory),
        }
    }

    pub fn scenario_view(kind: ViewKind, container: Option<Arc<dyn Container>>) -> Self {
        Self::new(
            kind.view_name(),
            kind.module_name(),
            container,
            move |selection| Arc::new(ScenarioView::new(kind, selection)) as Arc<dyn ModuleHooks>,
        )
    }
}

/// Specs for the four built-in views, asking `container_for` for each render target.
pub fn default_module_specs<F>(mut container_for: F) -> Vec<ModuleSpec>
where
    F: FnMut(ViewKind) -> Option<Arc<dyn Container>>,
{
    ViewKind::ALL
        .into_iter()
        .map(|kind| ModuleSpec::scenario_view(kind, container_for(kind)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    pub view: ViewName,
    pub module_name: String,
    pub lifecycle: Lifecycle,
    pub visible: bool,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStatus {
    pub selection: Selection,
    pub modules: Vec<ModuleStatus>,
}

struct RegisteredModule {
    view: ViewName,
    module: Arc<Module>,
}

pub struct Orchestrator {
    bus: Arc<EventBus>,
    api: Arc<ApiClient>,
    modules: Vec<RegisteredModule>,
    selection: SelectionCell,
    // Serializes view switches, which await module initialization.
    switching: tokio::sync::Mutex<()>,
    owner: SubscriberId,
    initialized: AtomicBool,
}

impl Orchestrator {
    pub fn new(bus: Arc<EventBus>, api: Arc<ApiClient>, scenario: ScenarioId) -> Self {
        let owner = bus.new_subscriber_id();
        Self {
            bus,
            api,
            modules: Vec::new(),
            selection: SelectionCell::new(scenario),
            switching: tokio::sync::Mutex::new(()),
            owner,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn selection(&self) -> SelectionReader {
        self.selection.reader()
    }

    /// Stores a module without initializing it; it is initialized on first activation.
    pub fn register_module(
        &mut self,
        view: impl Into<ViewName>,
        module: Arc<Module>,
    ) -> Result<(), OrchestratorError> {
        let view = view.into();
        if self.module(&view).is_some() {
            return Err(OrchestratorError::DuplicateModule(view));
        }
        info!(%view, module = module.name(), "registered module");
        self.modules.push(RegisteredModule { view, module });
        Ok(())
    }

    /// Validates the whole registry before building anything: duplicate views and missing
    /// containers are configuration errors.
    pub fn register_from_specs(
        &mut self,
        specs: Vec<ModuleSpec>,
    ) -> Result<(), OrchestratorError> {
        let mut seen: HashSet<ViewName> = self.modules.iter().map(|m| m.view.clone()).collect();
        for spec in &specs {
            if !seen.insert(spec.view.clone()) {
                return Err(OrchestratorError::DuplicateModule(spec.view.clone()));
            }
            if spec.container.is_none() {
                return Err(OrchestratorError::MissingContainer(spec.view.clone()));
            }
        }

        for spec in specs {
            let hooks = (spec.factory)(self.selection.reader());
            let module = Module::new(
                spec.module_name,
                spec.container,
                Arc::clone(&self.bus),
                Arc::clone(&self.api),
                hooks,
            );
            self.register_module(spec.view, module)?;
        }
        Ok(())
    }

    pub fn module(&self, view: &ViewName) -> Option<&Arc<Module>> {
        self.modules
            .iter()
            .find(|registered| &registered.view == view)
            .map(|registered| &registered.module)
    }

    pub fn views(&self) -> Vec<ViewName> {
        self.modules.iter().map(|m| m.view.clone()).collect()
    }

    pub fn current_view(&self) -> Option<ViewName> {
        self.selection.read().view.clone()
    }

    pub fn current_scenario(&self) -> ScenarioId {
        self.selection.read().scenario.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Wires lifecycle logging, loads the scenario list and activates `default_view`.
    /// Registration must be complete before this is called. Calling it again is a no-op.
    pub async fn initialize(&self, default_view: &ViewName) -> Result<(), OrchestratorError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(modules = self.modules.len(), "initializing dashboard");

        self.wire_listeners();
        self.load_initial_data().await;

        if let Err(error) = self.switch_view(default_view).await {
            self.bus.unsubscribe_owner(self.owner);
            self.initialized.store(false, Ordering::SeqCst);
            return Err(error);
        }
        info!(view = %default_view, "dashboard initialized");
        Ok(())
    }

    fn wire_listeners(&self) {
        for topic in [Topic::ModuleLoaded, Topic::ModuleUnloaded, Topic::DataLoaded] {
            self.bus.subscribe(
                topic,
                |event| match event {
                    DashboardEvent::ModuleLoaded(name) => info!(module = %name, "module loaded"),
                    DashboardEvent::ModuleUnloaded(name) => {
                        info!(module = %name, "module unloaded")
                    }
                    DashboardEvent::DataLoaded { module, scenario } => {
                        debug!(%module, %scenario, "module data loaded")
                    }
                    _ => {}
                },
                Some(self.owner),
            );
        }
    }

    async fn load_initial_data(&self) {
        match self.api.get_scenarios().await {
            Ok(scenarios) => {
                let count = scenarios
                    .get("scenarios")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                info!(scenarios = count, "loaded scenario list");
            }
            Err(error) => warn!(%error, "failed to load initial scenario list"),
        }
    }

    /// Activates `view`. Returns `Ok(false)` when it is already the active view.
    pub async fn switch_view(&self, view: &ViewName) -> Result<bool, OrchestratorError> {
        let _switching = self.switching.lock().await;
        let previous = self.current_view();
        if previous.as_ref() == Some(view) {
            return Ok(false);
        }

        let target = self
            .module(view)
            .ok_or_else(|| OrchestratorError::UnknownView(view.clone()))?;
        if target.lifecycle() == Lifecycle::Destroyed {
            return Err(OrchestratorError::ModuleDestroyed(view.clone()));
        }
        info!(%view, "switching view");

        let current = previous.as_ref().and_then(|name| self.module(name));
        if let Some(current) = current {
            current.hide();
        }

        if !target.is_initialized() {
            if let Err(error) = target.initialize().await {
                if let Some(current) = current {
                    current.show();
                }
                return Err(error.into());
            }
        }
        target.show();

        self.selection.write().view = Some(view.clone());
        self.bus.publish(&DashboardEvent::ViewChanged(view.clone()));
        Ok(true)
    }

    /// Makes `scenario` the active scenario. Returns `false` when it already was.
    pub fn switch_scenario(&self, scenario: &ScenarioId) -> bool {
        {
            let mut selection = self.selection.write();
            if &selection.scenario == scenario {
                return false;
            }
            selection.scenario = scenario.clone();
        }
        info!(%scenario, "switching scenario");
        self.bus
            .publish(&DashboardEvent::ScenarioChanged(scenario.clone()));
        true
    }

    pub fn refresh(&self) {
        info!("refreshing all data");
        self.bus.publish(&DashboardEvent::DataRefresh);
    }

    pub fn set_team_filter(&self, team: Option<TeamName>) -> bool {
        {
            let mut selection = self.selection.write();
            if selection.filters.team == team {
                return false;
            }
            selection.filters.team = team.clone();
        }
        self.bus.publish(&DashboardEvent::TeamFilterChanged(team));
        true
    }

    pub fn set_product_filter(&self, product: Option<String>) -> bool {
        {
            let mut selection = self.selection.write();
            if selection.filters.product == product {
                return false;
            }
            selection.filters.product = product.clone();
        }
        self.bus
            .publish(&DashboardEvent::ProductFilterChanged(product));
        true
    }

    pub fn set_date_filter(&self, date: Option<String>) -> bool {
        {
            let mut selection = self.selection.write();
            if selection.filters.date == date {
                return false;
            }
            selection.filters.date = date.clone();
        }
        self.bus.publish(&DashboardEvent::DateFilterChanged(date));
        true
    }

    /// Assigns a task in the active scenario and announces it on success.
    pub async fn assign_task(
        &self,
        task_id: &TaskId,
        mechanic_id: &MechanicId,
    ) -> Result<Document, OrchestratorError> {
        let scenario = self.current_scenario();
        let result = self.api.assign_task(task_id, mechanic_id, &scenario).await?;
        self.bus.publish(&DashboardEvent::TaskAssigned {
            task_id: task_id.clone(),
            mechanic_id: mechanic_id.clone(),
            scenario,
        });
        Ok(result)
    }

    pub async fn generate_assignments(
        &self,
        team: &TeamName,
        date: Option<String>,
        present_mechanics: Vec<MechanicId>,
    ) -> Result<Document, OrchestratorError> {
        let scenario = self.current_scenario();
        let body = GenerateAssignmentsRequest {
            scenario: scenario.clone(),
            date,
            present_mechanics,
        };
        let result = self.api.generate_assignments(team, &body).await?;
        self.bus
            .publish(&DashboardEvent::AssignmentGenerated(AssignmentGenerated {
                team: team.clone(),
                scenario,
            }));
        Ok(result)
    }

    /// Announces the export and returns the download location for the active scenario.
    pub fn export_current_scenario(&self) -> String {
        let scenario = self.current_scenario();
        self.bus
            .publish(&DashboardEvent::ExportRequested(scenario.clone()));
        self.api.export_scenario(&scenario)
    }

    pub fn status(&self) -> DashboardStatus {
        DashboardStatus {
            selection: self.selection.snapshot(),
            modules: self
                .modules
                .iter()
                .map(|registered| ModuleStatus {
                    view: registered.view.clone(),
                    module_name: registered.module.name().to_string(),
                    lifecycle: registered.module.lifecycle(),
                    visible: registered.module.is_visible(),
                    loading: registered.module.is_loading(),
                })
                .collect(),
        }
    }

    /// Destroys every initialized module in registration order and clears the active view.
    pub async fn teardown(&self) {
        let _switching = self.switching.lock().await;
        for registered in &self.modules {
            if let Err(error) = registered.module.destroy().await {
                warn!(view = %registered.view, %error, "module teardown reported an error");
            }
        }
        self.selection.write().view = None;
        self.bus.unsubscribe_owner(self.owner);
        self.initialized.store(false, Ordering::SeqCst);
        info!("dashboard torn down");
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
