//! The dashboard's scenario views. All four share one runtime behaviour and differ only in
//! which backend documents they pull together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use shared::{
    domain::{ScenarioId, TeamName, ViewKind},
    protocol::{Document, TeamTaskFilters},
};
use tracing::{debug, warn};

use crate::{
    api_client::ApiClient,
    event_bus::{DashboardEvent, Topic},
    module::{Lifecycle, Module, ModuleHooks, StateMap},
    selection::SelectionReader,
};

#[derive(Debug)]
struct LoadTarget {
    scenario: ScenarioId,
    team: Option<TeamName>,
    generation: u64,
}

#[derive(Clone)]
pub struct ScenarioView {
    kind: ViewKind,
    dashboard: SelectionReader,
    selection: Arc<Mutex<LoadTarget>>,
}

impl ScenarioView {
    pub fn new(kind: ViewKind, dashboard: SelectionReader) -> Self {
        let current = dashboard.snapshot();
        Self {
            kind,
            dashboard,
            selection: Arc::new(Mutex::new(LoadTarget {
                scenario: current.scenario,
                team: current.filters.team,
                generation: 0,
            })),
        }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn current_scenario(&self) -> ScenarioId {
        self.selection().scenario.clone()
    }

    /// Fetches this view's documents for the current selection and hands them to the module.
    /// Results of a load overtaken by a newer one are dropped.
    pub async fn load(&self, module: &Arc<Module>) {
        let (scenario, team, generation) = {
            let mut selection = self.selection();
            selection.generation += 1;
            (
                selection.scenario.clone(),
                selection.team.clone(),
                selection.generation,
            )
        };

        let message = format!("Loading {} data...", self.kind);
        let api = Arc::clone(module.api());
        let kind = self.kind;
        let is_current = || {
            self.selection().generation == generation
                && module.lifecycle() != Lifecycle::Destroyed
        };
        let fetched = module
            .run_load_while(
                &message,
                fetch(kind, &api, &scenario, team.as_ref()),
                &is_current,
            )
            .await;
        let Some(document) = fetched else {
            return;
        };

        if !is_current() {
            debug!(view = %self.kind, %scenario, "discarding stale load");
            return;
        }

        let mut delta = StateMap::new();
        delta.insert("scenario".into(), Value::from(scenario.as_str()));
        delta.insert("document".into(), document);
        delta.insert("loaded_at".into(), Value::from(Utc::now().to_rfc3339()));
        module.set_state(delta);
        module.emit(&DashboardEvent::DataLoaded {
            module: module.name().to_string(),
            scenario,
        });
    }

    fn reload_in_background(&self, module: &Weak<Module>) {
        let Some(module) = module.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(view = %self.kind, "no async runtime available; reload skipped");
            return;
        };
        let view = self.clone();
        runtime.spawn(async move { view.load(&module).await });
    }

    fn selection(&self) -> MutexGuard<'_, LoadTarget> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ModuleHooks for ScenarioView {
    async fn on_initialize(&self, module: &Arc<Module>) -> anyhow::Result<()> {
        let weak = Arc::downgrade(module);

        let view = self.clone();
        let target = weak.clone();
        module.subscribe(Topic::ScenarioChanged, move |event| {
            if let DashboardEvent::ScenarioChanged(scenario) = event {
                view.selection().scenario = scenario.clone();
                view.reload_in_background(&target);
            }
        });

        let view = self.clone();
        let target = weak.clone();
        module.subscribe(Topic::DataRefresh, move |_| {
            view.reload_in_background(&target);
        });

        if self.kind == ViewKind::TeamLead {
            let view = self.clone();
            let target = weak;
            module.subscribe(Topic::TeamFilterChanged, move |event| {
                if let DashboardEvent::TeamFilterChanged(team) = event {
                    view.selection().team = team.clone();
                    view.reload_in_background(&target);
                }
            });
        }

        // Views are initialized lazily; catch up with the selection only after subscribing.
        {
            let current = self.dashboard.snapshot();
            let mut selection = self.selection();
            selection.scenario = current.scenario;
            selection.team = current.filters.team;
        }

        self.load(module).await;
        Ok(())
    }

    fn on_show(&self, module: &Arc<Module>) {
        debug!(module = module.name(), "module shown");
    }

    fn on_hide(&self, module: &Arc<Module>) {
        debug!(module = module.name(), "module hidden");
    }

    fn on_state_changed(&self, module: &Arc<Module>, delta: &StateMap) {
        if let (Some(document), Some(container)) = (delta.get("document"), module.container()) {
            container.render(document);
        }
    }
}

async fn fetch(
    kind: ViewKind,
    api: &ApiClient,
    scenario: &ScenarioId,
    team: Option<&TeamName>,
) -> anyhow::Result<Document> {
    match kind {
        ViewKind::TeamLead => {
            let data = api
                .get_scenario_data(scenario)
                .await
                .with_context(|| format!("scenario {scenario}"))?;
            let team_tasks = match team {
                Some(team) => api
                    .get_team_tasks(team, &TeamTaskFilters::for_scenario(scenario.clone()))
                    .await
                    .with_context(|| format!("tasks for team {team}"))?,
                None => Value::Null,
            };
            Ok(json!({ "scenario": data, "team": team, "team_tasks": team_tasks }))
        }
        ViewKind::Management => {
            let (data, late_parts) = futures::try_join!(
                async {
                    api.get_scenario_data(scenario)
                        .await
                        .with_context(|| format!("scenario {scenario}"))
                },
                async {
                    api.get_late_parts_impact(scenario)
                        .await
                        .with_context(|| format!("late parts impact for {scenario}"))
                },
            )?;
            Ok(json!({ "scenario": data, "late_parts_impact": late_parts }))
        }
        ViewKind::Mechanic | ViewKind::Project => {
            let data = api
                .get_scenario_data(scenario)
                .await
                .with_context(|| format!("scenario {scenario}"))?;
            Ok(json!({ "scenario": data }))
        }
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
