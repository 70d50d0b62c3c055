use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use shared::domain::{ScenarioId, TeamName, ViewName};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub team: Option<TeamName>,
    pub product: Option<String>,
    pub date: Option<String>,
}

/// The dashboard-wide selection: one scenario, at most one active view, and the filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub scenario: ScenarioId,
    pub view: Option<ViewName>,
    pub filters: Filters,
}

impl Selection {
    pub fn new(scenario: ScenarioId) -> Self {
        Self {
            scenario,
            view: None,
            filters: Filters::default(),
        }
    }
}

/// Read-only access to the selection for modules. Only the orchestrator writes it.
#[derive(Debug, Clone)]
pub struct SelectionReader(Arc<RwLock<Selection>>);

impl SelectionReader {
    pub fn snapshot(&self) -> Selection {
        self.read().clone()
    }

    pub fn scenario(&self) -> ScenarioId {
        self.read().scenario.clone()
    }

    pub fn team(&self) -> Option<TeamName> {
        self.read().filters.team.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Selection> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub(crate) struct SelectionCell(Arc<RwLock<Selection>>);

impl SelectionCell {
    pub(crate) fn new(scenario: ScenarioId) -> Self {
        Self(Arc::new(RwLock::new(Selection::new(scenario))))
    }

    pub(crate) fn reader(&self) -> SelectionReader {
        SelectionReader(Arc::clone(&self.0))
    }

    pub(crate) fn snapshot(&self) -> Selection {
        self.read().clone()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Selection> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Selection> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
