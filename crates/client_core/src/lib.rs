//! Client-side core of the scenario dashboard: the event bus, the deduplicating API client,
//! the module runtime and the orchestrator that ties views to the scenario selection.

pub mod api_client;
pub mod container;
pub mod event_bus;
pub mod module;
pub mod orchestrator;
pub mod selection;
pub mod views;

pub use api_client::{ApiClient, Method, PendingResponse, RequestError, RequestOptions};
pub use container::{Container, ContainerSnapshot, HeadlessContainer};
pub use event_bus::{DashboardEvent, EventBus, SubscriberId, SubscriptionHandle, Topic};
pub use module::{Lifecycle, Module, ModuleError, ModuleHooks, StateMap};
pub use orchestrator::{
    default_module_specs, DashboardStatus, ModuleSpec, ModuleStatus, Orchestrator,
    OrchestratorError,
};
pub use selection::{Filters, Selection, SelectionReader};
pub use views::ScenarioView;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
