//! Synchronous publish/subscribe registry shared by the orchestrator and the view modules.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use shared::{
    domain::{MechanicId, ScenarioId, TaskId, TeamName, ViewName},
    protocol::AssignmentGenerated,
};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ScenarioChanged,
    DataLoaded,
    DataRefresh,
    ViewChanged,
    ModuleLoaded,
    ModuleUnloaded,
    TeamFilterChanged,
    ProductFilterChanged,
    DateFilterChanged,
    TaskAssigned,
    ExportRequested,
    AssignmentGenerated,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::ScenarioChanged => "scenario-changed",
            Topic::DataLoaded => "data-loaded",
            Topic::DataRefresh => "data-refresh",
            Topic::ViewChanged => "view-changed",
            Topic::ModuleLoaded => "module-loaded",
            Topic::ModuleUnloaded => "module-unloaded",
            Topic::TeamFilterChanged => "team-filter-changed",
            Topic::ProductFilterChanged => "product-filter-changed",
            Topic::DateFilterChanged => "date-filter-changed",
            Topic::TaskAssigned => "task-assigned",
            Topic::ExportRequested => "export-requested",
            Topic::AssignmentGenerated => "assignment-generated",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published event. The variant determines the topic it is delivered on.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    ScenarioChanged(ScenarioId),
    DataLoaded {
        module: String,
        scenario: ScenarioId,
    },
    DataRefresh,
    ViewChanged(ViewName),
    ModuleLoaded(String),
    ModuleUnloaded(String),
    TeamFilterChanged(Option<TeamName>),
    ProductFilterChanged(Option<String>),
    DateFilterChanged(Option<String>),
    TaskAssigned {
        task_id: TaskId,
        mechanic_id: MechanicId,
        scenario: ScenarioId,
    },
    ExportRequested(ScenarioId),
    AssignmentGenerated(AssignmentGenerated),
}

impl DashboardEvent {
    pub fn topic(&self) -> Topic {
        match self {
            DashboardEvent::ScenarioChanged(_) => Topic::ScenarioChanged,
            DashboardEvent::DataLoaded { .. } => Topic::DataLoaded,
            DashboardEvent::DataRefresh => Topic::DataRefresh,
            DashboardEvent::ViewChanged(_) => Topic::ViewChanged,
            DashboardEvent::ModuleLoaded(_) => Topic::ModuleLoaded,
            DashboardEvent::ModuleUnloaded(_) => Topic::ModuleUnloaded,
            DashboardEvent::TeamFilterChanged(_) => Topic::TeamFilterChanged,
            DashboardEvent::ProductFilterChanged(_) => Topic::ProductFilterChanged,
            DashboardEvent::DateFilterChanged(_) => Topic::DateFilterChanged,
            DashboardEvent::TaskAssigned { .. } => Topic::TaskAssigned,
            DashboardEvent::ExportRequested(_) => Topic::ExportRequested,
            DashboardEvent::AssignmentGenerated(_) => Topic::AssignmentGenerated,
        }
    }
}

/// Identifies the owner of a group of subscriptions so they can be revoked together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: Topic,
    id: u64,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

pub type Listener = Arc<dyn Fn(&DashboardEvent) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    owner: Option<SubscriberId>,
    once: bool,
    callback: Listener,
}

pub struct EventBus {
    listeners: Mutex<HashMap<Topic, Vec<ListenerEntry>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn new_subscriber_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe<F>(
        &self,
        topic: Topic,
        callback: F,
        owner: Option<SubscriberId>,
    ) -> SubscriptionHandle
    where
        F: Fn(&DashboardEvent) + Send + Sync + 'static,
    {
        self.insert(topic, Arc::new(callback), owner, false)
    }

    /// Like [`EventBus::subscribe`], but the listener is removed as soon as it is picked for
    /// delivery, so it observes exactly one event even under re-entrant publishes.
    pub fn subscribe_once<F>(
        &self,
        topic: Topic,
        callback: F,
        owner: Option<SubscriberId>,
    ) -> SubscriptionHandle
    where
        F: Fn(&DashboardEvent) + Send + Sync + 'static,
    {
        self.insert(topic, Arc::new(callback), owner, true)
    }

    /// Removes one listener. Returns `false` when it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut listeners = self.listeners();
        let Some(entries) = listeners.get_mut(&handle.topic) else {
            return false;
        };
        let Some(index) = entries.iter().position(|entry| entry.id == handle.id) else {
            return false;
        };
        entries.remove(index);
        if entries.is_empty() {
            listeners.remove(&handle.topic);
        }
        true
    }

    /// Removes every listener registered by `owner` across all topics.
    pub fn unsubscribe_owner(&self, owner: SubscriberId) -> usize {
        let mut listeners = self.listeners();
        let mut removed = 0;
        listeners.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.owner != Some(owner));
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }

    /// Delivers `event` to the listeners registered for its topic at the moment of the call,
    /// in registration order. A panicking listener is logged and skipped. Returns how many
    /// listeners completed normally.
    pub fn publish(&self, event: &DashboardEvent) -> usize {
        let topic = event.topic();
        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners();
            let Some(entries) = listeners.get_mut(&topic) else {
                return 0;
            };
            let snapshot = entries
                .iter()
                .map(|entry| Arc::clone(&entry.callback))
                .collect();
            entries.retain(|entry| !entry.once);
            if entries.is_empty() {
                listeners.remove(&topic);
            }
            snapshot
        };

        debug!(%topic, listeners = snapshot.len(), "publishing event");
        let mut delivered = 0;
        for (index, callback) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => error!(
                    %topic,
                    listener = index,
                    reason = panic_message(panic.as_ref()),
                    "event listener panicked; continuing dispatch"
                ),
            }
        }
        delivered
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.listeners().get(&topic).map_or(0, Vec::len)
    }

    fn insert(
        &self,
        topic: Topic,
        callback: Listener,
        owner: Option<SubscriberId>,
        once: bool,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners()
            .entry(topic)
            .or_default()
            .push(ListenerEntry {
                id,
                owner,
                once,
                callback,
            });
        SubscriptionHandle { topic, id }
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<Topic, Vec<ListenerEntry>>> {
        // Callbacks never run under this lock, so a poisoned guard still holds a consistent map.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
#[path = "tests/event_bus_tests.rs"]
mod tests;
