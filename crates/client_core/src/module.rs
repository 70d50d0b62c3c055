//! Module runtime: lifecycle, bus subscriptions, state and loading affordances for one view.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    api_client::ApiClient,
    container::Container,
    event_bus::{DashboardEvent, EventBus, SubscriberId, SubscriptionHandle, Topic},
};

pub type StateMap = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Destroyed,
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {module} failed to initialize: {source}")]
    Initialize {
        module: String,
        source: anyhow::Error,
    },
    #[error("module {module} teardown hook failed: {source}")]
    Teardown {
        module: String,
        source: anyhow::Error,
    },
}

/// Behaviour a concrete view plugs into the [`Module`] runtime. Every hook is optional.
#[async_trait]
pub trait ModuleHooks: Send + Sync + 'static {
    async fn on_initialize(&self, _module: &Arc<Module>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_destroy(&self, _module: &Arc<Module>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_show(&self, _module: &Arc<Module>) {}

    fn on_hide(&self, _module: &Arc<Module>) {}

    fn on_state_changed(&self, _module: &Arc<Module>, _delta: &StateMap) {}
}

pub struct Module {
    name: String,
    owner: SubscriberId,
    container: Option<Arc<dyn Container>>,
    bus: Arc<EventBus>,
    api: Arc<ApiClient>,
    hooks: Arc<dyn ModuleHooks>,
    // Serializes initialize/destroy; held across the async hooks.
    transition: tokio::sync::Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
    visible: Mutex<bool>,
    state: Mutex<StateMap>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    loading: AtomicUsize,
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        container: Option<Arc<dyn Container>>,
        bus: Arc<EventBus>,
        api: Arc<ApiClient>,
        hooks: Arc<dyn ModuleHooks>,
    ) -> Arc<Self> {
        let owner = bus.new_subscriber_id();
        Arc::new(Self {
            name: name.into(),
            owner,
            container,
            bus,
            api,
            hooks,
            transition: tokio::sync::Mutex::new(()),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            visible: Mutex::new(false),
            state: Mutex::new(StateMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            loading: AtomicUsize::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn container(&self) -> Option<&Arc<dyn Container>> {
        self.container.as_ref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *lock(&self.lifecycle)
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle() == Lifecycle::Initialized
    }

    pub fn is_visible(&self) -> bool {
        *lock(&self.visible)
    }

    /// Runs the initialize hook once. Returns `Ok(false)` when the module was already
    /// initialized or has been destroyed.
    ///
    /// A failing hook leaves the module uninitialized and revokes whatever it subscribed to.
    pub async fn initialize(self: &Arc<Self>) -> Result<bool, ModuleError> {
        let _transition = self.transition.lock().await;
        if self.lifecycle() != Lifecycle::Uninitialized {
            return Ok(false);
        }

        info!(module = %self.name, "initializing module");
        if let Err(source) = self.hooks.on_initialize(self).await {
            self.unsubscribe_all();
            return Err(ModuleError::Initialize {
                module: self.name.clone(),
                source,
            });
        }

        *lock(&self.lifecycle) = Lifecycle::Initialized;
        self.emit(&DashboardEvent::ModuleLoaded(self.name.clone()));
        Ok(true)
    }

    /// Tears the module down. Subscriptions are revoked before the teardown hook runs, and the
    /// module ends up destroyed even when the hook fails.
    pub async fn destroy(self: &Arc<Self>) -> Result<bool, ModuleError> {
        let _transition = self.transition.lock().await;
        if self.lifecycle() != Lifecycle::Initialized {
            return Ok(false);
        }

        info!(module = %self.name, "destroying module");
        self.unsubscribe_all();
        let outcome = self.hooks.on_destroy(self).await;

        *lock(&self.visible) = false;
        *lock(&self.lifecycle) = Lifecycle::Destroyed;
        self.emit(&DashboardEvent::ModuleUnloaded(self.name.clone()));

        outcome.map(|()| true).map_err(|source| ModuleError::Teardown {
            module: self.name.clone(),
            source,
        })
    }

    pub fn show(self: &Arc<Self>) -> bool {
        let Some(container) = &self.container else {
            return false;
        };
        if !self.is_initialized() {
            debug!(module = %self.name, "show ignored; module not initialized");
            return false;
        }
        {
            let mut visible = lock(&self.visible);
            if *visible {
                return false;
            }
            *visible = true;
        }
        container.set_visible(true);
        self.hooks.on_show(self);
        true
    }

    pub fn hide(self: &Arc<Self>) -> bool {
        let Some(container) = &self.container else {
            return false;
        };
        {
            let mut visible = lock(&self.visible);
            if !*visible {
                return false;
            }
            *visible = false;
        }
        container.set_visible(false);
        self.hooks.on_hide(self);
        true
    }

    /// Subscribes on behalf of this module; the listener is revoked on [`Module::destroy`].
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> SubscriptionHandle
    where
        F: Fn(&DashboardEvent) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe(topic, callback, Some(self.owner));
        lock(&self.subscriptions).push(handle);
        handle
    }

    pub fn unsubscribe_all(&self) -> usize {
        let handles = std::mem::take(&mut *lock(&self.subscriptions));
        let removed = self.bus.unsubscribe_owner(self.owner);
        debug!(
            module = %self.name,
            tracked = handles.len(),
            removed,
            "revoked module subscriptions"
        );
        removed
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    pub fn emit(&self, event: &DashboardEvent) -> usize {
        self.bus.publish(event)
    }

    /// Shallow-merges `delta` into the module state and reports it to the state hook.
    pub fn set_state(self: &Arc<Self>, delta: StateMap) {
        {
            let mut state = lock(&self.state);
            for (key, value) in &delta {
                state.insert(key.clone(), value.clone());
            }
        }
        self.hooks.on_state_changed(self, &delta);
    }

    pub fn get_state(&self) -> StateMap {
        lock(&self.state).clone()
    }

    pub fn get_state_value(&self, key: &str) -> Option<Value> {
        lock(&self.state).get(key).cloned()
    }

    pub fn show_loading(&self, message: &str) {
        self.loading.fetch_add(1, Ordering::SeqCst);
        if let Some(container) = &self.container {
            container.show_loader(message);
        }
    }

    pub fn hide_loading(&self) {
        let previous = self
            .loading
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous <= 1 {
            if let Some(container) = &self.container {
                container.hide_loader();
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    pub fn show_error(&self, message: &str) {
        if let Some(container) = &self.container {
            container.show_error(message);
        }
    }

    /// Runs a data load behind the loading indicator. Failures go to the error affordance and
    /// yield `None`; the indicator is cleared on every exit path, including cancellation.
    pub async fn run_load<T, F>(&self, message: &str, load: F) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send,
    {
        self.run_load_while(message, load, || true).await
    }

    /// Like [`Module::run_load`], but a failure is only shown when `is_current` still holds once
    /// the load settles. A superseded load fails silently.
    pub async fn run_load_while<T, F, C>(
        &self,
        message: &str,
        load: F,
        is_current: C,
    ) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send,
        C: Fn() -> bool,
    {
        self.show_loading(message);
        let _loader = LoaderGuard { module: self };
        match load.await {
            Ok(value) => Some(value),
            Err(error) if !is_current() => {
                debug!(module = %self.name, error = %format!("{error:#}"), "stale load failed");
                None
            }
            Err(error) => {
                warn!(module = %self.name, error = %format!("{error:#}"), "data load failed");
                self.show_error(&format!("Failed to load data: {error:#}"));
                None
            }
        }
    }
}

struct LoaderGuard<'a> {
    module: &'a Module,
}

impl Drop for LoaderGuard<'_> {
    fn drop(&mut self) {
        self.module.hide_loading();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/module_tests.rs"]
mod tests;
