//! Render targets owned by view modules.
//!
//! What a container draws is up to its implementation; the module runtime only toggles its
//! visibility, shows and clears a loading indicator, surfaces errors and hands over documents.

use std::sync::{Mutex, MutexGuard, PoisonError};

use shared::protocol::Document;
use tracing::{debug, info, warn};

pub trait Container: Send + Sync {
    fn id(&self) -> &str;
    fn set_visible(&self, visible: bool);
    fn show_loader(&self, message: &str);
    fn hide_loader(&self);
    fn show_error(&self, message: &str);
    fn render(&self, document: &Document);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSnapshot {
    pub visible: bool,
    pub loader: Option<String>,
    pub errors: Vec<String>,
    pub rendered: Option<Document>,
    pub render_count: usize,
}

/// Container without a display surface. It records what it was asked to show and logs it.
#[derive(Debug)]
pub struct HeadlessContainer {
    id: String,
    state: Mutex<ContainerSnapshot>,
}

impl HeadlessContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(ContainerSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> ContainerSnapshot {
        self.state().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loader.is_some()
    }

    pub fn dismiss_errors(&self) {
        self.state().errors.clear();
    }

    fn state(&self) -> MutexGuard<'_, ContainerSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Container for HeadlessContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_visible(&self, visible: bool) {
        debug!(container = %self.id, visible, "container visibility");
        self.state().visible = visible;
    }

    fn show_loader(&self, message: &str) {
        debug!(container = %self.id, message, "loader shown");
        self.state().loader = Some(message.to_string());
    }

    fn hide_loader(&self) {
        self.state().loader = None;
    }

    fn show_error(&self, message: &str) {
        warn!(container = %self.id, message, "container error");
        self.state().errors.push(message.to_string());
    }

    fn render(&self, document: &Document) {
        let mut state = self.state();
        state.render_count += 1;
        state.rendered = Some(document.clone());
        info!(
            container = %self.id,
            renders = state.render_count,
            "container rendered document"
        );
    }
}
