use std::sync::{Arc, Mutex};

/// Receiver of compile-time diagnostics.
///
/// Every regex, lexing and expression error is reported here exactly once,
/// in addition to being returned as an `Err`.
pub trait Notify {
    fn notify(&self, category: &str, message: &str);
}

pub type SharedNotify = Arc<dyn Notify + Send + Sync>;

/// The default sink: forwards every diagnostic to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotify;

impl Notify for LogNotify {
    fn notify(&self, category: &str, message: &str) {
        log::error!("{}: {}", category, message);
    }
}

pub(crate) fn default_sink() -> SharedNotify {
    Arc::new(LogNotify)
}

/// A sink that keeps every diagnostic it receives.
#[derive(Debug, Default)]
pub struct CollectNotify {
    messages: Mutex<Vec<(String, String)>>,
}

impl CollectNotify {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All `(category, message)` pairs received so far.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notify for CollectNotify {
    fn notify(&self, category: &str, message: &str) {
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        messages.push((category.to_string(), message.to_string()));
    }
}
