//! Canned-response backend for tests and dry runs.

use parking_lot::Mutex;

use super::Backend;

/// Backend that answers from a table of prompt substrings.
///
/// Routes are checked in insertion order and the first substring found in
/// the prompt wins. Echo routes return the prompt itself, which lets
/// deterministic steps (like citation verification) read their own input
/// back. Unmatched prompts get the default response.
///
/// ```
/// use lexchain_core::backend::{Backend, MockBackend};
///
/// let backend = MockBackend::new("{}")
///     .respond("S1", r#"{"holding": "test holding"}"#);
/// assert_eq!(backend.complete("S1: Extract holding"), r#"{"holding": "test holding"}"#);
/// assert_eq!(backend.complete("S4: Disposition"), "{}");
/// ```
#[derive(Debug, Default)]
pub struct MockBackend {
    routes: Vec<Route>,
    default_response: String,
    history: Mutex<Vec<String>>,
}

#[derive(Debug)]
enum Route {
    Respond { needle: String, response: String },
    Echo { needle: String },
}

impl Route {
    fn needle(&self) -> &str {
        match self {
            Route::Respond { needle, .. } | Route::Echo { needle } => needle,
        }
    }
}

impl MockBackend {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            default_response: default_response.into(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Answer prompts containing `needle` with `response`.
    pub fn respond(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.routes.push(Route::Respond {
            needle: needle.into(),
            response: response.into(),
        });
        self
    }

    /// Answer prompts containing `needle` with the prompt itself.
    pub fn echo(mut self, needle: impl Into<String>) -> Self {
        self.routes.push(Route::Echo {
            needle: needle.into(),
        });
        self
    }

    /// Prompts received so far, oldest first.
    pub fn call_history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl Backend for MockBackend {
    fn complete(&self, prompt: &str) -> String {
        self.history.lock().push(prompt.to_string());

        let route = self.routes.iter().find(|r| prompt.contains(r.needle()));
        match route {
            Some(Route::Respond { response, .. }) => response.clone(),
            Some(Route::Echo { .. }) => prompt.to_string(),
            None => self.default_response.clone(),
        }
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}
