//! Text-completion backends.
//!
//! The executor only needs `complete(prompt) -> text` and a model id.
//! Network clients, timeouts and retries belong to the backend
//! implementation, not to the engine.

mod mock;

pub use mock::MockBackend;

/// A blocking text-completion backend.
///
/// Implementations must tolerate being called once per executed step, in
/// order, from a single thread per executor.
pub trait Backend: Send + Sync {
    /// Send a prompt and return the raw response text.
    fn complete(&self, prompt: &str) -> String;

    /// Model identifier recorded in result provenance.
    fn model_id(&self) -> &str;

    /// Estimate tokens for a prompt or response.
    fn estimate_tokens(&self, text: &str) -> u32 {
        // Simple estimate: ~4 chars per token
        (text.chars().count() / 4) as u32
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn complete(&self, prompt: &str) -> String {
        (**self).complete(prompt)
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        (**self).estimate_tokens(text)
    }
}
