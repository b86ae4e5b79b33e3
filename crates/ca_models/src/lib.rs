pub mod backends;
pub mod retry;

pub use backends::{create_client, DummyClient, OpenRouterClient};
pub use retry::{with_backoff, RetryConfig};

pub mod prelude {
    pub use super::backends::create_client;
    pub use super::retry::{with_backoff, RetryConfig};
    pub use ca_core::{ChatMessage, CompletionRequest, ModelClient, ResearchOutput};
}
