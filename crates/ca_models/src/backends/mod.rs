use std::sync::Arc;

use ca_core::{Error, ModelClient, Result};

pub mod dummy;
pub mod openrouter;

pub use dummy::DummyClient;
pub use openrouter::OpenRouterClient;

/// Build a model client by backend name, as selected on the CLI.
pub fn create_client(backend: &str, api_key: Option<String>) -> Result<Arc<dyn ModelClient>> {
    match backend {
        "openrouter" => Ok(Arc::new(OpenRouterClient::new(api_key)?)),
        "dummy" => Ok(Arc::new(DummyClient::new())),
        other => Err(Error::Config(format!("Unknown model backend: {}", other))),
    }
}
