pub mod citations;
pub mod client;
pub mod error;
pub mod parse;
pub mod store;
pub mod types;

pub use client::{ChatMessage, CompletionRequest, ModelClient, ResearchOutput};
pub use error::Error;
pub use store::{CacheEntry, CacheStore};
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;
