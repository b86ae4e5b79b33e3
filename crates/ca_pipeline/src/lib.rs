pub mod assemble;
pub mod delay;
pub mod generators;
pub mod orchestrator;
pub mod phrases;
pub mod prompts;
pub mod research;

pub use assemble::{ArticlePipeline, PhaseProgressFn};
pub use delay::{DelayPolicy, FixedDelay, NoDelay};
pub use orchestrator::{research_all_platforms, ResearchProgressFn};
pub use research::{research_platform, ResearchOptions};

pub mod prelude {
    pub use super::assemble::ArticlePipeline;
    pub use super::delay::{DelayPolicy, FixedDelay, NoDelay};
    pub use super::research::ResearchOptions;
    pub use ca_cache::{create_store, ResearchCache, ReviewCache};
    pub use ca_core::{ArticleConfig, GeneratedArticle, Result, Vertical};
    pub use ca_models::create_client;
}
