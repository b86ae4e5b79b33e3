use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use ca_cache::{create_store, forget_platform};
use ca_core::{ArticleConfig, Error, GeneratedArticle, Result, Vertical};
use ca_models::create_client;
use ca_pipeline::ArticlePipeline;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Cache backend: memory (ephemeral) or file
    #[arg(long, default_value = "file")]
    store: String,
    /// Path for the file cache backend
    #[arg(long, default_value = "article-cache.json")]
    store_path: PathBuf,
    /// Model backend: openrouter or dummy (offline, deterministic)
    #[arg(long, default_value = "openrouter")]
    backend: String,
    /// Override the writing model from the config file
    #[arg(long)]
    model: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Research every platform in the config and cache the results
    Research {
        /// Article config file (JSON)
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the full pipeline: research, reviews, and every enabled section
    Generate {
        #[arg(long)]
        config: PathBuf,
        /// Write the article JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build an article purely from cached reviews, no research pass
    Assemble {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Inspect or edit the cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// List platforms with live research and review entries
    List {
        #[arg(long)]
        vertical: Vertical,
    },
    /// Drop one platform from both caches so it gets re-researched
    Forget { platform: String },
}

fn load_config(path: &PathBuf, model_override: Option<&str>) -> Result<ArticleConfig> {
    let raw = std::fs::read_to_string(path)?;
    let mut config: ArticleConfig = serde_json::from_str(&raw)?;
    if config.platforms.is_empty() {
        return Err(Error::Config("config lists no platforms".to_string()));
    }
    if let Some(model) = model_override {
        config.writing_model = Some(model.to_string());
    }
    Ok(config)
}

fn write_article(article: &GeneratedArticle, out: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(article)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("📄 Article written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn build_pipeline(cli: &Cli) -> Result<ArticlePipeline> {
    let store = create_store(&cli.store, Some(&cli.store_path))?;
    let api_key = std::env::var("OPENROUTER_API_KEY").ok();
    let client = create_client(&cli.backend, api_key)?;
    info!("🧠 Model backend: {}", client.name());
    Ok(ArticlePipeline::new(client, store))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli)?;

    match &cli.command {
        Commands::Research { config } => {
            let config = load_config(config, cli.model.as_deref())?;
            let results = pipeline
                .research_platforms(&config, &|done, total, name, from_cache| {
                    info!(
                        "🔎 [{}/{}] {}{}",
                        done,
                        total,
                        name,
                        if from_cache { " (cached)" } else { "" }
                    );
                })
                .await?;
            for research in &results {
                info!(
                    "   {} — {:?}, {} fields filled, {} citations",
                    research.name,
                    research.status,
                    research.infosheet.filled_count(config.vertical),
                    research.citations.len()
                );
            }
        }
        Commands::Generate { config, out } => {
            let config = load_config(config, cli.model.as_deref())?;
            let article = pipeline
                .generate_full_article(&config, &|phase, detail| match detail {
                    Some(detail) => info!("⏳ {}: {}", phase, detail),
                    None => info!("⏳ {}", phase),
                })
                .await?;
            write_article(&article, out.as_ref())?;
        }
        Commands::Assemble { config, out } => {
            let config = load_config(config, cli.model.as_deref())?;
            match pipeline
                .assemble_article_from_cache(&config, &|phase, detail| match detail {
                    Some(detail) => info!("⏳ {}: {}", phase, detail),
                    None => info!("⏳ {}", phase),
                })
                .await?
            {
                Some(article) => write_article(&article, out.as_ref())?,
                None => {
                    return Err(Error::Cache(format!(
                        "Not enough cached reviews for {} (need {})",
                        config.vertical,
                        ca_cache::MIN_READY_REVIEWS
                    )));
                }
            }
        }
        Commands::Cache { command } => match command {
            CacheCommands::List { vertical } => {
                let researched = pipeline.research_cache().ready_platforms(*vertical).await?;
                let reviewed = pipeline.review_cache().ready_reviews(*vertical).await?;
                println!("Researched ({}):", researched.len());
                for name in &researched {
                    println!("  {}", name);
                }
                println!("Reviewed ({}):", reviewed.len());
                for review in &reviewed {
                    println!("  {}", review.platform_name);
                }
            }
            CacheCommands::Forget { platform } => {
                forget_platform(
                    pipeline.research_cache(),
                    pipeline.review_cache(),
                    platform,
                )
                .await?;
                info!("🗑️ Dropped {} from both caches", platform);
            }
        },
    }

    Ok(())
}
