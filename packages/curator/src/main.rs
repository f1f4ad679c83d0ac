//! Pipeline entry point.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator::gateway::ModelGateway;
use curator::pipeline;
use curator::publish::Publisher;
use curator::sources::SourceReader;
use curator::store::PgProcessedStore;
use curator::Config;
use notion_client::NotionClient;
use openai_client::OpenAIClient;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Task {
    /// Full pipeline: score, analyze, publish.
    DailyLearning,
    /// Priority screening only; run frequently.
    FastLlm,
    /// Depth analysis and publishing over posts the fast task scored.
    SmartModel,
}

#[derive(Debug, Parser)]
#[command(name = "curator", about = "Scheduled social-media content curation")]
struct Args {
    /// Which task to run.
    #[arg(long, value_enum)]
    task: Task,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,curator=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!(task = ?args.task, "starting curation pipeline");

    let config = Config::from_env().context("Failed to load configuration")?;

    let store = PgProcessedStore::new(&config.learning_db_url)
        .await
        .context("Failed to open the fingerprint store")?;

    let sources = SourceReader::connect(
        config.source_x_db_url.as_deref(),
        config.source_jike_db_url.as_deref(),
    )
    .await
    .context("Failed to connect to source databases")?;

    let mut client = OpenAIClient::new(config.openai_api_key.clone());
    if let Some(base_url) = &config.openai_base_url {
        client = client.with_base_url(base_url.clone());
    }
    let gateway = ModelGateway::new(client, config.max_tokens);

    let publisher = match (&config.notion_token, &config.notion_parent_page_id) {
        (Some(token), Some(parent)) => Some(Publisher::new(
            NotionClient::new(token.clone()),
            parent.clone(),
        )),
        _ => {
            tracing::warn!("Notion not configured, publishing disabled");
            None
        }
    };

    match args.task {
        Task::DailyLearning => {
            pipeline::run_daily(&sources, &gateway, &store, publisher.as_ref(), &config).await?
        }
        Task::FastLlm => pipeline::run_fast(&sources, &gateway, &store, &config).await?,
        Task::SmartModel => {
            pipeline::run_smart(&sources, &gateway, &store, publisher.as_ref(), &config).await?
        }
    }

    tracing::info!("task complete");
    Ok(())
}
