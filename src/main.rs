use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use matchx_engine::{BatchState, EngineConfig, MatchRequest, MatchingEngine};
use matchx_storage::MemoryColumnStore;

/// Record linkage and deduplication for tabular data
#[derive(Parser, Debug)]
#[command(name = "matchx")]
#[command(about = "Find duplicate and corresponding records", long_about = None)]
struct Args {
    /// JSON config file; flags below override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the model, training set and label log
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Rows per blocking chunk
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match one table against itself or against a second table
    Match {
        /// Directory of `<table>.json` files
        #[arg(long)]
        tables: PathBuf,

        #[arg(long)]
        table_a: String,

        #[arg(long, value_delimiter = ',', required = true)]
        columns_a: Vec<String>,

        #[arg(long)]
        table_b: Option<String>,

        /// Defaults to the columns of table A
        #[arg(long, value_delimiter = ',')]
        columns_b: Option<Vec<String>>,

        /// Also print duplicate clusters
        #[arg(long)]
        clusters: bool,

        /// Progress poll interval in milliseconds
        #[arg(long, default_value_t = 250)]
        poll_ms: u64,
    },
    /// Suggest columns to match on
    Recommend {
        #[arg(long)]
        tables: PathBuf,

        #[arg(long)]
        table: String,
    },
    /// Suggest column correspondences between two tables
    Mapping {
        #[arg(long)]
        tables: PathBuf,

        #[arg(long)]
        table_a: String,

        #[arg(long)]
        table_b: String,
    },
    /// Retrain the classifier from confirmed labels
    Retrain,
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to read config {:?}", path))?,
        None => EngineConfig::default(),
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(chunk_size) = args.chunk_size {
        config.blocking.chunk_size = chunk_size;
    }
    config.validate()?;
    Ok(config)
}

async fn open_engine(config: EngineConfig, tables: Option<PathBuf>) -> anyhow::Result<Arc<MatchingEngine>> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<Arc<MatchingEngine>> {
        let store = Arc::new(MemoryColumnStore::new());
        if let Some(dir) = tables {
            let loaded = store
                .load_dir(&dir)
                .with_context(|| format!("failed to load tables from {:?}", dir))?;
            info!("Loaded {} tables from {:?}", loaded, dir);
        }
        Ok(Arc::new(MatchingEngine::open(config, store)?))
    })
    .await?
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_match(
    engine: Arc<MatchingEngine>,
    request: MatchRequest,
    clusters: bool,
    poll_every: Duration,
) -> anyhow::Result<()> {
    let batch_id = engine.submit(&request)?;
    info!("Submitted batch {}", batch_id);

    let mut ticker = tokio::time::interval(poll_every);
    let summary = loop {
        ticker.tick().await;
        match engine.poll(&batch_id) {
            Some(BatchState::Running { progress }) => {
                info!("Batch {}: {}/{} chunk pairs", batch_id, progress.current, progress.total);
            }
            Some(BatchState::Completed { summary }) => break summary,
            Some(BatchState::Failed { reason }) => bail!("batch {} failed: {}", batch_id, reason),
            None => bail!("batch {} disappeared", batch_id),
        }
    };
    print_json(&summary)?;

    if clusters {
        print_json(&engine.duplicate_clusters(&batch_id)?)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting matchx v{}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&args)?;
    info!("Data directory: {:?}", config.data_dir);

    match args.command {
        Command::Match {
            tables,
            table_a,
            columns_a,
            table_b,
            columns_b,
            clusters,
            poll_ms,
        } => {
            let engine = open_engine(config, Some(tables)).await?;
            let request = MatchRequest {
                table_a,
                columns_a,
                table_b,
                columns_b,
            };
            run_match(engine, request, clusters, Duration::from_millis(poll_ms.max(1))).await?;
        }
        Command::Recommend { tables, table } => {
            let engine = open_engine(config, Some(tables)).await?;
            print_json(&engine.recommend_columns(&table)?)?;
        }
        Command::Mapping {
            tables,
            table_a,
            table_b,
        } => {
            let engine = open_engine(config, Some(tables)).await?;
            print_json(&engine.recommend_column_mapping(&table_a, &table_b)?)?;
        }
        Command::Retrain => {
            let engine = open_engine(config, None).await?;
            let outcome = tokio::task::spawn_blocking(move || engine.retrain()).await?;
            println!("{}", outcome);
        }
    }

    Ok(())
}
