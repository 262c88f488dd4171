//! songpedia - Song article corpus pipeline
//!
//! Entry point for the crawl, resolve, album dump and compare commands.
//! Ctrl-C stops the running stage after its last durable checkpoint and
//! exits with code 130.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use songpedia_common::config::{
    ensure_data_dir, load_toml_config, resolve_catalog_credentials, resolve_config_path,
    resolve_data_dir, write_toml_config, TomlConfig,
};
use songpedia_ingest::analysis::{LexicalEngine, SimilarityAnalyzer};
use songpedia_ingest::checkpoint::{CheckpointStore, CrawlProgressStore};
use songpedia_ingest::db::{ArticleStore, DATABASE_FILE};
use songpedia_ingest::queries::load_queries;
use songpedia_ingest::services::{Encyclopedia, SpotifyCatalogClient, WikipediaClient};
use songpedia_ingest::shards::ShardStore;
use songpedia_ingest::workflow::{
    dump_album_articles, CrawlSettings, Crawler, ResolveSummary, Resolver, ALBUM_DUMP_FILE,
};
use songpedia_ingest::{IngestError, IngestResult};

/// Exit code after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// Command-line arguments for songpedia
#[derive(Parser, Debug)]
#[command(name = "songpedia")]
#[command(about = "Resumable song article corpus pipeline")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding shards, checkpoints and songs.db
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level or filter directive (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl catalog queries into shard files
    Crawl(CrawlArgs),
    /// Query 'A'..'Z' and write one title-deduplicated shard
    Sweep(SweepArgs),
    /// Resolve shard records to articles in songs.db
    Resolve(ResolveArgs),
    /// Dump album articles of every shard to songs.json
    Albums(AlbumsArgs),
    /// Compare two articles
    Compare(CompareArgs),
    /// Show pipeline progress
    Status,
    /// Write a default config file
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Query list (.json array or one query per line)
    #[arg(long)]
    queries: PathBuf,

    /// First query index (default: after saved progress)
    #[arg(long)]
    start_query: Option<usize>,

    /// First shard id (default: from saved progress)
    #[arg(long)]
    start_shard: Option<u32>,

    /// Queries per shard
    #[arg(long)]
    shard_size: Option<usize>,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Shard id receiving the consolidated list
    #[arg(long, default_value_t = 0)]
    shard: u32,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Record index within the start shard (default: checkpoint)
    #[arg(long)]
    start_index: Option<usize>,

    /// First shard id (default: checkpoint)
    #[arg(long)]
    start_shard: Option<u32>,

    /// Last shard id to resolve (default: all)
    #[arg(long)]
    max_shard: Option<u32>,
}

#[derive(Args, Debug)]
struct AlbumsArgs {
    /// Output file (default: <data-dir>/songs.json)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("left").required(true).args(["left_file", "left_id"])))]
#[command(group(ArgGroup::new("right").required(true).args(["right_file", "right_id"])))]
struct CompareArgs {
    /// Left article from a text file
    #[arg(long)]
    left_file: Option<PathBuf>,

    /// Left article from songs.db by record id
    #[arg(long)]
    left_id: Option<String>,

    /// Right article from a text file
    #[arg(long)]
    right_file: Option<PathBuf>,

    /// Right article from songs.db by record id
    #[arg(long)]
    right_id: Option<String>,
}

#[derive(Args, Debug)]
struct InitConfigArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Config is read before the real subscriber exists; surface its warnings
    let bootstrap = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .finish();
    let toml_config =
        tracing::subscriber::with_default(bootstrap, || load_toml_config(cli.config.as_deref()))
            .context("Failed to load configuration")?;

    init_tracing(cli.log_level.as_deref(), &toml_config.logging.level);

    info!(
        "Starting songpedia v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_watcher(cancel.clone());

    match run(cli, &toml_config, &cancel).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if is_interrupted(&e) => {
            warn!("Interrupted; progress is checkpointed, rerun to resume");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(e) => Err(e),
    }
}

/// `--log-level` > `RUST_LOG` > `[logging] level`
fn init_tracing(cli_level: Option<&str>, toml_level: &str) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(toml_level)),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn spawn_interrupt_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current step");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

fn is_interrupted(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<IngestError>(),
        Some(IngestError::Interrupted)
    )
}

async fn run(cli: Cli, config: &TomlConfig, cancel: &CancellationToken) -> Result<()> {
    if let Command::InitConfig(args) = &cli.command {
        return init_config(cli.config.as_deref(), args.force);
    }

    let data_dir = resolve_data_dir(cli.data_dir.as_deref(), config);
    ensure_data_dir(&data_dir).context("Failed to create data directory")?;
    info!("Data directory: {}", data_dir.display());

    match cli.command {
        Command::Crawl(args) => crawl(args, config, &data_dir, cancel).await,
        Command::Sweep(args) => sweep(args, config, &data_dir, cancel).await,
        Command::Resolve(args) => resolve(args, config, &data_dir, cancel).await,
        Command::Albums(args) => albums(args, config, &data_dir, cancel).await,
        Command::Compare(args) => compare(args, &data_dir).await,
        Command::Status => status(&data_dir).await,
        Command::InitConfig(_) => Ok(()),
    }
}

fn catalog_client(config: &TomlConfig) -> Result<SpotifyCatalogClient> {
    let credentials = resolve_catalog_credentials(config)?;
    SpotifyCatalogClient::new(&config.catalog, credentials)
        .context("Failed to create catalog client")
}

fn encyclopedia_client(config: &TomlConfig) -> Result<WikipediaClient> {
    WikipediaClient::new(&config.encyclopedia).context("Failed to create encyclopedia client")
}

async fn crawl(
    args: CrawlArgs,
    config: &TomlConfig,
    data_dir: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let queries = load_queries(&args.queries)?;
    info!("Loaded {} queries from {}", queries.len(), args.queries.display());

    let mut settings = CrawlSettings::from(&config.crawl);
    if let Some(shard_size) = args.shard_size {
        settings.shard_size = shard_size.max(1);
    }

    let crawler = Crawler::new(catalog_client(config)?, data_dir, settings);
    let (start_query, start_shard) = crawler.resume_position(args.start_query, args.start_shard)?;
    if start_query >= queries.len() {
        info!("All {} queries already crawled", queries.len());
        return Ok(());
    }

    crawler
        .crawl(&queries, start_query, start_shard, cancel)
        .await?;
    Ok(())
}

async fn sweep(
    args: SweepArgs,
    config: &TomlConfig,
    data_dir: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let crawler = Crawler::new(
        catalog_client(config)?,
        data_dir,
        CrawlSettings::from(&config.crawl),
    );
    crawler.sweep(args.shard, cancel).await?;
    Ok(())
}

async fn resolve(
    args: ResolveArgs,
    config: &TomlConfig,
    data_dir: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let encyclopedia = encyclopedia_client(config)?;
    let db_path = data_dir.join(DATABASE_FILE);
    let store = ArticleStore::open_exclusive(&db_path)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    let mut resolver = Resolver::new(encyclopedia, store, data_dir);
    let result = resolve_from_checkpoint(&mut resolver, &args, cancel).await;

    // Closed on every exit path, interrupt included
    resolver.store().close().await;
    result?;
    Ok(())
}

async fn resolve_from_checkpoint<E: Encyclopedia>(
    resolver: &mut Resolver<E>,
    args: &ResolveArgs,
    cancel: &CancellationToken,
) -> IngestResult<ResolveSummary> {
    let start = resolver.start_position(args.start_index, args.start_shard)?;
    resolver
        .resolve(start.current_index, start.file_num, args.max_shard, cancel)
        .await
}

async fn albums(
    args: AlbumsArgs,
    config: &TomlConfig,
    data_dir: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let encyclopedia = encyclopedia_client(config)?;
    let output = args
        .output
        .unwrap_or_else(|| data_dir.join(ALBUM_DUMP_FILE));
    dump_album_articles(&encyclopedia, &ShardStore::new(data_dir), &output, cancel).await?;
    Ok(())
}

async fn compare(args: CompareArgs, data_dir: &Path) -> Result<()> {
    let store = if args.left_id.is_some() || args.right_id.is_some() {
        let db_path = data_dir.join(DATABASE_FILE);
        let store = ArticleStore::open_read_only(&db_path)
            .await
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        Some(store)
    } else {
        None
    };

    let left = article_text(args.left_file.as_deref(), args.left_id.as_deref(), store.as_ref()).await;
    let right =
        article_text(args.right_file.as_deref(), args.right_id.as_deref(), store.as_ref()).await;
    if let Some(store) = &store {
        store.close().await;
    }
    let (left, right) = (left?, right?);

    let analyzer = SimilarityAnalyzer::new(LexicalEngine::new());
    let scores = analyzer.compare(&left, &right)?;

    println!("Max Similarity: {}", scores.max_sim);
    println!("Min Similarity: {}", scores.min_sim);
    println!("Avg Similarity: {}", scores.avg_sim);
    println!("Doc Similarity: {}", scores.doc_sim);
    Ok(())
}

async fn article_text(
    file: Option<&Path>,
    id: Option<&str>,
    store: Option<&ArticleStore>,
) -> Result<String> {
    match (file, id, store) {
        (Some(path), _, _) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read article file {}", path.display())),
        (None, Some(id), Some(store)) => match store.get(id).await? {
            Some(row) => Ok(row.article),
            None => bail!("No article with id {} in {}", id, DATABASE_FILE),
        },
        _ => bail!("No article source given"),
    }
}

async fn status(data_dir: &Path) -> Result<()> {
    let checkpoint = CheckpointStore::new(data_dir).load()?;
    let progress = CrawlProgressStore::new(data_dir).load()?;
    let shards = ShardStore::new(data_dir).list()?;

    println!("Data directory: {}", data_dir.display());
    match progress {
        Some(p) => println!(
            "Crawler progress: query {} written to shard {}",
            p.query_index, p.file_num
        ),
        None => println!("Crawler progress: none"),
    }
    println!("Shards: {:?}", shards);
    println!(
        "Resolver checkpoint: record {} of shard {}",
        checkpoint.current_index, checkpoint.file_num
    );

    let db_path = data_dir.join(DATABASE_FILE);
    if db_path.exists() {
        let store = ArticleStore::open_read_only(&db_path)
            .await
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        let count = store.count().await;
        store.close().await;
        println!("Articles stored: {}", count?);
    } else {
        println!("Articles stored: 0 (no {})", DATABASE_FILE);
    }
    Ok(())
}

fn init_config(cli_path: Option<&Path>, force: bool) -> Result<()> {
    let Some(path) = resolve_config_path(cli_path) else {
        bail!("Could not determine config directory; pass --config");
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    write_toml_config(&TomlConfig::default(), &path)?;
    info!("Wrote default config to {}", path.display());
    println!("{}", path.display());
    Ok(())
}
