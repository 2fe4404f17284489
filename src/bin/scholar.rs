//! CLI binary for Daily Scholar.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use daily_scholar::config::ScholarConfig;
use daily_scholar::pipelines::{Pipelines, read_library_document};
use daily_scholar::render::Renderer;
use daily_scholar::scholar_dirs::StoragePaths;
use daily_scholar::{
    ArtifactCache, ArxivSearch, CacheNamespace, CycleOutcome, DigestEngine, DigestScheduler,
    GeminiClient, ModelClient, PaperSearch, Pipeline, ProgressEvent, ProgressTaskRunner,
    ResearchProfileStore,
};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Daily Scholar: research digests and paper posters.
#[derive(Parser)]
#[command(name = "scholar", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the daily digest scheduler until Ctrl-C; SIGUSR1 runs a cycle now.
    Serve,

    /// Run one digest cycle now.
    Digest,

    /// Summarize a paper PDF into an HTML poster.
    Poster {
        /// PDF URL (e.g. https://arxiv.org/pdf/2401.00001).
        pdf_url: String,
    },

    /// Generate a cover illustration from a description.
    Cover {
        /// Free-text description of the image.
        description: String,
    },

    /// Analyze local documents and replace the research profile.
    Library {
        /// Text files describing the library.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search arXiv.
    Search {
        /// Search query.
        query: String,

        /// Maximum number of results.
        #[arg(short = 'n', long, default_value_t = 5)]
        max_results: usize,

        /// Only papers published in the last N days (0 = any date).
        #[arg(short, long, default_value_t = 30)]
        days_back: u32,
    },

    /// Print the research profile.
    Profile,

    /// Manage the artifact cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every entry in a namespace (`posters` or `library`).
    Clear { namespace: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Everything a command needs, built from the config.
struct App {
    config: ScholarConfig,
    paths: StoragePaths,
}

impl App {
    fn model(&self) -> anyhow::Result<Arc<dyn ModelClient>> {
        let client = GeminiClient::new(&self.config.model).context("model client")?;
        Ok(Arc::new(client))
    }

    fn search(&self) -> anyhow::Result<Arc<ArxivSearch>> {
        let search = ArxivSearch::new(&self.config.search).context("arXiv client")?;
        Ok(Arc::new(search))
    }

    fn profiles(&self) -> ResearchProfileStore {
        ResearchProfileStore::new(self.paths.profile_file())
    }

    fn engine(&self) -> anyhow::Result<Arc<DigestEngine>> {
        let search: Arc<dyn PaperSearch> = self.search()?;
        let engine = DigestEngine::new(self.config.digest.clone(), &self.paths, search, self.model()?)?;
        Ok(Arc::new(engine))
    }

    fn runner(&self) -> ProgressTaskRunner {
        let cache = ArtifactCache::new(self.paths.artifact_cache_dir());
        ProgressTaskRunner::new(&self.config.runner, Some(cache))
    }

    fn pipelines(&self) -> anyhow::Result<Pipelines> {
        Ok(Pipelines::new(
            self.model()?,
            Arc::new(Renderer::new()?),
            self.profiles(),
            &self.paths,
        ))
    }
}

fn init_tracing(paths: &StoragePaths) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("daily_scholar=info,scholar_search=info"))
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let log_dir = paths.logs_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "scholar.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ScholarConfig> {
    let config = match path {
        Some(path) => ScholarConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ScholarConfig::load_or_default()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Must work before a valid config exists.
    if let Command::Config {
        action: ConfigAction::Init { force },
    } = cli.command
    {
        return init_config(cli.config, force);
    }

    let config = load_config(cli.config.as_ref())?;
    let paths = config.storage.resolve();
    let _log_guard = init_tracing(&paths);

    let app = App { config, paths };
    match cli.command {
        Command::Serve => serve(&app).await,
        Command::Digest => digest_now(&app).await,
        Command::Poster { pdf_url } => stream_pipeline(&app, app.pipelines()?.poster(&pdf_url)).await,
        Command::Cover { description } => {
            stream_pipeline(&app, app.pipelines()?.cover(&description)).await
        }
        Command::Library { files } => {
            let documents = files
                .iter()
                .map(|path| {
                    read_library_document(path)
                        .with_context(|| format!("reading {}", path.display()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            stream_pipeline(&app, app.pipelines()?.library(documents)).await
        }
        Command::Search {
            query,
            max_results,
            days_back,
        } => search(&app, &query, max_results, days_back).await,
        Command::Profile => print_json(&app.profiles().load()),
        Command::Cache {
            action: CacheAction::Clear { namespace },
        } => clear_cache(&app, &namespace),
        Command::Config { .. } => Ok(()),
    }
}

async fn serve(app: &App) -> anyhow::Result<()> {
    app.profiles().ensure_initialized()?;
    let scheduler = DigestScheduler::new(app.engine()?, &app.config.digest)?;
    let handle = scheduler.start();
    let triggers = trigger_signals()?;

    tokio::select! {
        stopped = tokio::signal::ctrl_c() => {
            stopped.context("waiting for Ctrl-C")?;
            info!("shutdown requested");
        }
        () = handle.drive_triggers(triggers) => {}
    }
    handle.shutdown().await;
    Ok(())
}

/// Manual digest triggers delivered as SIGUSR1.
#[cfg(unix)]
fn trigger_signals() -> anyhow::Result<BoxStream<'static, ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let usr1 = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;
    Ok(futures_util::stream::unfold(usr1, |mut usr1| async move {
        usr1.recv().await.map(|()| ((), usr1))
    })
    .boxed())
}

#[cfg(not(unix))]
fn trigger_signals() -> anyhow::Result<BoxStream<'static, ()>> {
    Ok(futures_util::stream::pending().boxed())
}

async fn digest_now(app: &App) -> anyhow::Result<()> {
    app.profiles().ensure_initialized()?;
    let today = chrono::Local::now().date_naive();
    match app.engine()?.run_cycle(today).await? {
        CycleOutcome::Completed(record) => print_json(&record),
        outcome => {
            println!("{}", outcome.label());
            Ok(())
        }
    }
}

/// Print every event as one JSON line; fail when the run ends in error.
async fn stream_pipeline(app: &App, pipeline: Pipeline) -> anyhow::Result<()> {
    let mut stream = app.runner().run(pipeline);
    while let Some(event) = stream.next().await {
        println!("{}", serde_json::to_string(&event)?);
        if let ProgressEvent::Error { message } = event {
            bail!(message);
        }
    }
    Ok(())
}

async fn search(app: &App, query: &str, max_results: usize, days_back: u32) -> anyhow::Result<()> {
    let papers = app.search()?.try_search(query, max_results, days_back).await?;
    for paper in &papers {
        println!("{}", serde_json::to_string(paper)?);
    }
    Ok(())
}

fn clear_cache(app: &App, namespace: &str) -> anyhow::Result<()> {
    let Some(namespace) = CacheNamespace::from_name(namespace) else {
        bail!("unknown cache namespace `{namespace}` (expected `posters` or `library`)");
    };
    let removed = ArtifactCache::new(app.paths.artifact_cache_dir()).clear(namespace)?;
    println!("removed {removed} {namespace} entries");
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(ScholarConfig::default_config_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ScholarConfig::default().save_to_file(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
