//! `photostream`: keep a local directory in sync with a photo album.
//!
//! Every option can also be given through the environment variable shown in
//! `--help`, which is how the container image is configured.

use anyhow::{Context, Result};
use bridge_desktop::JsonLinesLogSink;
use clap::Parser;
use core_runtime::config::{BackendKind, CoreConfig, DatabaseConfig, DEFAULT_POSTGRES_PORT};
use core_runtime::logging::{init_logging, parse_log_level, LogFormat, LoggingConfig};
use core_service::PhotostreamService;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend to sync from: photoprism or immich
    #[arg(long = "type", env = "SYNC_TYPE", default_value = "photoprism")]
    backend: BackendKind,

    /// Backend root URL
    #[arg(long, env = "SYNC_BASE_URL")]
    base_url: String,

    /// Directory that receives the cached photos
    #[arg(long, env = "SYNC_CACHE_PATH")]
    cache_path: PathBuf,

    #[arg(long, env = "SYNC_USERNAME", default_value = "")]
    username: String,

    #[arg(long, env = "SYNC_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    #[arg(long, env = "SYNC_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// YAML album descriptor exported by PhotoPrism
    #[arg(long, env = "PHOTOPRISM_ALBUM_PATH")]
    album_path: Option<PathBuf>,

    #[arg(long, env = "IMMICH_ALBUM_ID", default_value = "")]
    album_id: String,

    #[arg(long, env = "IMMICH_DB_HOST", default_value = "")]
    db_host: String,

    #[arg(long, env = "IMMICH_DB_PORT", default_value_t = DEFAULT_POSTGRES_PORT)]
    db_port: u16,

    #[arg(long, env = "IMMICH_DB_NAME", default_value = "")]
    db_name: String,

    #[arg(long, env = "IMMICH_DB_USER", default_value = "")]
    db_user: String,

    #[arg(long, env = "IMMICH_DB_PASSWORD", default_value = "", hide_env_values = true)]
    db_password: String,

    #[arg(long, env = "SYNC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// pretty, json or compact
    #[arg(long, env = "SYNC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Also append logs to this file as JSON lines, credentials redacted
    #[arg(long, env = "SYNC_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Longest side of a cached image, in pixels
    #[arg(long, env = "SYNC_MAX_DIMENSION")]
    max_dimension: Option<u32>,

    /// Assets fetched and ingested in parallel
    #[arg(long, env = "SYNC_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn logging(&self) -> Result<LoggingConfig> {
        let level = parse_log_level(&self.log_level)?;
        let mut logging = LoggingConfig::default().with_level(level);
        if let Some(format) = self.log_format {
            logging = logging.with_format(format);
        }
        if let Some(path) = &self.log_file {
            logging = logging.with_logger_sink(Arc::new(JsonLinesLogSink::new(path, level)));
        }
        Ok(logging)
    }

    fn core_config(&self) -> Result<CoreConfig> {
        let mut builder = CoreConfig::builder()
            .base_url(&self.base_url)
            .cache_dir(&self.cache_path);

        builder = match self.backend {
            BackendKind::PhotoPrism => builder.photoprism(
                self.album_path.clone().unwrap_or_default(),
                &self.username,
                &self.password,
            ),
            BackendKind::Immich => builder.immich(
                &self.album_id,
                &self.api_key,
                DatabaseConfig::new(&self.db_host, &self.db_name, &self.db_user, &self.db_password)
                    .with_port(self.db_port),
            ),
        };
        if let Some(max_dimension) = self.max_dimension {
            builder = builder.max_dimension(max_dimension);
        }
        if let Some(concurrency) = self.concurrency {
            builder = builder.max_concurrent_downloads(concurrency);
        }

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.logging()?).context("failed to initialize logging")?;

    let config = args.core_config().context("invalid configuration")?;
    info!(backend = %config.backend.kind(), cache_dir = %config.cache_dir.display(), "Starting photostream");

    let service = PhotostreamService::from_config(config)
        .await
        .context("failed to start photostream")?;

    if args.once {
        let report = service.run_once().await.context("reconciliation failed")?;
        if !report.is_clean() {
            warn!(
                failed = report.failed.len(),
                removal_failed = report.removal_failed.len(),
                "Pass finished with failures"
            );
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    service.run(shutdown).await?;
    Ok(())
}
