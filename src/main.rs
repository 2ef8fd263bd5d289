use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info};

use novelpia_downloader::api::NovelpiaClient;
use novelpia_downloader::api::error::ApiError;
use novelpia_downloader::api::session::SessionStore;
use novelpia_downloader::base_system::config::load_or_create;
use novelpia_downloader::base_system::context::Config;
use novelpia_downloader::base_system::logging::{LogOptions, LogSystem};
use novelpia_downloader::base_system::novel_id::parse_novel_id;
use novelpia_downloader::crawl::models::CrawlReport;
use novelpia_downloader::crawl::{self, CrawlOptions, Interrupted};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const EXIT_HTTP_FAILURE: u8 = 1;
const EXIT_MISSING_CREDENTIALS: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "novelpia-downloader")]
#[command(about = "Novelpia → EPUB downloader", version)]
struct Cli {
    /// Work id or URL, e.g. 1072 or https://global.novelpia.com/novel/1072
    novel: String,

    /// Account email (only needed when no stored session exists)
    #[arg(long)]
    email: Option<String>,

    /// Account password
    #[arg(long)]
    password: Option<String>,

    /// Stored session file; written after a successful login
    #[arg(long, default_value = ".session.json")]
    session: PathBuf,

    /// Netscape cookies.txt applied to the HTTP cookie jar
    #[arg(long)]
    cookies_txt: Option<PathBuf>,

    /// Output directory (overrides the configured save_path)
    #[arg(long)]
    out: Option<String>,

    /// Fetch up to N chapters (0 = all)
    #[arg(long, short = 'm', default_value_t = 0)]
    max_chapters: usize,

    /// Seconds between episode requests
    #[arg(long)]
    throttle: Option<f64>,

    /// HTTP/HTTPS proxy, e.g. http://host:port
    #[arg(long)]
    proxy: Option<String>,

    /// Verbose diagnostics (masked request/response logging)
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log = match LogSystem::init(LogOptions {
        debug: cli.verbose,
        console: true,
    }) {
        Ok(log) => log,
        Err(err) => {
            eprintln!("logging init failed: {err}");
            return ExitCode::from(EXIT_HTTP_FAILURE);
        }
    };
    info!("novelpia-downloader v{VERSION}");

    match run(cli) {
        Ok(report) => {
            info!(
                "done: {:?} — {} chapters packaged, {} skipped{}",
                report.title,
                report.packaged,
                report.skipped,
                report
                    .output
                    .as_deref()
                    .map(|p| format!(" → {}", p.display()))
                    .unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            exit_code_for(&err)
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if err.downcast_ref::<Interrupted>().is_some() {
        return ExitCode::from(EXIT_INTERRUPTED);
    }
    if matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::CredentialsMissing)
    ) {
        return ExitCode::from(EXIT_MISSING_CREDENTIALS);
    }
    ExitCode::from(EXIT_HTTP_FAILURE)
}

fn run(cli: Cli) -> Result<CrawlReport> {
    let novel_no = parse_novel_id(&cli.novel)
        .ok_or_else(|| anyhow!("unrecognized work identifier: {}", cli.novel))?;

    let mut config: Config = load_or_create(None).map_err(|e| anyhow!(e.to_string()))?;
    if let Some(out) = cli.out {
        config.save_path = out;
    }
    if let Some(throttle) = cli.throttle {
        config.throttle_seconds = throttle.max(0.0);
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = proxy;
    }

    let store = SessionStore::load(Some(&cli.session));
    let credentials = cli.email.zip(cli.password);

    // Nothing to authenticate with: fail before any network call.
    if !store.has_session() && credentials.is_none() {
        info!("no stored session found; run once with --email and --password to log in");
        return Err(ApiError::CredentialsMissing.into());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .context("install interrupt handler")?;

    let needs_login = !store.has_session();
    let client = NovelpiaClient::new(
        &config,
        store,
        credentials,
        cli.cookies_txt.as_deref(),
        cli.verbose,
    )?;
    if needs_login {
        client.login()?;
    }

    let opts = CrawlOptions {
        max_chapters: (cli.max_chapters > 0).then_some(cli.max_chapters),
    };
    crawl::run_api_crawl(&client, novel_no, &config, &opts, &cancel)
}
