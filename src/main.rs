//! teleput - put.io in the terminal

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use tokio::runtime::Runtime;

use teleput::auth::{self, AuthPolicy, InterruptGate, OobClient};
use teleput::cli::Cli;
use teleput::config::{self, Config, TOKEN_ENV};
use teleput::download::DownloadPolicy;
use teleput::logger;
use teleput::progress::SimpleSpinner;
use teleput::putio::{FileService, PutioClient};
use teleput::tasks;
use teleput::tui::{self, KeyMap};

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(ref p) = cli.log_file {
        logger::init(p, cli.verbose)?;
    }
    info!("teleput {} starting", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let token = obtain_token(&rt, &cli)?;
    let service: Arc<dyn FileService> = Arc::new(PutioClient::new(&token)?);
    let (scheduler, inbox) =
        tasks::channel_pair(rt.handle().clone(), service, DownloadPolicy::default());

    let keys = KeyMap::default();
    let result = tui::run(&keys, cli.dir.clone(), scheduler, inbox);

    // Whatever is still in flight is abandoned
    rt.shutdown_timeout(Duration::from_millis(500));
    result
}

fn obtain_token(rt: &Runtime, cli: &Cli) -> Result<String> {
    let env = std::env::var(TOKEN_ENV).ok();
    let path = config::config_path();
    let found = config::resolve_token_at(&path, cli.token.as_deref(), env.as_deref())
        .with_context(|| format!("Error loading config {}", path.display()))?;
    if let Some((token, source)) = found {
        info!("using token from {:?}", source);
        return Ok(token);
    }

    let gate = InterruptGate::default();
    let handler = gate.clone();
    ctrlc::set_handler(move || {
        if !handler.fire() {
            std::process::exit(130);
        }
    })
    .context("Error setting Ctrl-C handler")?;
    let cancel = gate.arm();

    let api = OobClient::new()?;
    let spinner = SimpleSpinner::new();
    spinner.set_message("Requesting authorization code...");
    let outcome = rt.block_on(auth::authenticate(&api, &AuthPolicy::default(), &cancel, |url| {
        spinner.suspend(|| {
            println!("Open this URL in your browser to authorize teleput:\n\n  {}\n", url);
        });
        if let Err(e) = open::that(url) {
            debug!("could not launch browser: {}", e);
        }
        spinner.set_message("Waiting for approval (Ctrl+C to cancel)...");
    }));
    gate.disarm();

    let token = match outcome {
        Ok(token) => {
            spinner.finish_with_message("Authorized");
            token
        }
        Err(e) => {
            spinner.abandon_with_message("Authorization failed");
            return Err(e).context("authenticating with put.io");
        }
    };

    let cfg = Config { oauth_token: token.clone() };
    match config::save(&cfg) {
        Ok(()) => info!("token saved to {}", config::config_path().display()),
        Err(e) => {
            warn!("could not save token: {:#}", e);
            eprintln!("warning: could not save token: {:#}", e);
        }
    }
    Ok(token)
}
