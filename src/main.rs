//! natter — create-space form client for the Natter API.
//!
//! Plays the browser for the create-space page: builds the form submission from the
//! command line, posts it to `<base_url>/spaces`, and reports the outcome on the console.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod config;
mod effects;
mod form;
mod mock_server;
mod sender;

use config::Config;
use effects::{PrintNavigator, StdConsole};
use form::{FormHandler, Page, SubmitEvent};
use sender::RequestSender;

const DEFAULT_CONFIG: &str = "natter.yaml";

#[derive(Parser)]
#[command(name = "natter")]
#[command(author, version, about = "Create-space form client for the Natter API")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit the create-space form
    Submit {
        /// Config file path (api, credentials, form ids)
        #[arg(short, long, default_value = DEFAULT_CONFIG, value_name = "PATH")]
        config: PathBuf,

        /// Override api.base_url
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Space name field value
        #[arg(long)]
        name: String,

        /// Owner field value
        #[arg(long)]
        owner: String,

        /// Print the request instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration file
    Validate {
        #[arg(short, long, default_value = DEFAULT_CONFIG, value_name = "PATH")]
        config: PathBuf,
    },

    /// Serve mock /spaces responses from a YAML file
    MockServer {
        #[arg(value_name = "PATH")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Validate { config } => {
            init_logging(None, &cli);
            run_validate(config)
        }
        Commands::MockServer { config } => {
            init_logging(None, &cli);
            mock_server::run_mock_server(config).await
        }
        Commands::Submit {
            config,
            base_url,
            name,
            owner,
            dry_run,
        } => {
            let mut config = load_config(config)?;
            if let Some(url) = base_url {
                config.api.base_url = url.clone();
                config.validate()?;
            }
            init_logging(Some(&config), &cli);
            run_submit(&config, name, owner, *dry_run).await
        }
    }
}

/// Load config; a missing file at the default path means built-in defaults.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        return Config::from_yaml("");
    }
    Config::load(path)
}

/// Init tracing from config (log_format, log_level) or env. Env NATTER_LOG_FORMAT, NATTER_LOG_LEVEL
/// (or RUST_LOG when no config) override.
fn init_logging(config: Option<&Config>, cli: &Cli) {
    let use_json = match config.and_then(|c| c.global.log_format.as_deref()) {
        Some("json") => true,
        _ => std::env::var("NATTER_LOG_FORMAT").as_deref() == Ok("json"),
    };
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("natter=debug")
    } else {
        let from_env = std::env::var("NATTER_LOG_LEVEL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        match (from_env, config) {
            (Some(level), _) => EnvFilter::new(format!("natter={}", level)),
            (None, Some(c)) => EnvFilter::new(format!("natter={}", c.global.log_level)),
            (None, None) => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("natter=info")),
        }
    };
    if use_json {
        let json_fmt = tracing_subscriber::fmt::format()
            .json()
            .with_current_span(false)
            .with_span_list(false);
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .event_format(json_fmt),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    }
}

fn run_validate(config_path: &Path) -> anyhow::Result<()> {
    match load_config(config_path) {
        Ok(_) => {
            tracing::info!("config valid");
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!("config invalid: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Load the page, submit the create-space form once, and wait for the request to finish.
async fn run_submit(config: &Config, name: &str, owner: &str, dry_run: bool) -> anyhow::Result<()> {
    let http = client::build_client(&config.api)?;
    let navigator = PrintNavigator::new(&config.api.base_url)?;
    let sender = Arc::new(RequestSender::new(
        http,
        config.api.clone(),
        Arc::new(StdConsole),
        Arc::new(navigator),
    ));

    if dry_run {
        let req = sender.prepare(name, owner)?;
        println!("{}", client::describe_request(&req));
        return Ok(());
    }

    let mut page = Page::new();
    page.on_load(FormHandler::new(config.form.clone(), sender));

    let mut event = SubmitEvent::new(config.form.form_id.as_str())
        .with_field(config.form.name_field.as_str(), name)
        .with_field(config.form.owner_field.as_str(), owner);
    for task in page.submit(&mut event) {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "submit task failed");
        }
    }
    Ok(())
}
