// This is the entry point of card-gate.
//
// **Architecture Overview:**
// - `core/` = Membership workflows and the ports they need (platform-agnostic)
// - `infra/` = Implementations of core traits (Google Sheets, MongoDB, Slack)
// - `entry/` = Adapters from external triggers to workflows
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize gateways (dependency injection)
// 3. Run exactly one workflow and exit with its status
//
// Every outcome, startup failures included, ends as one JSON line on stdout.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "entry/entry_layer.rs"]
mod entry;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use std::io::Read;

use crate::config::{AppConfig, GoogleCredentials};
use crate::core::membership::{MembershipError, MembershipService};
use crate::entry::invocation::{parse_command, report_failure, run_once};
use crate::infra::cards::MongoCardStore;
use crate::infra::google::{
    GoogleSheetsClient, RefreshTokenAuth, ServiceAccountAuth, TokenSource,
};
use crate::infra::slack::SlackNotifier;
use tracing_subscriber::EnvFilter;

fn read_event_from_stdin() -> Result<String, MembershipError> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .map_err(|e| MembershipError::InvalidRequest(format!("cannot read event: {}", e)))?;
    Ok(raw)
}

async fn google_auth(
    http: reqwest::Client,
    credentials: &GoogleCredentials,
) -> Result<Box<dyn TokenSource>, MembershipError> {
    let auth: Box<dyn TokenSource> = match credentials {
        GoogleCredentials::RefreshToken {
            client_id,
            client_secret,
            refresh_token,
        } => Box::new(RefreshTokenAuth::new(
            http,
            client_id.clone(),
            client_secret.clone(),
            refresh_token.clone(),
        )),
        GoogleCredentials::ServiceAccountFile(path) => {
            Box::new(ServiceAccountAuth::from_file(http, &path.to_string_lossy()).await?)
        }
        GoogleCredentials::ServiceAccountJson(json) => {
            Box::new(ServiceAccountAuth::from_json(http, json)?)
        }
    };
    Ok(auth)
}

/// Loads config, reads the command, wires the gateways and runs the workflow.
/// Returns the exit code of the workflow; `Err` only for startup failures.
async fn start<W: std::io::Write>(out: &mut W) -> anyhow::Result<i32> {
    // Config is validated before stdin is touched.
    let config = AppConfig::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args, read_event_from_stdin)?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let auth = google_auth(http.clone(), &config.google).await?;
    let sheets = GoogleSheetsClient::new(http.clone(), auth)
        .with_base_urls(config.drive_api_url.clone(), config.sheets_api_url.clone());

    let cards = MongoCardStore::connect(
        &config.db_uri,
        &config.db_name,
        &config.cards_collection,
        config.request_timeout,
    )
    .await?;

    let notifier = SlackNotifier::new(http, config.slack_token.clone(), config.channel_id.clone())
        .with_identity(
            config.slack_username.clone(),
            config.slack_icon_emoji.clone(),
        )
        .with_api_url(config.slack_api_url.clone());

    let service = MembershipService::new(sheets, cards, notifier);

    Ok(run_once(&service, &config.file_id, command, out).await)
}

/// Runs `load_env` first so a `RUST_LOG` it provides is picked up.
fn log_filter<F: FnOnce()>(load_env: F) -> EnvFilter {
    load_env();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the single JSON result.
    // The .env file (if it exists) is loaded before the filter is built.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(|| {
            dotenv::dotenv().ok();
        }))
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout();
    let code = match start(&mut stdout).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            report_failure(&mut stdout, &format!("{:#}", e))
        }
    };
    std::process::exit(code);
}
