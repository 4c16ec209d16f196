// Runtime configuration, read once at startup from the environment
// (after `dotenv` has loaded an optional `.env` file).

use std::path::PathBuf;
use std::time::Duration;

use crate::core::membership::MembershipError;
use crate::infra::google::sheets_client::{DRIVE_BASE_URL, SHEETS_BASE_URL};
use crate::infra::slack::slack_notifier::{DEFAULT_API_URL, DEFAULT_ICON_EMOJI, DEFAULT_USERNAME};

const DEFAULT_COLLECTION: &str = "cards";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How to authenticate against Google.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleCredentials {
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    ServiceAccountFile(PathBuf),
    ServiceAccountJson(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The membership spreadsheet every workflow runs against.
    pub file_id: String,
    pub google: GoogleCredentials,
    pub db_uri: String,
    pub db_name: String,
    pub cards_collection: String,
    pub slack_token: String,
    pub channel_id: String,
    pub slack_username: String,
    pub slack_icon_emoji: String,
    /// API roots; only overridden to reach a proxy or a local emulator.
    pub drive_api_url: String,
    pub sheets_api_url: String,
    pub slack_api_url: String,
    /// Applied to every HTTP request and to MongoDB server selection.
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, MembershipError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Reports every missing
    /// required variable in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MembershipError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut missing: Vec<&str> = Vec::new();
        let mut require = |key: &'static str| {
            let value = get(key);
            if value.is_none() {
                missing.push(key);
            }
            value.unwrap_or_default()
        };

        let file_id = require("FILE_ID");
        let db_uri = require("DB_URI");
        let db_name = require("DB_NAME");
        let slack_token = require("SLACK_TOKEN");
        let channel_id = require("CHANNEL_ID");

        let google = if let Some(path) = get("GOOGLE_SERVICE_ACCOUNT_KEY") {
            GoogleCredentials::ServiceAccountFile(PathBuf::from(path))
        } else if let Some(json) = get("GOOGLE_SERVICE_ACCOUNT_JSON") {
            GoogleCredentials::ServiceAccountJson(json)
        } else {
            GoogleCredentials::RefreshToken {
                client_id: require("CLIENT_ID"),
                client_secret: require("CLIENT_SECRET"),
                refresh_token: require("REFRESH_TOKEN"),
            }
        };

        if !missing.is_empty() {
            return Err(MembershipError::Configuration(format!(
                "missing environment variable(s): {}",
                missing.join(", ")
            )));
        }

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                MembershipError::Configuration(format!(
                    "REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            file_id,
            google,
            db_uri,
            db_name,
            cards_collection: get("CARDS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            slack_token,
            channel_id,
            slack_username: get("SLACK_USERNAME").unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            slack_icon_emoji: get("SLACK_ICON_EMOJI")
                .unwrap_or_else(|| DEFAULT_ICON_EMOJI.to_string()),
            drive_api_url: get("GOOGLE_DRIVE_API_URL")
                .unwrap_or_else(|| DRIVE_BASE_URL.to_string()),
            sheets_api_url: get("GOOGLE_SHEETS_API_URL")
                .unwrap_or_else(|| SHEETS_BASE_URL.to_string()),
            slack_api_url: get("SLACK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            request_timeout: Duration::from_secs(request_timeout),
        })
    }
}
