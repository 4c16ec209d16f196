// Ports for the membership workflows.
// The core defines WHAT it needs from the outside world; the infra layer
// decides HOW (Google APIs, MongoDB, Slack, or in-memory fakes in tests).

use super::membership_models::{AppendResult, CardRecord, DriveFile, SpreadsheetInfo};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Which remote provider a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteService {
    Auth,
    Drive,
    Spreadsheet,
    MembershipStore,
    Notification,
}

impl fmt::Display for RemoteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteService::Auth => "Google auth",
            RemoteService::Drive => "Drive",
            RemoteService::Spreadsheet => "Sheets",
            RemoteService::MembershipStore => "Membership store",
            RemoteService::Notification => "Notification",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("{service} error: {message}")]
    RemoteService {
        service: RemoteService,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MembershipError {
    pub fn remote(service: RemoteService, message: impl Into<String>) -> Self {
        MembershipError::RemoteService {
            service,
            message: message.into(),
        }
    }
}

// ============================================================================
// GATEWAY TRAITS
// ============================================================================

/// Access to the spreadsheet holding the authorized member list.
#[async_trait]
pub trait SpreadsheetGateway: Send + Sync {
    /// All files matching a drive search expression, across every result page.
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, MembershipError>;

    /// Metadata for one file. `NotFound` when the provider has no such file.
    async fn find_file(&self, file_id: &str) -> Result<DriveFile, MembershipError>;

    async fn get_spreadsheet(&self, file_id: &str) -> Result<SpreadsheetInfo, MembershipError>;

    /// First cell of each non-empty row in rows 2..=10000 of the given column.
    async fn read_column(
        &self,
        file_id: &str,
        column_index: usize,
    ) -> Result<Vec<String>, MembershipError>;

    /// Appends one row after the table anchored at `range`.
    async fn append_row(
        &self,
        file_id: &str,
        range: &str,
        values: &[String],
    ) -> Result<AppendResult, MembershipError>;
}

/// Read access to card records.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// `Ok(None)` when no card has this UID.
    async fn find_card_by_uid(&self, card_uid: &str)
        -> Result<Option<CardRecord>, MembershipError>;

    /// Every card whose member is in `member_ids`. An empty set yields no cards.
    async fn find_cards_by_member_ids(
        &self,
        member_ids: &HashSet<String>,
    ) -> Result<Vec<CardRecord>, MembershipError>;
}

/// One-line alerts to a fixed channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), MembershipError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_name_the_failing_service() {
        let error = MembershipError::remote(RemoteService::MembershipStore, "connection refused");
        assert_eq!(
            error.to_string(),
            "Membership store error: connection refused"
        );
    }

    #[test]
    fn configuration_error_message_is_descriptive() {
        let error = MembershipError::Configuration("missing FILE_ID".into());
        assert!(error.to_string().contains("FILE_ID"));
    }
}
