// The membership workflows.
// Each workflow is a short linear pipeline over the three ports:
// read the authorized list, look up cards, then send one alert.

use super::membership_models::{AppendResult, AuthorizedMemberList, DriveFile, SheetSummary};
use super::membership_ports::{CardStore, MembershipError, NotificationSink, SpreadsheetGateway};
use super::sheet_addressing::row_range;

/// Column holding member identifiers.
const MEMBER_ID_COLUMN: usize = 0;

/// The orchestrator behind `download`, `verify` and `add`.
///
/// Gateways are injected so a long-running host and the one-shot entry point
/// can share it, and so tests can substitute fakes.
pub struct MembershipService<G, S, N>
where
    G: SpreadsheetGateway,
    S: CardStore,
    N: NotificationSink,
{
    sheets: G,
    cards: S,
    notifier: N,
}

impl<G, S, N> MembershipService<G, S, N>
where
    G: SpreadsheetGateway,
    S: CardStore,
    N: NotificationSink,
{
    pub fn new(sheets: G, cards: S, notifier: N) -> Self {
        Self {
            sheets,
            cards,
            notifier,
        }
    }

    /// UIDs of every stored card whose member is on the authorized list.
    pub async fn download(&self, file_id: &str) -> Result<Vec<String>, MembershipError> {
        let authorized = self.authorized_members(file_id).await?;
        if authorized.is_empty() {
            tracing::warn!(file_id, "Authorized member list is empty");
        }

        let cards = self
            .cards
            .find_cards_by_member_ids(&authorized.to_set())
            .await?;
        let card_uids: Vec<String> = cards.into_iter().map(|card| card.card_uid).collect();

        tracing::info!(
            file_id,
            authorized = authorized.len(),
            cards = card_uids.len(),
            "Downloaded authorized card UIDs"
        );
        self.alert(format!("Card UIDs downloaded: {}", card_uids.len()))
            .await;

        Ok(card_uids)
    }

    /// Whether `card_uid` belongs to a member on the authorized list.
    pub async fn verify(&self, file_id: &str, card_uid: &str) -> Result<bool, MembershipError> {
        let authorized = self.authorized_members(file_id).await?;
        let card = self.cards.find_card_by_uid(card_uid).await?;

        let exists = card
            .as_ref()
            .is_some_and(|card| authorized.contains(&card.member_id));

        tracing::info!(file_id, card_uid, exists, "Verified card");
        self.alert(format!("Card {} exists in {}? {}", card_uid, file_id, exists))
            .await;

        Ok(exists)
    }

    /// Appends the card's member to the sheet.
    ///
    /// **Returns:**
    /// - `Ok(Some(AppendResult))` when the card exists and a row was appended
    /// - `Ok(None)` when no card has this UID (nothing appended, no alert)
    pub async fn add(
        &self,
        file_id: &str,
        card_uid: &str,
    ) -> Result<Option<AppendResult>, MembershipError> {
        let Some(card) = self.cards.find_card_by_uid(card_uid).await? else {
            tracing::info!(file_id, card_uid, "Card not found, nothing added");
            return Ok(None);
        };

        let row = card.member().into_row();
        let appended = self
            .sheets
            .append_row(file_id, &row_range(0), &row)
            .await?;

        tracing::info!(
            file_id,
            card_uid,
            updated_range = appended.updated_range.as_deref().unwrap_or("unknown"),
            "Added card member to sheet"
        );
        self.alert(format!("Card {} added to {}", card_uid, file_id))
            .await;

        Ok(Some(appended))
    }

    /// Files visible to the spreadsheet account that match a drive query.
    pub async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, MembershipError> {
        self.sheets.list_files(query).await
    }

    /// Drive and spreadsheet metadata for the membership file.
    pub async fn describe(&self, file_id: &str) -> Result<SheetSummary, MembershipError> {
        let file = self.sheets.find_file(file_id).await?;
        let spreadsheet = self.sheets.get_spreadsheet(file_id).await?;
        Ok(SheetSummary { file, spreadsheet })
    }

    async fn authorized_members(
        &self,
        file_id: &str,
    ) -> Result<AuthorizedMemberList, MembershipError> {
        let member_ids = self.sheets.read_column(file_id, MEMBER_ID_COLUMN).await?;
        Ok(AuthorizedMemberList::new(member_ids))
    }

    // Alerts never change a workflow's outcome.
    async fn alert(&self, message: String) {
        if let Err(e) = self.notifier.notify(&message).await {
            tracing::warn!("Failed to send alert '{}': {}", message, e);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::membership::{CardRecord, RemoteService, SpreadsheetInfo};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeSheets {
        member_ids: Vec<String>,
        fail_reads: bool,
        appended: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    #[async_trait]
    impl SpreadsheetGateway for FakeSheets {
        async fn list_files(&self, _: &str) -> Result<Vec<DriveFile>, MembershipError> {
            Ok(vec![DriveFile {
                id: "f1".to_string(),
                name: "Members".to_string(),
                mime_type: None,
            }])
        }

        async fn find_file(&self, file_id: &str) -> Result<DriveFile, MembershipError> {
            if file_id != "f1" {
                return Err(MembershipError::NotFound(file_id.to_string()));
            }
            Ok(DriveFile {
                id: "f1".to_string(),
                name: "Members".to_string(),
                mime_type: None,
            })
        }

        async fn get_spreadsheet(&self, file_id: &str) -> Result<SpreadsheetInfo, MembershipError> {
            Ok(SpreadsheetInfo {
                spreadsheet_id: file_id.to_string(),
                title: "Members".to_string(),
                sheet_titles: vec!["Sheet1".to_string()],
            })
        }

        async fn read_column(&self, _: &str, _: usize) -> Result<Vec<String>, MembershipError> {
            if self.fail_reads {
                return Err(MembershipError::remote(
                    RemoteService::Spreadsheet,
                    "quota exceeded",
                ));
            }
            Ok(self.member_ids.clone())
        }

        async fn append_row(
            &self,
            _: &str,
            range: &str,
            values: &[String],
        ) -> Result<AppendResult, MembershipError> {
            self.appended
                .lock()
                .unwrap()
                .push((range.to_string(), values.to_vec()));
            Ok(AppendResult {
                updated_range: Some("Sheet1!A5:B5".to_string()),
                updated_rows: 1,
            })
        }
    }

    struct FakeCards {
        cards: Vec<CardRecord>,
    }

    #[async_trait]
    impl CardStore for FakeCards {
        async fn find_card_by_uid(
            &self,
            card_uid: &str,
        ) -> Result<Option<CardRecord>, MembershipError> {
            Ok(self.cards.iter().find(|c| c.card_uid == card_uid).cloned())
        }

        async fn find_cards_by_member_ids(
            &self,
            member_ids: &HashSet<String>,
        ) -> Result<Vec<CardRecord>, MembershipError> {
            Ok(self
                .cards
                .iter()
                .filter(|c| member_ids.contains(&c.member_id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingNotifier {
        async fn notify(&self, message: &str) -> Result<(), MembershipError> {
            self.sent.lock().unwrap().push(message.to_string());
            if self.fail {
                return Err(MembershipError::remote(
                    RemoteService::Notification,
                    "channel_not_found",
                ));
            }
            Ok(())
        }
    }

    fn card(uid: &str, member_id: &str, holder: &str) -> CardRecord {
        CardRecord {
            card_uid: uid.to_string(),
            member_id: member_id.to_string(),
            holder_name: holder.to_string(),
        }
    }

    fn sheets_with(member_ids: &[&str]) -> FakeSheets {
        FakeSheets {
            member_ids: member_ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn sample_cards() -> FakeCards {
        FakeCards {
            cards: vec![card("u1", "m2", "Ada"), card("u2", "m9", "Grace")],
        }
    }

    #[tokio::test]
    async fn download_returns_cards_of_listed_members() {
        let notifier = RecordingNotifier::default();
        let sent = Arc::clone(&notifier.sent);
        let service = MembershipService::new(sheets_with(&["m1", "m2"]), sample_cards(), notifier);

        let uids = service.download("f1").await.unwrap();

        assert_eq!(uids, vec!["u1"]);
        assert_eq!(*sent.lock().unwrap(), vec!["Card UIDs downloaded: 1"]);
    }

    #[tokio::test]
    async fn download_with_empty_list_returns_nothing() {
        let service = MembershipService::new(
            sheets_with(&[]),
            sample_cards(),
            RecordingNotifier::default(),
        );

        assert!(service.download("f1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_requires_listed_member() {
        let notifier = RecordingNotifier::default();
        let sent = Arc::clone(&notifier.sent);
        let service = MembershipService::new(sheets_with(&["m1", "m2"]), sample_cards(), notifier);

        assert!(service.verify("f1", "u1").await.unwrap());
        assert!(!service.verify("f1", "u2").await.unwrap());
        assert!(!service.verify("f1", "missing").await.unwrap());

        assert_eq!(
            *sent.lock().unwrap(),
            vec![
                "Card u1 exists in f1? true",
                "Card u2 exists in f1? false",
                "Card missing exists in f1? false",
            ]
        );
    }

    #[tokio::test]
    async fn verify_and_download_agree_on_object_id_case() {
        let cards = FakeCards {
            cards: vec![card("u7", "5f1d7b8e9c4a2b3d4e5f6a7b", "Ada")],
        };
        let service = MembershipService::new(
            sheets_with(&["5F1D7B8E9C4A2B3D4E5F6A7B"]),
            cards,
            RecordingNotifier::default(),
        );

        assert_eq!(service.download("f1").await.unwrap(), vec!["u7"]);
        assert!(service.verify("f1", "u7").await.unwrap());
    }

    #[tokio::test]
    async fn add_appends_member_row_and_alerts_once() {
        let sheets = sheets_with(&[]);
        let appended = Arc::clone(&sheets.appended);
        let notifier = RecordingNotifier::default();
        let sent = Arc::clone(&notifier.sent);
        let service = MembershipService::new(sheets, sample_cards(), notifier);

        let result = service.add("f1", "u2").await.unwrap();

        assert_eq!(result.map(|r| r.updated_rows), Some(1));
        assert_eq!(
            *appended.lock().unwrap(),
            vec![(
                "A1:AAA1".to_string(),
                vec!["m9".to_string(), "Grace".to_string()]
            )]
        );
        assert_eq!(*sent.lock().unwrap(), vec!["Card u2 added to f1"]);
    }

    #[tokio::test]
    async fn add_for_unknown_card_is_a_silent_no_op() {
        let sheets = sheets_with(&[]);
        let appended = Arc::clone(&sheets.appended);
        let notifier = RecordingNotifier::default();
        let sent = Arc::clone(&notifier.sent);
        let service = MembershipService::new(sheets, sample_cards(), notifier);

        assert!(service.add("f1", "nope").await.unwrap().is_none());
        assert!(appended.lock().unwrap().is_empty());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn spreadsheet_failure_is_returned_not_swallowed() {
        let sheets = FakeSheets {
            fail_reads: true,
            ..Default::default()
        };
        let notifier = RecordingNotifier::default();
        let sent = Arc::clone(&notifier.sent);
        let service = MembershipService::new(sheets, sample_cards(), notifier);

        let err = service.verify("f1", "u1").await.unwrap_err();

        assert!(matches!(
            err,
            MembershipError::RemoteService {
                service: RemoteService::Spreadsheet,
                ..
            }
        ));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_does_not_change_result() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let service = MembershipService::new(sheets_with(&["m2"]), sample_cards(), notifier);

        assert!(service.verify("f1", "u1").await.unwrap());
        assert_eq!(service.download("f1").await.unwrap(), vec!["u1"]);
    }

    #[tokio::test]
    async fn describe_combines_drive_and_sheet_metadata() {
        let service = MembershipService::new(
            sheets_with(&[]),
            sample_cards(),
            RecordingNotifier::default(),
        );

        let summary = service.describe("f1").await.unwrap();
        assert_eq!(summary.file.name, "Members");
        assert_eq!(summary.spreadsheet.sheet_titles, vec!["Sheet1"]);

        assert!(matches!(
            service.describe("other").await,
            Err(MembershipError::NotFound(_))
        ));
    }
}
