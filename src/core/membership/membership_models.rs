use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One authorized member as it appears in the membership sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub member_id: String,
    pub holder_name: String,
}

impl MemberRecord {
    /// The row written to the sheet for this member: `[memberId, holderName]`.
    pub fn into_row(self) -> Vec<String> {
        vec![self.member_id, self.holder_name]
    }
}

/// Association between a physical card and a member, owned by the membership store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub card_uid: String,
    pub member_id: String,
    /// Display name stored next to the card. Empty when the store has none.
    pub holder_name: String,
}

impl CardRecord {
    pub fn member(&self) -> MemberRecord {
        MemberRecord {
            member_id: self.member_id.clone(),
            holder_name: self.holder_name.clone(),
        }
    }
}

/// Canonical form of an identifier: ObjectId-shaped ids (24 hex digits) are
/// lower-cased so `5F1D...` and `5f1d...` name the same member. Anything else
/// is left untouched.
pub fn normalize_identifier(id: &str) -> String {
    if id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit()) {
        id.to_ascii_lowercase()
    } else {
        id.to_string()
    }
}

/// Member identifiers read from the first column of the sheet, in row order.
///
/// Duplicates are kept as-is. Ids are stored normalized and lookups
/// normalize their argument, so the list compares like the card store does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedMemberList {
    member_ids: Vec<String>,
}

impl AuthorizedMemberList {
    pub fn new(member_ids: Vec<String>) -> Self {
        Self {
            member_ids: member_ids
                .into_iter()
                .map(|id| normalize_identifier(&id))
                .collect(),
        }
    }

    pub fn contains(&self, member_id: &str) -> bool {
        let member_id = normalize_identifier(member_id);
        self.member_ids.iter().any(|id| *id == member_id)
    }

    pub fn to_set(&self) -> HashSet<String> {
        self.member_ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// A file as reported by the drive listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Spreadsheet-level metadata: its title and the titles of its tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreadsheetInfo {
    pub spreadsheet_id: String,
    pub title: String,
    pub sheet_titles: Vec<String>,
}

/// Drive metadata and spreadsheet metadata for the configured membership file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub file: DriveFile,
    pub spreadsheet: SpreadsheetInfo,
}

/// What the spreadsheet reported after appending a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppendResult {
    pub updated_range: Option<String>,
    pub updated_rows: u64,
}
