// Google Drive and Sheets access for the membership spreadsheet.
//
// **Architecture:**
// This module lives in the infra layer because it handles external I/O
// (HTTP requests to Google APIs). The core only sees `SpreadsheetGateway`.

pub mod google_auth;
pub mod paging;
pub mod sheets_client;

pub use google_auth::{RefreshTokenAuth, ServiceAccountAuth, TokenSource};
pub use sheets_client::GoogleSheetsClient;
