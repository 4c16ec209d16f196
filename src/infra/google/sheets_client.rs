// =============================================================================
// GOOGLE DRIVE + SHEETS CLIENT
// =============================================================================
//
// Implements the core `SpreadsheetGateway` over the Drive v3 and Sheets v4
// REST APIs. Only the handful of calls the membership workflows need are
// exposed: list/get files, read spreadsheet metadata, read one column, and
// append one row.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::google_auth::TokenSource;
use super::paging::{collect_pages, Page};
use crate::core::membership::sheet_addressing::column_range;
use crate::core::membership::{
    AppendResult, DriveFile, MembershipError, RemoteService, SpreadsheetGateway, SpreadsheetInfo,
};

pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

// =============================================================================
// API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Spreadsheet {
    spreadsheet_id: String,
    properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: Option<SheetProperties>,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    /// Absent entirely when the range holds no data.
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct AppendValuesResponse {
    updates: Option<UpdateValuesResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    updated_range: Option<String>,
    updated_rows: Option<u64>,
}

impl From<Spreadsheet> for SpreadsheetInfo {
    fn from(sheet: Spreadsheet) -> Self {
        SpreadsheetInfo {
            spreadsheet_id: sheet.spreadsheet_id,
            title: sheet
                .properties
                .and_then(|p| p.title)
                .unwrap_or_default(),
            sheet_titles: sheet
                .sheets
                .into_iter()
                .filter_map(|s| s.properties.and_then(|p| p.title))
                .collect(),
        }
    }
}

impl From<AppendValuesResponse> for AppendResult {
    fn from(response: AppendValuesResponse) -> Self {
        let updates = response.updates;
        AppendResult {
            updated_range: updates.as_ref().and_then(|u| u.updated_range.clone()),
            updated_rows: updates.and_then(|u| u.updated_rows).unwrap_or(0),
        }
    }
}

/// First cell of each row that has one, skipping blank cells.
fn first_cells(range: ValueRange) -> Vec<String> {
    range
        .values
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter_map(|cell| match cell {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .filter(|value| !value.trim().is_empty())
        .collect()
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoogleSheetsClient {
    client: Client,
    auth: Box<dyn TokenSource>,
    drive_base_url: String,
    sheets_base_url: String,
}

impl GoogleSheetsClient {
    pub fn new(client: Client, auth: Box<dyn TokenSource>) -> Self {
        Self {
            client,
            auth,
            drive_base_url: DRIVE_BASE_URL.to_string(),
            sheets_base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    /// Points the client at other Drive and Sheets roots (proxies, emulators).
    pub fn with_base_urls(mut self, drive_base_url: String, sheets_base_url: String) -> Self {
        self.drive_base_url = drive_base_url.trim_end_matches('/').to_string();
        self.sheets_base_url = sheets_base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sends an authorized request and decodes the JSON body.
    /// A 404 becomes `NotFound(resource)`; any other failure is a remote error.
    async fn send_json<T: DeserializeOwned>(
        &self,
        service: RemoteService,
        resource: &str,
        request: RequestBuilder,
    ) -> Result<T, MembershipError> {
        let token = self.auth.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MembershipError::remote(service, e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MembershipError::NotFound(resource.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!("{} API error for {} ({}): {}", service, resource, status, text);
            return Err(MembershipError::remote(
                service,
                format!("{} returned {}: {}", resource, status, text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| MembershipError::remote(service, e.to_string()))
    }

    async fn fetch_file_page(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<Page<DriveFile>, MembershipError> {
        let url = format!("{}/files", self.drive_base_url);
        let mut params = vec![
            ("q", query.to_string()),
            ("fields", "nextPageToken, files(id, name)".to_string()),
            ("pageSize", "1000".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        tracing::debug!("Listing Drive files: {}", query);
        let list: FileList = self
            .send_json(
                RemoteService::Drive,
                "file listing",
                self.client.get(&url).query(&params),
            )
            .await?;

        Ok(Page {
            items: list.files,
            next_page_token: list.next_page_token,
        })
    }
}

#[async_trait]
impl SpreadsheetGateway for GoogleSheetsClient {
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, MembershipError> {
        let files = collect_pages(|token| self.fetch_file_page(query, token)).await?;
        tracing::info!("Found {} Drive file(s) for query", files.len());
        Ok(files)
    }

    async fn find_file(&self, file_id: &str) -> Result<DriveFile, MembershipError> {
        let url = format!("{}/files/{}", self.drive_base_url, file_id);
        tracing::debug!("Fetching Drive file: {}", file_id);

        self.send_json(
            RemoteService::Drive,
            &format!("file {}", file_id),
            self.client
                .get(&url)
                .query(&[("fields", "id, name, mimeType")]),
        )
        .await
    }

    async fn get_spreadsheet(&self, file_id: &str) -> Result<SpreadsheetInfo, MembershipError> {
        let url = format!("{}/spreadsheets/{}", self.sheets_base_url, file_id);
        tracing::debug!("Fetching spreadsheet metadata: {}", file_id);

        let sheet: Spreadsheet = self
            .send_json(
                RemoteService::Spreadsheet,
                &format!("spreadsheet {}", file_id),
                self.client.get(&url).query(&[(
                    "fields",
                    "spreadsheetId,properties.title,sheets.properties.title",
                )]),
            )
            .await?;

        Ok(sheet.into())
    }

    async fn read_column(
        &self,
        file_id: &str,
        column_index: usize,
    ) -> Result<Vec<String>, MembershipError> {
        let range = column_range(column_index)?;
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.sheets_base_url, file_id, range
        );
        tracing::debug!("Reading {} from spreadsheet {}", range, file_id);

        let values: ValueRange = self
            .send_json(
                RemoteService::Spreadsheet,
                &format!("spreadsheet {}", file_id),
                self.client.get(&url),
            )
            .await?;

        Ok(first_cells(values))
    }

    async fn append_row(
        &self,
        file_id: &str,
        range: &str,
        values: &[String],
    ) -> Result<AppendResult, MembershipError> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append",
            self.sheets_base_url, file_id, range
        );
        tracing::debug!("Appending row after {} in spreadsheet {}", range, file_id);

        let response: AppendValuesResponse = self
            .send_json(
                RemoteService::Spreadsheet,
                &format!("spreadsheet {}", file_id),
                self.client
                    .post(&url)
                    .query(&[
                        ("valueInputOption", "RAW"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&json!({ "values": [values] })),
            )
            .await?;

        Ok(response.into())
    }
}
