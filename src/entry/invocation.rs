// Entry points: turn an external trigger into exactly one workflow call,
// report its result, and hand back an exit code. Process lifetime is the
// caller's business (`main` exits right after `run_once`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;

use crate::core::membership::{
    AppendResult, CardStore, DriveFile, MembershipError, MembershipService, NotificationSink,
    SheetSummary, SpreadsheetGateway,
};

pub const USAGE: &str =
    "usage: card-gate <download | verify [cardId] | add [cardId] | list-files <query> | describe>\n\
     When cardId is omitted, an event like {\"queryStringParameters\":{\"cardId\":\"...\"}} is read from stdin.";

const CARD_ID_PARAM: &str = "cardId";

/// HTTP-style trigger payload. Only the query string is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationEvent {
    #[serde(rename = "queryStringParameters", default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl InvocationEvent {
    pub fn for_card(card_id: &str) -> Self {
        Self {
            query_string_parameters: Some(HashMap::from([(
                CARD_ID_PARAM.to_string(),
                card_id.to_string(),
            )])),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, MembershipError> {
        serde_json::from_str(raw)
            .map_err(|e| MembershipError::InvalidRequest(format!("malformed event: {}", e)))
    }

    pub fn card_id(&self) -> Result<&str, MembershipError> {
        self.query_string_parameters
            .as_ref()
            .and_then(|params| params.get(CARD_ID_PARAM))
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                MembershipError::InvalidRequest("missing cardId query parameter".to_string())
            })
    }
}

#[derive(Debug)]
pub enum Command {
    Download,
    Verify(InvocationEvent),
    Add(InvocationEvent),
    ListFiles(String),
    Describe,
}

/// Parses command-line arguments (without the program name).
/// `read_event` is only called when a card command has no inline card id.
pub fn parse_command<R>(args: &[String], read_event: R) -> Result<Command, MembershipError>
where
    R: FnOnce() -> Result<String, MembershipError>,
{
    let operation = args
        .first()
        .ok_or_else(|| MembershipError::InvalidRequest(USAGE.to_string()))?;

    let card_event = |read_event: R| -> Result<InvocationEvent, MembershipError> {
        match args.get(1) {
            Some(card_id) => Ok(InvocationEvent::for_card(card_id)),
            None => InvocationEvent::from_json(&read_event()?),
        }
    };

    match operation.as_str() {
        "download" => Ok(Command::Download),
        "verify" => Ok(Command::Verify(card_event(read_event)?)),
        "add" => Ok(Command::Add(card_event(read_event)?)),
        "list-files" => {
            let query = args[1..].join(" ");
            if query.trim().is_empty() {
                return Err(MembershipError::InvalidRequest(
                    "list-files needs a Drive search query".to_string(),
                ));
            }
            Ok(Command::ListFiles(query))
        }
        "describe" => Ok(Command::Describe),
        other => Err(MembershipError::InvalidRequest(format!(
            "unknown operation '{}'\n{}",
            other, USAGE
        ))),
    }
}

/// The single result an invocation reports.
#[derive(Debug, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum WorkflowOutput {
    Download {
        card_uids: Vec<String>,
    },
    Verify {
        card_uid: String,
        exists: bool,
    },
    Add {
        card_uid: String,
        appended: Option<AppendResult>,
    },
    ListFiles {
        files: Vec<DriveFile>,
    },
    Describe {
        summary: SheetSummary,
    },
}

pub async fn download_users<G, S, N>(
    service: &MembershipService<G, S, N>,
    file_id: &str,
) -> Result<WorkflowOutput, MembershipError>
where
    G: SpreadsheetGateway,
    S: CardStore,
    N: NotificationSink,
{
    let card_uids = service.download(file_id).await?;
    Ok(WorkflowOutput::Download { card_uids })
}

pub async fn verify_user<G, S, N>(
    service: &MembershipService<G, S, N>,
    file_id: &str,
    event: &InvocationEvent,
) -> Result<WorkflowOutput, MembershipError>
where
    G: SpreadsheetGateway,
    S: CardStore,
    N: NotificationSink,
{
    let card_uid = event.card_id()?;
    let exists = service.verify(file_id, card_uid).await?;
    Ok(WorkflowOutput::Verify {
        card_uid: card_uid.to_string(),
        exists,
    })
}

pub async fn add_user<G, S, N>(
    service: &MembershipService<G, S, N>,
    file_id: &str,
    event: &InvocationEvent,
) -> Result<WorkflowOutput, MembershipError>
where
    G: SpreadsheetGateway,
    S: CardStore,
    N: NotificationSink,
{
    let card_uid = event.card_id()?;
    let appended = service.add(file_id, card_uid).await?;
    Ok(WorkflowOutput::Add {
        card_uid: card_uid.to_string(),
        appended,
    })
}

/// Runs one command to completion and writes its result as one JSON line.
/// Returns the process exit code: 0 on success, 1 on failure.
pub async fn run_once<G, S, N, W>(
    service: &MembershipService<G, S, N>,
    file_id: &str,
    command: Command,
    out: &mut W,
) -> i32
where
    G: SpreadsheetGateway,
    S: CardStore,
    N: NotificationSink,
    W: Write,
{
    let result = match &command {
        Command::Download => download_users(service, file_id).await,
        Command::Verify(event) => verify_user(service, file_id, event).await,
        Command::Add(event) => add_user(service, file_id, event).await,
        Command::ListFiles(query) => service
            .list_files(query)
            .await
            .map(|files| WorkflowOutput::ListFiles { files }),
        Command::Describe => service
            .describe(file_id)
            .await
            .map(|summary| WorkflowOutput::Describe { summary }),
    };

    match result.map(|output| serde_json::to_value(&output)) {
        Ok(Ok(value)) => match write_line(out, &value) {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!("Failed to write result: {}", e);
                1
            }
        },
        Ok(Err(e)) => report_failure(out, &e),
        Err(e) => {
            tracing::error!("{:?} failed: {}", command, e);
            report_failure(out, &e)
        }
    }
}

/// Writes `{"error": "<message>"}` as the invocation's one output line.
/// Returns the failure exit code.
pub fn report_failure<W: Write>(out: &mut W, error: &dyn Display) -> i32 {
    let value = serde_json::json!({ "error": error.to_string() });
    if let Err(e) = write_line(out, &value) {
        tracing::error!("Failed to write error result: {}", e);
    }
    1
}

fn write_line<W: Write>(out: &mut W, value: &serde_json::Value) -> std::io::Result<()> {
    writeln!(out, "{}", value)?;
    out.flush()
}
