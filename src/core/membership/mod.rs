pub mod membership_models;
pub mod membership_ports;
pub mod membership_service;
pub mod sheet_addressing;

#[allow(unused_imports)]
pub use membership_models::{
    normalize_identifier, AppendResult, AuthorizedMemberList, CardRecord, DriveFile, MemberRecord,
    SheetSummary, SpreadsheetInfo,
};
pub use membership_ports::{
    CardStore, MembershipError, NotificationSink, RemoteService, SpreadsheetGateway,
};
pub use membership_service::MembershipService;
