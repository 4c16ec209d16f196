// The core module contains all business logic.
// It knows about members, cards and sheets, but nothing about HTTP or MongoDB.

#[path = "membership/mod.rs"]
pub mod membership;
