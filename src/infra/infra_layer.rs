// The infra module contains implementations of core traits.
// Each external provider gets its own submodule.

#[path = "google/mod.rs"]
pub mod google;

#[path = "cards/card_store.rs"]
pub mod cards;

#[path = "slack/mod.rs"]
pub mod slack;

#[cfg(test)]
#[path = "test_server.rs"]
pub mod test_server;
