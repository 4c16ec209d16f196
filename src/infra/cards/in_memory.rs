// In-memory implementation of CardStore.
// Compiled for tests only, in place of a real database.

use crate::core::membership::{CardRecord, CardStore, MembershipError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

/// Cards keyed by UID.
pub struct InMemoryCardStore {
    cards: DashMap<String, CardRecord>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self {
            cards: DashMap::new(),
        }
    }

    /// Inserts or replaces the card with the same UID.
    pub fn insert(&self, card: CardRecord) {
        self.cards.insert(card.card_uid.clone(), card);
    }
}

impl Default for InMemoryCardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<CardRecord> for InMemoryCardStore {
    fn from_iter<I: IntoIterator<Item = CardRecord>>(iter: I) -> Self {
        let store = Self::new();
        for card in iter {
            store.insert(card);
        }
        store
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn find_card_by_uid(
        &self,
        card_uid: &str,
    ) -> Result<Option<CardRecord>, MembershipError> {
        Ok(self.cards.get(card_uid).map(|entry| entry.value().clone()))
    }

    async fn find_cards_by_member_ids(
        &self,
        member_ids: &HashSet<String>,
    ) -> Result<Vec<CardRecord>, MembershipError> {
        // DashMap iteration order is arbitrary; sort so results are repeatable.
        let mut cards: Vec<CardRecord> = self
            .cards
            .iter()
            .filter(|entry| member_ids.contains(&entry.member_id))
            .map(|entry| entry.value().clone())
            .collect();
        cards.sort_by(|a, b| a.card_uid.cmp(&b.card_uid));
        Ok(cards)
    }
}
