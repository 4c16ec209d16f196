// MongoDB implementation of CardStore.
//
// Card documents live in one collection (`cards` by default):
//
//   { "uid": ObjectId | string, "member_id": ObjectId | string, "holder": string }
//
// Identifiers that look like an ObjectId are queried both as an ObjectId and as
// a hex string in either case; anything else is matched as a plain string.
// Results come back out normalized (ObjectIds as lower-case hex).

use crate::core::membership::{
    normalize_identifier, CardRecord, CardStore, MembershipError, RemoteService,
};
use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::collections::HashSet;
use std::time::Duration;

const UID_FIELD: &str = "uid";
const MEMBER_ID_FIELD: &str = "member_id";
const HOLDER_FIELD: &str = "holder";

fn store_error(e: mongodb::error::Error) -> MembershipError {
    tracing::error!("Membership store query failed: {}", e);
    MembershipError::remote(RemoteService::MembershipStore, e.to_string())
}

/// Every BSON value a stored identifier may have been written as.
fn identifier_values(id: &str) -> Vec<Bson> {
    match ObjectId::parse_str(id) {
        Ok(oid) => {
            let lower = oid.to_hex();
            let upper = lower.to_ascii_uppercase();
            vec![
                Bson::ObjectId(oid),
                Bson::String(lower),
                Bson::String(upper),
            ]
        }
        Err(_) => vec![Bson::String(id.to_string())],
    }
}

fn identifier_string(value: &Bson) -> Option<String> {
    match value {
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) => Some(normalize_identifier(s)),
        Bson::Null => None,
        other => Some(other.to_string()),
    }
}

fn card_from_document(document: &Document) -> Option<CardRecord> {
    let card_uid = document.get(UID_FIELD).and_then(identifier_string)?;
    let member_id = document.get(MEMBER_ID_FIELD).and_then(identifier_string)?;
    let holder_name = document
        .get_str(HOLDER_FIELD)
        .map(str::to_string)
        .unwrap_or_default();

    Some(CardRecord {
        card_uid,
        member_id,
        holder_name,
    })
}

fn member_ids_filter(member_ids: &HashSet<String>) -> Document {
    let values: Vec<Bson> = member_ids
        .iter()
        .flat_map(|id| identifier_values(id))
        .collect();
    doc! { MEMBER_ID_FIELD: { "$in": values } }
}

fn uid_filter(card_uid: &str) -> Document {
    doc! { UID_FIELD: { "$in": identifier_values(card_uid) } }
}

pub struct MongoCardStore {
    cards: Collection<Document>,
}

impl MongoCardStore {
    /// Builds a client for `uri`. The driver connects lazily on first query.
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self, MembershipError> {
        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            MembershipError::Configuration(format!("invalid DB_URI: {}", e))
        })?;
        options.app_name = Some("card-gate".to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).map_err(store_error)?;
        let cards = client.database(database).collection::<Document>(collection);

        tracing::debug!("Using membership store {}.{}", database, collection);
        Ok(Self { cards })
    }
}

#[async_trait]
impl CardStore for MongoCardStore {
    async fn find_card_by_uid(
        &self,
        card_uid: &str,
    ) -> Result<Option<CardRecord>, MembershipError> {
        let document = self
            .cards
            .find_one(uid_filter(card_uid), None).await.map_err(store_error)?;

        Ok(document.as_ref().and_then(|document| {
            let card = card_from_document(document);
            if card.is_none() {
                tracing::warn!("Card {} is missing its member id", card_uid);
            }
            card
        }))
    }

    async fn find_cards_by_member_ids(
        &self,
        member_ids: &HashSet<String>,
    ) -> Result<Vec<CardRecord>, MembershipError> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut cursor = self
            .cards
            .find(member_ids_filter(member_ids), None)
            .await
            .map_err(store_error)?;

        let mut cards = Vec::new();
        while cursor.advance().await.map_err(store_error)? {
            let document = cursor.deserialize_current().map_err(store_error)?;
            match card_from_document(&document) {
                Some(card) => cards.push(card),
                None => tracing::warn!("Skipping card document without uid or member id"),
            }
        }

        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "5f1d7b8e9c4a2b3d4e5f6a7b";

    #[test]
    fn object_id_shaped_identifiers_match_object_ids_and_hex_strings() {
        let values = identifier_values(&OID.to_ascii_uppercase());

        assert!(matches!(&values[0], Bson::ObjectId(oid) if oid.to_hex() == OID));
        assert!(values.contains(&Bson::String(OID.to_string())));
        assert!(values.contains(&Bson::String(OID.to_ascii_uppercase())));
        assert_eq!(
            identifier_values("04A2B3C4D5"),
            vec![Bson::String("04A2B3C4D5".to_string())]
        );
    }

    #[test]
    fn uid_filter_matches_every_stored_form() {
        let filter = uid_filter(OID);
        let values = filter
            .get_document(UID_FIELD)
            .unwrap()
            .get_array("$in")
            .unwrap();

        assert_eq!(values.len(), 3);
        assert!(values.contains(&Bson::String(OID.to_string())));
    }

    #[test]
    fn hex_strings_are_decoded_in_normalized_form() {
        let document = doc! { "uid": "card-1", "member_id": OID.to_ascii_uppercase() };
        assert_eq!(card_from_document(&document).unwrap().member_id, OID);
    }

    #[test]
    fn card_document_decodes_object_ids_as_hex() {
        let oid = ObjectId::parse_str(OID).unwrap();
        let document = doc! { "uid": "card-1", "member_id": oid, "holder": "Ada" };

        let card = card_from_document(&document).unwrap();
        assert_eq!(card.card_uid, "card-1");
        assert_eq!(card.member_id, OID);
        assert_eq!(card.holder_name, "Ada");
    }

    #[test]
    fn card_document_without_holder_has_empty_name() {
        let document = doc! { "uid": "card-1", "member_id": "m1" };
        assert_eq!(card_from_document(&document).unwrap().holder_name, "");
    }

    #[test]
    fn card_document_without_member_is_rejected() {
        let document = doc! { "uid": "card-1", "member_id": Bson::Null };
        assert!(card_from_document(&document).is_none());
    }

    #[test]
    fn member_filter_is_a_disjunction_over_all_ids() {
        let ids: HashSet<String> = ["m1".to_string(), OID.to_string()].into_iter().collect();
        let filter = member_ids_filter(&ids);

        let values = filter
            .get_document(MEMBER_ID_FIELD)
            .unwrap()
            .get_array("$in")
            .unwrap();
        assert_eq!(values.len(), 4);
        assert!(values.contains(&Bson::String("m1".to_string())));
        assert!(values.contains(&Bson::String(OID.to_string())));
        assert!(values
            .iter()
            .any(|v| matches!(v, Bson::ObjectId(oid) if oid.to_hex() == OID)));
    }
}
