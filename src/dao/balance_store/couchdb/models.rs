use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::CouchDaoError;
use crate::dao::models::BalanceEntity;

pub const BALANCE_PREFIX: &str = "balance::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

/// Row of an `_all_docs` answer. Looking up unknown keys yields rows
/// carrying only `key` and `error`.
#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub key: String,
    #[serde(default)]
    pub value: Option<RowValue>,
    #[serde(default)]
    pub doc: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RowValue {
    pub rev: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct AllDocsKeys<'a> {
    pub keys: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<CouchBalanceDocument>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDocsResult {
    pub id: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchBalanceDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub points: i64,
}

impl CouchBalanceDocument {
    pub fn new(identity: Uuid, points: i64, rev: Option<String>) -> Self {
        Self {
            id: balance_doc_id(identity),
            rev,
            points,
        }
    }

    pub fn try_into_entity(self) -> Result<BalanceEntity, CouchDaoError> {
        Ok(BalanceEntity {
            id: extract_uuid(&self.id)?,
            points: self.points,
        })
    }
}

pub fn balance_doc_id(identity: Uuid) -> String {
    format!("{BALANCE_PREFIX}{identity}")
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    doc_id
        .strip_prefix(BALANCE_PREFIX)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_ids_round_trip_through_the_prefix() {
        let identity = Uuid::new_v4();
        assert_eq!(extract_uuid(&balance_doc_id(identity)).unwrap(), identity);
        assert!(extract_uuid("game::1234").is_err());
    }

    #[test]
    fn new_documents_omit_the_revision() {
        let doc = CouchBalanceDocument::new(Uuid::nil(), 12, None);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("_rev").is_none());
        assert_eq!(json["points"], 12);
    }

    #[test]
    fn missing_key_rows_decode() {
        let payload = r#"{"rows":[{"key":"balance::x","error":"not_found"}]}"#;
        let parsed: AllDocsResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.rows[0].error.as_deref(), Some("not_found"));
        assert!(parsed.rows[0].value.is_none());
    }
}
