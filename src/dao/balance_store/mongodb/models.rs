use mongodb::bson::{Binary, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::BalanceEntity;

/// Shape of a document in the `balances` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBalanceDocument {
    #[serde(rename = "_id")]
    id: Binary,
    points: i64,
}

impl TryFrom<MongoBalanceDocument> for BalanceEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBalanceDocument) -> Result<Self, Self::Error> {
        let id = Uuid::from_slice(&value.id.bytes).map_err(|_| MongoDaoError::MalformedId {
            len: value.id.bytes.len(),
        })?;
        Ok(Self {
            id,
            points: value.points,
        })
    }
}

impl MongoBalanceDocument {
    pub fn points(&self) -> i64 {
        self.points
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
