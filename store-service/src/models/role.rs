use super::RecordStatus;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<ObjectId>,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, description: String, permissions: Vec<ObjectId>) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            name,
            description,
            permissions,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
