use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub description: String,
    pub phone_number: String,
    pub email: String,
    pub location: String,
}
