use super::RecordStatus;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionCategory {
    Product,
    View,
    User,
    Order,
    Content,
    System,
    Analytics,
    Marketing,
}

impl PermissionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionCategory::Product => "product",
            PermissionCategory::View => "view",
            PermissionCategory::User => "user",
            PermissionCategory::Order => "order",
            PermissionCategory::Content => "content",
            PermissionCategory::System => "system",
            PermissionCategory::Analytics => "analytics",
            PermissionCategory::Marketing => "marketing",
        }
    }
}

impl std::str::FromStr for PermissionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(PermissionCategory::Product),
            "view" => Ok(PermissionCategory::View),
            "user" => Ok(PermissionCategory::User),
            "order" => Ok(PermissionCategory::Order),
            "content" => Ok(PermissionCategory::Content),
            "system" => Ok(PermissionCategory::System),
            "analytics" => Ok(PermissionCategory::Analytics),
            "marketing" => Ok(PermissionCategory::Marketing),
            _ => Err(format!("Invalid permission category: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    /// Capability code such as `view:products`.
    pub code: String,
    pub category: PermissionCategory,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(name: String, description: String, code: String, category: PermissionCategory) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            name,
            description,
            code,
            category,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
