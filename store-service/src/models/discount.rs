use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountStatus {
    #[default]
    Active,
    Removed,
    Inactive,
}

impl std::str::FromStr for DiscountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(DiscountStatus::Active),
            "REMOVED" => Ok(DiscountStatus::Removed),
            "INACTIVE" => Ok(DiscountStatus::Inactive),
            _ => Err(format!("Invalid discount status: {}", s)),
        }
    }
}

/// Store-wide markdown applied to every product without its own discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDiscount {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub discount_percentage: f64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub status: DiscountStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl GlobalDiscount {
    pub fn new(discount_percentage: f64, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            discount_percentage,
            start_date,
            end_date,
            status: DiscountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name of the scheduler job that expires this discount.
    pub fn job_name(&self) -> String {
        format!("reset-discount-{}", self.id.to_hex())
    }
}
