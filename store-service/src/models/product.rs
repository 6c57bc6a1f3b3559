use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductStatus {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    G,
    Kg,
    Ml,
    L,
}

impl std::str::FromStr for WeightUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "g" => Ok(WeightUnit::G),
            "kg" => Ok(WeightUnit::Kg),
            "ml" => Ok(WeightUnit::Ml),
            "l" => Ok(WeightUnit::L),
            _ => Err(format!("{} is not a valid weight unit", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Public identifier, `EID{n}`.
    #[serde(rename = "product_id")]
    pub product_id: String,
    pub title: String,
    pub images: Vec<String>,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub discount_expiry: Option<bson::DateTime>,
    pub weight: f64,
    pub weight_unit: WeightUnit,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether a markdown applies at `now`. An absent expiry never lapses.
    pub fn discount_active_at(&self, now: DateTime<Utc>) -> bool {
        self.discount_percentage > 0.0
            && self
                .discount_expiry
                .map_or(true, |expiry| expiry.to_chrono() > now)
    }

    /// Price after the active discount, rounded to cents.
    pub fn discounted_price_at(&self, now: DateTime<Utc>) -> f64 {
        if !self.discount_active_at(now) {
            return self.price;
        }
        round2(self.price * (1.0 - self.discount_percentage / 100.0))
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
