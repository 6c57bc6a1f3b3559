use serde::{Deserialize, Serialize};

/// Monotonic sequence keyed by `for`, used to mint public product ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "for")]
    pub for_collection: String,
    pub counter: i64,
}

pub const PRODUCT_COUNTER: &str = "products";
/// Seed value; the first product is numbered one above it.
pub const PRODUCT_COUNTER_START: i64 = 2222;
