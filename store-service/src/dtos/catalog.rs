use crate::models::{DiscountStatus, GlobalDiscount, Product, ProductStatus, WeightUnit};
use crate::services::discounts::ScheduledReset;
use crate::utils::validation::{check_len, invalid};
use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    /// The public `EID...` id, never the document id.
    pub id: String,
    pub title: String,
    pub images: Vec<String>,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub price: f64,
    pub discount_percentage: f64,
    pub discount_expiry: Option<DateTime<Utc>>,
    pub discounted_price: f64,
    pub is_discounted: bool,
    pub weight: f64,
    pub weight_unit: WeightUnit,
    pub quantity: i64,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductDto {
    pub fn at(product: &Product, now: DateTime<Utc>) -> Self {
        Self {
            id: product.product_id.clone(),
            title: product.title.clone(),
            images: product.images.clone(),
            description: product.description.clone(),
            ingredients: product.ingredients.clone(),
            instructions: product.instructions.clone(),
            price: product.price,
            discount_percentage: product.discount_percentage,
            discount_expiry: product.discount_expiry.map(|d| d.to_chrono()),
            discounted_price: product.discounted_price_at(now),
            is_discounted: product.discount_active_at(now),
            weight: product.weight,
            weight_unit: product.weight_unit,
            quantity: product.quantity,
            status: product.status,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

impl From<&Product> for ProductDto {
    fn from(product: &Product) -> Self {
        Self::at(product, Utc::now())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDiscountDto {
    pub id: String,
    pub discount_percentage: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: DiscountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&GlobalDiscount> for GlobalDiscountDto {
    fn from(discount: &GlobalDiscount) -> Self {
        Self {
            id: discount.id.to_hex(),
            discount_percentage: discount.discount_percentage,
            start_date: discount.start_date,
            end_date: discount.end_date,
            status: discount.status,
            created_at: discount.created_at,
            updated_at: discount.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedGlobalDiscount {
    #[serde(flatten)]
    pub discount: GlobalDiscountDto,
    pub scheduled_reset: ScheduledReset,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivatedGlobalDiscount {
    pub message: &'static str,
    pub discount: GlobalDiscountDto,
    pub products_updated: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGlobalDiscountRequest {
    pub discount_percentage: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGlobalDiscountRequest {
    pub discount_percentage: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

/// Product markdown. The catalogue routes send `discountExpiry`, the discount routes `endDate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDiscountRequest {
    pub discount_percentage: Option<f64>,
    #[serde(alias = "endDate")]
    pub discount_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RemovedProduct {
    pub message: &'static str,
    pub product: ProductDto,
}

/// Text parts of a product multipart form. List fields accept repeated parts
/// or a single JSON array part.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub price: Option<String>,
    pub weight: Option<String>,
    pub weight_unit: Option<String>,
    pub quantity: Option<String>,
    pub discount_percentage: Option<String>,
    pub discount_expiry: Option<String>,
    pub status: Option<String>,
}

/// Validated product fields, ready to become a document.
#[derive(Debug)]
pub struct ProductFields {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub price: f64,
    pub weight: f64,
    pub weight_unit: WeightUnit,
    pub quantity: i64,
    pub discount_percentage: f64,
    pub discount_expiry: Option<DateTime<Utc>>,
}

fn push_list(list: &mut Option<Vec<String>>, value: String) {
    let list = list.get_or_insert_with(Vec::new);
    if value.trim_start().starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(&value) {
            list.extend(items);
            return;
        }
    }
    list.push(value);
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| invalid(field, "is required"))
}

fn non_negative(field: &str, raw: &str) -> Result<f64, AppError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(field, "must be a number"))?;
    if value < 0.0 || !value.is_finite() {
        return Err(invalid(field, "must not be negative"));
    }
    Ok(value)
}

fn quantity(raw: &str) -> Result<i64, AppError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("quantity", "must be a whole number"))?;
    if value < 0 {
        return Err(invalid("quantity", "must not be negative"));
    }
    Ok(value)
}

fn percentage(raw: &str) -> Result<f64, AppError> {
    let value = non_negative("discountPercentage", raw)?;
    if value > 100.0 {
        return Err(invalid("discountPercentage", "must be between 0 and 100"));
    }
    Ok(value)
}

fn expiry(raw: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "null" {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|d| Some(d.with_timezone(&Utc)))
        .map_err(|_| invalid("discountExpiry", "must be an ISO-8601 date"))
}

fn check_list(field: &str, items: &[String], min: usize, max: usize) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(invalid(field, "at least one entry is required"));
    }
    items.iter().try_for_each(|item| check_len(field, item, min, max))
}

fn check_title(title: &str) -> Result<(), AppError> {
    check_len("title", title, 2, 100)
}

fn check_description(description: &str) -> Result<(), AppError> {
    check_len("description", description, 395, 1000)
}

impl ProductForm {
    pub fn push(&mut self, name: &str, value: String) {
        match name.trim_end_matches("[]") {
            "title" => self.title = Some(value.trim().to_string()),
            "description" => self.description = Some(value),
            "ingredients" => push_list(&mut self.ingredients, value),
            "instructions" => push_list(&mut self.instructions, value),
            "price" => self.price = Some(value),
            "weight" => self.weight = Some(value),
            "weightUnit" => self.weight_unit = Some(value),
            "quantity" => self.quantity = Some(value),
            "discountPercentage" => self.discount_percentage = Some(value),
            "discountExpiry" => self.discount_expiry = Some(value),
            "status" => self.status = Some(value),
            other => tracing::debug!(field = %other, "Ignoring unknown product form field"),
        }
    }

    /// Every field a new product needs, checked against the catalogue rules.
    pub fn into_fields(self) -> Result<ProductFields, AppError> {
        let title = required("title", self.title)?;
        check_title(&title)?;
        let description = required("description", self.description)?;
        check_description(&description)?;
        let ingredients = self.ingredients.unwrap_or_default();
        check_list("ingredients", &ingredients, 2, 200)?;
        let instructions = self.instructions.unwrap_or_default();
        check_list("instructions", &instructions, 5, 500)?;

        let weight_unit = required("weightUnit", self.weight_unit)?
            .parse::<WeightUnit>()
            .map_err(|e| invalid("weightUnit", e))?;

        Ok(ProductFields {
            title,
            description,
            ingredients,
            instructions,
            price: non_negative("price", &required("price", self.price)?)?,
            weight: non_negative("weight", &required("weight", self.weight)?)?,
            weight_unit,
            quantity: self.quantity.as_deref().map(quantity).transpose()?.unwrap_or(0),
            discount_percentage: self
                .discount_percentage
                .as_deref()
                .map(percentage)
                .transpose()?
                .unwrap_or(0.0),
            discount_expiry: self.discount_expiry.as_deref().map(expiry).transpose()?.flatten(),
        })
    }

    /// `$set` document for the fields present in the form.
    pub fn into_update(self) -> Result<Document, AppError> {
        let mut set = Document::new();
        if let Some(title) = self.title {
            check_title(&title)?;
            set.insert("title", title);
        }
        if let Some(description) = self.description {
            check_description(&description)?;
            set.insert("description", description);
        }
        if let Some(ingredients) = self.ingredients {
            check_list("ingredients", &ingredients, 2, 200)?;
            set.insert("ingredients", ingredients);
        }
        if let Some(instructions) = self.instructions {
            check_list("instructions", &instructions, 5, 500)?;
            set.insert("instructions", instructions);
        }
        if let Some(price) = self.price {
            set.insert("price", non_negative("price", &price)?);
        }
        if let Some(weight) = self.weight {
            set.insert("weight", non_negative("weight", &weight)?);
        }
        if let Some(unit) = self.weight_unit {
            unit.parse::<WeightUnit>().map_err(|e| invalid("weightUnit", e))?;
            set.insert("weightUnit", unit);
        }
        if let Some(raw) = self.quantity {
            set.insert("quantity", quantity(&raw)?);
        }
        if let Some(raw) = self.discount_percentage {
            set.insert("discountPercentage", percentage(&raw)?);
        }
        if let Some(raw) = self.discount_expiry {
            match expiry(&raw)? {
                Some(at) => set.insert("discountExpiry", bson::DateTime::from_chrono(at)),
                None => set.insert("discountExpiry", Bson::Null),
            };
        }
        if let Some(status) = self.status {
            match status.as_str() {
                "VISIBLE" | "HIDDEN" => set.insert("status", status),
                _ => return Err(invalid("status", "must be VISIBLE or HIDDEN")),
            };
        }
        Ok(set)
    }
}

impl ProductFields {
    pub fn into_product(self, product_id: String, images: Vec<String>) -> Product {
        let now = Utc::now();
        Product {
            id: ObjectId::new(),
            product_id,
            title: self.title,
            images,
            description: self.description,
            ingredients: self.ingredients,
            instructions: self.instructions,
            price: self.price,
            discount_percentage: self.discount_percentage,
            discount_expiry: self.discount_expiry.map(bson::DateTime::from_chrono),
            weight: self.weight,
            weight_unit: self.weight_unit,
            quantity: self.quantity,
            status: ProductStatus::Visible,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::round2;
    use mongodb::bson::{self, oid::ObjectId};

    #[test]
    fn dto_exposes_public_id_and_computed_price() {
        let now = Utc::now();
        let product = Product {
            id: ObjectId::new(),
            product_id: "EID2230".to_string(),
            title: "Shiro".to_string(),
            images: vec!["shiro.webp".to_string()],
            description: "d".repeat(400),
            ingredients: vec!["chickpea".to_string()],
            instructions: vec!["simmer slowly".to_string()],
            price: 12.0,
            discount_percentage: 10.0,
            discount_expiry: Some(bson::DateTime::from_chrono(now + chrono::Duration::hours(2))),
            weight: 1.0,
            weight_unit: WeightUnit::Kg,
            quantity: 3,
            status: ProductStatus::Visible,
            created_at: now,
            updated_at: now,
        };

        let dto = ProductDto::at(&product, now);
        assert_eq!(dto.id, "EID2230");
        assert!(dto.is_discounted);
        assert_eq!(dto.discounted_price, round2(10.8));

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["discountedPrice"], 10.8);
        assert_eq!(json["weightUnit"], "kg");
        assert!(json.get("_id").is_none());
    }

    #[test]
    fn product_discount_accepts_either_date_key() {
        let a: ProductDiscountRequest =
            serde_json::from_str(r#"{"discountPercentage":5,"endDate":"2030-01-01T00:00:00Z"}"#).unwrap();
        let b: ProductDiscountRequest =
            serde_json::from_str(r#"{"discountPercentage":5,"discountExpiry":"2030-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(a.discount_expiry, b.discount_expiry);
    }

    fn full_form() -> ProductForm {
        let mut form = ProductForm::default();
        form.push("title", "Berbere".to_string());
        form.push("description", "d".repeat(400));
        form.push("ingredients", "chili".to_string());
        form.push("ingredients", "garlic".to_string());
        form.push("instructions", r#"["toast the spices","grind finely"]"#.to_string());
        form.push("price", "12.5".to_string());
        form.push("weight", "250".to_string());
        form.push("weightUnit", "g".to_string());
        form
    }

    #[test]
    fn form_collects_repeated_and_json_lists() {
        let fields = full_form().into_fields().unwrap();
        assert_eq!(fields.ingredients, vec!["chili", "garlic"]);
        assert_eq!(fields.instructions.len(), 2);
        assert_eq!(fields.quantity, 0);
        assert_eq!(fields.discount_percentage, 0.0);

        let product = fields.into_product("EID2223".to_string(), vec!["a.png".to_string()]);
        assert_eq!(product.status, ProductStatus::Visible);
        assert_eq!(product.weight_unit, WeightUnit::G);
    }

    #[test]
    fn form_rejects_catalogue_rule_violations() {
        let mut form = full_form();
        form.description = Some("too short".to_string());
        assert!(matches!(
            form.into_fields(),
            Err(AppError::InvalidField { ref field, .. }) if field == "description"
        ));

        let mut form = full_form();
        form.push("discountPercentage", "120".to_string());
        assert!(matches!(
            form.into_fields(),
            Err(AppError::InvalidField { ref field, .. }) if field == "discountPercentage"
        ));

        let mut form = full_form();
        form.weight_unit = Some("lb".to_string());
        assert!(form.into_fields().is_err());
    }

    #[test]
    fn update_only_touches_present_fields() {
        let mut form = ProductForm::default();
        form.push("price", "9".to_string());
        form.push("discountExpiry", "null".to_string());

        let set = form.into_update().unwrap();
        assert_eq!(set.get_f64("price").unwrap(), 9.0);
        assert_eq!(set.get("discountExpiry"), Some(&Bson::Null));
        assert!(set.get("title").is_none());
    }
}
