use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Insufficient inventory for product {0}")]
    InsufficientInventory(String),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Payment provider is not configured")]
    PaymentNotConfigured,

    #[error("{0}")]
    InvalidSignature(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::from(e),
            StoreError::Internal(e) => AppError::InternalError(e),
            StoreError::ProductNotFound => AppError::NotFound(anyhow::anyhow!("Product not found")),
            StoreError::OrderNotFound => AppError::NotFound(anyhow::anyhow!("Order not found")),
            e @ StoreError::InsufficientInventory(_) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            StoreError::Payment(msg) => AppError::BadGateway(msg),
            StoreError::PaymentNotConfigured => AppError::ServiceUnavailable,
            StoreError::InvalidSignature(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            StoreError::Invalid(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
        }
    }
}
