pub mod about;
pub mod contact;
pub mod content;
pub mod counter;
pub mod discount;
pub mod image;
pub mod order;
pub mod permission;
pub mod product;
pub mod role;
pub mod user;
pub mod verification;

pub use about::AboutUs;
pub use contact::ContactInfo;
pub use content::{Content, ContentType};
pub use counter::Counter;
pub use discount::{DiscountStatus, GlobalDiscount};
pub use image::{ImageAsset, ImageSize};
pub use order::{
    CustomerInfo, Order, OrderItem, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus,
    ShippingAddress,
};
pub use permission::{Permission, PermissionCategory};
pub use product::{Product, ProductStatus, WeightUnit};
pub use role::Role;
pub use user::{User, UserStatus};
pub use verification::Verification;

use serde::{Deserialize, Serialize};

/// Lifecycle flag shared by roles and permissions; deletes are soft.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    #[default]
    Active,
    Disabled,
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(RecordStatus::Active),
            "DISABLED" => Ok(RecordStatus::Disabled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}
