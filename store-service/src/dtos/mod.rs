pub mod access;
pub mod catalog;
pub mod order;
pub mod site;
pub mod user;

pub use catalog::{GlobalDiscountDto, ProductDto};
pub use order::OrderDto;
pub use site::ContentDto;
pub use user::{PermissionDto, RoleDto, UserDto};
