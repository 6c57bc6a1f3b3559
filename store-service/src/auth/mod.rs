pub mod permissions;
pub mod roles;

pub use permissions::PermissionCode;
pub use roles::LegacyRole;
