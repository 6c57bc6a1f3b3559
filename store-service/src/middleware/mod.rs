pub mod auth;

pub use auth::{
    authenticate, guard_middleware, require_all, require_any, require_permission, Access,
    CurrentUser, Guard, ADMIN_ROLE,
};
