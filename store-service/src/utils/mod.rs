pub mod pagination;
pub mod password;
pub mod validation;

pub use pagination::{PageQuery, Paginated, SearchFields};
pub use password::{Password, PASSWORD_POLICY_MESSAGE};
pub use validation::ValidatedJson;
