use crate::auth::{roles, LegacyRole, PermissionCode};
use crate::models::{RecordStatus, User};
use crate::services::access::PopulatedRole;
use crate::startup::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;

pub const ADMIN_ROLE: &str = "ADMIN";

/// The authenticated caller with roles and their permissions resolved.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub roles: Vec<PopulatedRole>,
}

impl CurrentUser {
    pub fn id(&self) -> ObjectId {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.role.name == ADMIN_ROLE)
    }

    /// Document roles decide when the user has any; older accounts fall back to the
    /// legacy permission list, legacy role list, then the single legacy role.
    pub fn has_permission(&self, code: PermissionCode) -> bool {
        if !self.user.roles.is_empty() {
            let granted = self.roles.iter().any(|r| {
                r.role.status == RecordStatus::Active
                    && r.permissions.iter().any(|p| p.code == code.code())
            });
            if !granted {
                tracing::debug!(permission = %code, user_id = %self.user.id, "Permission not granted by any role");
            }
            return granted;
        }
        legacy_grants(&self.user, code)
    }
}

pub fn legacy_grants(user: &User, code: PermissionCode) -> bool {
    if user.legacy_permissions.iter().any(|p| p == code.code()) {
        return true;
    }

    let legacy_roles: Vec<LegacyRole> = user
        .legacy_roles
        .iter()
        .filter_map(|r| LegacyRole::parse(r))
        .collect();
    if roles::has_permission(&legacy_roles, code) {
        return true;
    }

    user.role
        .as_deref()
        .and_then(LegacyRole::parse)
        .is_some_and(|role| roles::has_permission(&[role], code))
}

/// What a route demands of its caller.
#[derive(Debug, Clone, Copy)]
pub enum Access {
    Authenticated,
    Admin,
    Permission(PermissionCode),
    AllOf(&'static [PermissionCode]),
    AnyOf(&'static [PermissionCode]),
}

pub fn require_permission(code: PermissionCode) -> Access {
    Access::Permission(code)
}

pub fn require_all(codes: &'static [PermissionCode]) -> Access {
    Access::AllOf(codes)
}

pub fn require_any(codes: &'static [PermissionCode]) -> Access {
    Access::AnyOf(codes)
}

impl Access {
    pub fn check(&self, user: &CurrentUser) -> Result<(), AppError> {
        let allowed = match self {
            Access::Authenticated => true,
            Access::Admin => {
                if !user.is_admin() {
                    return Err(AppError::Forbidden(anyhow::anyhow!(
                        "Forbidden - Admin access required"
                    )));
                }
                true
            }
            Access::Permission(code) => user.has_permission(*code),
            Access::AllOf(codes) => codes.iter().all(|c| user.has_permission(*c)),
            Access::AnyOf(codes) => codes.iter().any(|c| user.has_permission(*c)),
        };

        if allowed {
            Ok(())
        } else {
            tracing::warn!(user_id = %user.id(), access = ?self, "Insufficient permissions");
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Forbidden - Insufficient permissions"
            )))
        }
    }
}

/// State for [`guard_middleware`]: the app plus the route's requirement.
#[derive(Clone)]
pub struct Guard {
    pub state: AppState,
    pub access: Access,
}

impl Guard {
    pub fn new(state: AppState, access: Access) -> Self {
        Self { state, access }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer token to a user with populated roles.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unauthorized - No token provided")))?;

    let claims = state.jwt.verify(token)?;

    let user_id = ObjectId::parse_str(&claims.id)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Unauthorized - Invalid token subject")))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No user Found")))?;

    let role_docs = state.access.roles_by_ids(&user.roles).await?;
    let roles = state.access.populate(role_docs).await?;

    Ok(CurrentUser { user, roles })
}

/// Authenticates the caller, enforces the route's [`Access`], and stores [`CurrentUser`]
/// in request extensions.
pub async fn guard_middleware(
    State(guard): State<Guard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&guard.state, req.headers()).await?;
    guard.access.check(&user)?;

    tracing::debug!(user_id = %user.id(), "Request authorized");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unauthorized - User not authenticated")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Permission, PermissionCategory, Role};

    fn user() -> User {
        User::new(
            "Abebe".to_string(),
            "Kebede".to_string(),
            None,
            "abebe@example.com".to_string(),
            "0911223344".to_string(),
            "hash".to_string(),
        )
    }

    fn populated(name: &str, codes: &[&str], status: RecordStatus) -> PopulatedRole {
        let permissions: Vec<Permission> = codes
            .iter()
            .map(|c| Permission::new(c.to_string(), String::new(), c.to_string(), PermissionCategory::System))
            .collect();
        let mut role = Role::new(name.to_string(), String::new(), permissions.iter().map(|p| p.id).collect());
        role.status = status;
        PopulatedRole { role, permissions }
    }

    fn with_roles(roles: Vec<PopulatedRole>) -> CurrentUser {
        let mut user = user();
        user.roles = roles.iter().map(|r| r.role.id).collect();
        CurrentUser { user, roles }
    }

    #[test]
    fn active_document_role_grants_its_permissions() {
        let current = with_roles(vec![populated("EDITOR", &["edit:product"], RecordStatus::Active)]);
        assert!(current.has_permission(PermissionCode::EditProduct));
        assert!(!current.has_permission(PermissionCode::DeleteProduct));
    }

    #[test]
    fn disabled_role_grants_nothing() {
        let current = with_roles(vec![populated("EDITOR", &["edit:product"], RecordStatus::Disabled)]);
        assert!(!current.has_permission(PermissionCode::EditProduct));
    }

    #[test]
    fn document_roles_shadow_legacy_fields() {
        let mut current = with_roles(vec![populated("VIEWER", &["view:products"], RecordStatus::Active)]);
        current.user.role = Some("ADMIN".to_string());
        assert!(!current.has_permission(PermissionCode::DeleteUser));
    }

    #[test]
    fn legacy_fields_are_consulted_in_order() {
        let mut u = user();
        u.legacy_permissions = vec!["view:orders".to_string()];
        assert!(legacy_grants(&u, PermissionCode::ViewOrders));
        assert!(!legacy_grants(&u, PermissionCode::CreateProduct));

        u.legacy_roles = vec!["PRODUCT MANAGER".to_string()];
        assert!(legacy_grants(&u, PermissionCode::CreateProduct));

        let mut single = user();
        single.role = Some("ANALYTICS_VIEWER".to_string());
        assert!(legacy_grants(&single, PermissionCode::ExportReports));
        assert!(!legacy_grants(&single, PermissionCode::EditProduct));
    }

    #[test]
    fn admin_guard_checks_role_names() {
        let admin = with_roles(vec![populated(ADMIN_ROLE, &[], RecordStatus::Active)]);
        assert!(Access::Admin.check(&admin).is_ok());

        let other = with_roles(vec![populated("EDITOR", &[], RecordStatus::Active)]);
        assert!(matches!(Access::Admin.check(&other), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn all_and_any_combinators() {
        let current = with_roles(vec![populated(
            "USERS",
            &["view:users", "update:user"],
            RecordStatus::Active,
        )]);
        const BOTH: &[PermissionCode] = &[PermissionCode::ViewUsers, PermissionCode::UpdateUser];
        const MIXED: &[PermissionCode] = &[PermissionCode::DeleteUser, PermissionCode::ViewUsers];
        assert!(require_all(BOTH).check(&current).is_ok());
        assert!(require_all(MIXED).check(&current).is_err());
        assert!(require_any(MIXED).check(&current).is_ok());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
