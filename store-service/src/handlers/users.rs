use crate::dtos::access::RoleIdsRequest;
use crate::dtos::user::{ChangePasswordRequest, RegisterRequest, RoleDto, StatusQuery, UpdateUserRequest, UserDto};
use crate::handlers::auth::create_account;
use crate::handlers::{failure, object_id, parse_object_ids};
use crate::middleware::CurrentUser;
use crate::models::{User, UserStatus};
use crate::services::access::PopulatedRole;
use crate::startup::AppState;
use crate::utils::pagination::{PageQuery, Paginated, SearchFields, DEFAULT_LIMIT};
use crate::utils::password::{Password, PASSWORD_POLICY_MESSAGE};
use crate::utils::validation::{invalid, ValidatedJson};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde_json::json;
use service_core::error::AppError;
use std::collections::HashSet;

const USER_SEARCH: SearchFields = SearchFields {
    text: &["firstName", "fathersName", "email", "phone_number"],
    numeric: &[],
};

const USER_NOT_FOUND: &str = "User not found";

async fn roles_of(state: &AppState, user: &User) -> Result<Vec<PopulatedRole>, AppError> {
    let roles = state.access.roles_by_ids(&user.roles).await?;
    Ok(state.access.populate(roles).await?)
}

async fn user_dto(state: &AppState, user: &User) -> Result<UserDto, AppError> {
    let roles = roles_of(state, user).await?;
    Ok(UserDto::new(user, &roles))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !Password::new(req.old_password).matches(&current.user.password) {
        return Err(AppError::Unauthorized(anyhow::anyhow!("Old password is incorrect")));
    }

    let new_password = Password::new(req.new_password);
    if !new_password.meets_policy() {
        return Err(invalid("password", PASSWORD_POLICY_MESSAGE));
    }

    let hash = new_password.hash()?;
    if !state.users.update_password(current.id(), hash.as_str()).await? {
        return Err(AppError::NotFound(anyhow::anyhow!(USER_NOT_FOUND)));
    }

    tracing::info!(user_id = %current.id(), "Password changed");
    Ok(Json(json!({ "message": "Updated Successfully" })))
}

pub async fn remove_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = object_id(&user_id, USER_NOT_FOUND)?;
    let user = state
        .users
        .set_status(id, UserStatus::Disabled)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!(USER_NOT_FOUND)))?;

    tracing::info!(user_id = %id, "User disabled");
    Ok(Json(user_dto(&state, &user).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(status): Query<StatusQuery>,
) -> Result<impl IntoResponse, AppError> {
    let base = match status.status.as_deref() {
        None | Some("") | Some("All") => Document::new(),
        Some(s) => doc! { "status": s },
    };
    let filter = page.filter(base, USER_SEARCH);
    let (page_no, limit) = page.resolve(DEFAULT_LIMIT);
    let users = state.users.list(filter, page.skip(DEFAULT_LIMIT), limit).await?;

    // One role lookup for the whole page.
    let role_ids: Vec<ObjectId> = users
        .iter()
        .flat_map(|u| u.roles.iter().copied())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let roles = state.access.roles_by_ids(&role_ids).await?;
    let roles = state.access.populate(roles).await?;

    let response = users
        .iter()
        .map(|user| {
            let own: Vec<PopulatedRole> = roles
                .iter()
                .filter(|r| user.roles.contains(&r.role.id))
                .cloned()
                .collect();
            UserDto::new(user, &own)
        })
        .collect();

    Ok(Json(Paginated {
        response,
        page: page_no,
        limit,
    }))
}

/// True when `existing` belongs to someone other than `id`.
fn taken_by_other(existing: Option<User>, id: ObjectId) -> bool {
    existing.is_some_and(|user| user.id != id)
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = object_id(&user_id, USER_NOT_FOUND)?;

    let mut set = Document::new();
    if let Some(v) = req.first_name {
        set.insert("firstName", v);
    }
    if let Some(v) = req.fathers_name {
        set.insert("fathersName", v);
    }
    if let Some(v) = req.grand_fathers_name {
        set.insert("grandFathersName", v);
    }
    if let Some(v) = req.email {
        if taken_by_other(state.users.find_by_email(&v).await?, id) {
            return Err(AppError::Conflict(anyhow::anyhow!("Email Already Exists")));
        }
        set.insert("email", v);
    }
    if let Some(v) = req.phone_number {
        if taken_by_other(state.users.find_by_phone(&v).await?, id) {
            return Err(AppError::Conflict(anyhow::anyhow!("Phone Number Already Exists")));
        }
        set.insert("phone_number", v);
    }
    if let Some(v) = req.profile_pic {
        set.insert("profile_pic", v);
    }
    if let Some(v) = req.status {
        v.parse::<UserStatus>().map_err(|e| invalid("status", e))?;
        set.insert("status", v);
    }

    let user = state
        .users
        .update_fields(id, set)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!(USER_NOT_FOUND)))?;

    tracing::info!(user_id = %id, "User updated");
    Ok(Json(user_dto(&state, &user).await?))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = create_account(&state, req).await?;
    Ok((StatusCode::CREATED, Json(UserDto::new(&user, &[]))))
}

fn user_roles_body(user: &User, roles: &[PopulatedRole], message: Option<&str>) -> Response {
    let mut body = json!({
        "success": true,
        "data": {
            "user": UserDto::new(user, roles),
            "roles": roles.iter().map(RoleDto::from).collect::<Vec<_>>(),
        },
    });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    Json(body).into_response()
}

pub async fn get_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    let Ok(id) = ObjectId::parse_str(&user_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, USER_NOT_FOUND));
    };
    let Some(user) = state.users.find_by_id(id).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, USER_NOT_FOUND));
    };

    let roles = roles_of(&state, &user).await?;
    Ok(user_roles_body(&user, &roles, None))
}

pub async fn assign_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<RoleIdsRequest>,
) -> Result<Response, AppError> {
    if req.role_ids.is_empty() {
        return Ok(failure(StatusCode::BAD_REQUEST, "Role IDs array is required"));
    }
    let Ok(id) = ObjectId::parse_str(&user_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, USER_NOT_FOUND));
    };
    let role_ids = parse_object_ids(&req.role_ids)?;

    let Some(user) = state.users.add_roles(id, &role_ids).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, USER_NOT_FOUND));
    };

    tracing::info!(user_id = %id, count = role_ids.len(), "Roles assigned");
    let roles = roles_of(&state, &user).await?;
    Ok(user_roles_body(&user, &roles, Some("Roles assigned to user successfully")))
}

pub async fn remove_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<RoleIdsRequest>,
) -> Result<Response, AppError> {
    if req.role_ids.is_empty() {
        return Ok(failure(StatusCode::BAD_REQUEST, "Role IDs array is required"));
    }
    let Ok(id) = ObjectId::parse_str(&user_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, USER_NOT_FOUND));
    };
    let role_ids = parse_object_ids(&req.role_ids)?;

    let Some(user) = state.users.remove_roles(id, &role_ids).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, USER_NOT_FOUND));
    };

    tracing::info!(user_id = %id, count = role_ids.len(), "Roles removed");
    let roles = roles_of(&state, &user).await?;
    Ok(user_roles_body(&user, &roles, Some("Roles removed from user successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User::new(
            "Abebe".to_string(),
            "Kebede".to_string(),
            None,
            email.to_string(),
            "0911223344".to_string(),
            "hash".to_string(),
        )
    }

    #[test]
    fn only_other_users_block_a_contact_change() {
        let me = user("me@mail.com");
        assert!(!taken_by_other(None, me.id));
        assert!(!taken_by_other(Some(me.clone()), me.id));
        assert!(taken_by_other(Some(user("you@mail.com")), me.id));
    }
}
