use crate::dtos::access::{
    CreatePermissionRequest, CreateRoleRequest, PermissionIdsRequest, UpdatePermissionRequest,
    UpdateRoleRequest,
};
use crate::dtos::user::{PermissionDto, RoleDto};
use crate::handlers::{failure, parse_object_ids};
use crate::models::{Permission, PermissionCategory, RecordStatus, Role};
use crate::services::access::PopulatedRole;
use crate::startup::AppState;
use crate::utils::pagination::{PageQuery, SearchFields, DEFAULT_LIMIT};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::{oid::ObjectId, Document};
use serde_json::json;
use service_core::error::AppError;

const ROLE_SEARCH: SearchFields = SearchFields {
    text: &["name", "description"],
    numeric: &[],
};

const PERMISSION_SEARCH: SearchFields = SearchFields {
    text: &["name", "code", "description", "category"],
    numeric: &[],
};

const ROLE_NOT_FOUND: &str = "Role not found";
const PERMISSION_NOT_FOUND: &str = "Permission not found";

fn ok_data(data: impl serde::Serialize, message: Option<&str>) -> Response {
    let mut body = json!({ "success": true, "data": data });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    Json(body).into_response()
}

async fn populated(state: &AppState, role: Role) -> Result<PopulatedRole, AppError> {
    let mut roles = state.access.populate(vec![role]).await?;
    roles
        .pop()
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Role population returned nothing")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Roles

pub async fn list_roles(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page_no, limit) = page.resolve(DEFAULT_LIMIT);
    let filter = page.filter(Document::new(), ROLE_SEARCH);
    let roles = state.access.list_roles(filter, page.skip(DEFAULT_LIMIT), limit).await?;
    let roles = state.access.populate(roles).await?;

    Ok(Json(json!({
        "success": true,
        "response": roles.iter().map(RoleDto::from).collect::<Vec<_>>(),
        "page": page_no,
        "limit": limit,
    })))
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<Response, AppError> {
    let Ok(id) = ObjectId::parse_str(&role_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };
    let Some(role) = state.access.find_role(id).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };

    let role = populated(&state, role).await?;
    Ok(ok_data(RoleDto::from(&role), None))
}

pub async fn create_role(
    State(state): State<AppState>,
    Json(req): Json<CreateRoleRequest>,
) -> Result<Response, AppError> {
    let (Some(name), Some(description)) = (non_blank(req.name), non_blank(req.description)) else {
        return Ok(failure(StatusCode::BAD_REQUEST, "Name and description are required"));
    };

    if state.access.find_role_by_name(&name).await?.is_some() {
        return Ok(failure(StatusCode::CONFLICT, "Role with this name already exists"));
    }

    let permissions = parse_object_ids(&req.permissions)?;
    let role = Role::new(name, description, permissions);
    state.access.create_role(&role).await?;

    tracing::info!(role_id = %role.id, name = %role.name, "Role created");
    let role = populated(&state, role).await?;
    let mut response = ok_data(RoleDto::from(&role), Some("Role created successfully"));
    *response.status_mut() = StatusCode::CREATED;
    Ok(response)
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Response, AppError> {
    if req.is_empty() {
        return Ok(failure(
            StatusCode::BAD_REQUEST,
            "At least one field (name, description, or status) is required for update",
        ));
    }

    let mut set = Document::new();
    if let Some(name) = non_blank(req.name) {
        set.insert("name", name);
    }
    if let Some(description) = non_blank(req.description) {
        set.insert("description", description);
    }
    if let Some(status) = req.status {
        if status.parse::<RecordStatus>().is_err() {
            return Ok(failure(StatusCode::BAD_REQUEST, "Invalid status value"));
        }
        set.insert("status", status);
    }

    let Ok(id) = ObjectId::parse_str(&role_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };
    let Some(role) = state.access.update_role(id, set).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };

    tracing::info!(role_id = %id, "Role updated");
    let role = populated(&state, role).await?;
    Ok(ok_data(RoleDto::from(&role), Some("Role updated successfully")))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<Response, AppError> {
    let Ok(id) = ObjectId::parse_str(&role_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };
    let mut set = Document::new();
    set.insert("status", "DISABLED");
    if state.access.update_role(id, set).await?.is_none() {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    }

    tracing::info!(role_id = %id, "Role disabled");
    Ok(Json(json!({ "success": true, "message": "Role deleted successfully" })).into_response())
}

pub async fn add_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(req): Json<PermissionIdsRequest>,
) -> Result<Response, AppError> {
    if req.permission_ids.is_empty() {
        return Ok(failure(StatusCode::BAD_REQUEST, "Permission IDs array is required"));
    }
    let Ok(id) = ObjectId::parse_str(&role_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };
    let permission_ids = parse_object_ids(&req.permission_ids)?;

    let Some(role) = state.access.add_role_permissions(id, &permission_ids).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };

    let role = populated(&state, role).await?;
    Ok(ok_data(RoleDto::from(&role), Some("Permissions added to role successfully")))
}

pub async fn remove_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(req): Json<PermissionIdsRequest>,
) -> Result<Response, AppError> {
    if req.permission_ids.is_empty() {
        return Ok(failure(StatusCode::BAD_REQUEST, "Permission IDs array is required"));
    }
    let Ok(id) = ObjectId::parse_str(&role_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };
    let permission_ids = parse_object_ids(&req.permission_ids)?;

    let Some(role) = state.access.remove_role_permissions(id, &permission_ids).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, ROLE_NOT_FOUND));
    };

    let role = populated(&state, role).await?;
    Ok(ok_data(RoleDto::from(&role), Some("Permissions removed from role successfully")))
}

// Permissions

pub async fn list_permissions(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page_no, limit) = page.resolve(DEFAULT_LIMIT);
    let filter = page.filter(Document::new(), PERMISSION_SEARCH);
    let permissions = state
        .access
        .list_permissions(filter, page.skip(DEFAULT_LIMIT), limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "response": permissions.iter().map(PermissionDto::from).collect::<Vec<_>>(),
        "page": page_no,
        "limit": limit,
    })))
}

pub async fn permissions_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Response, AppError> {
    let Ok(category) = category.parse::<PermissionCategory>() else {
        return Ok(failure(StatusCode::BAD_REQUEST, "Invalid permission category"));
    };

    let permissions = state.access.permissions_by_category(category).await?;
    Ok(ok_data(
        permissions.iter().map(PermissionDto::from).collect::<Vec<_>>(),
        None,
    ))
}

pub async fn get_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<String>,
) -> Result<Response, AppError> {
    let Ok(id) = ObjectId::parse_str(&permission_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, PERMISSION_NOT_FOUND));
    };
    let Some(permission) = state.access.find_permission(id).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, PERMISSION_NOT_FOUND));
    };

    Ok(ok_data(PermissionDto::from(&permission), None))
}

pub async fn create_permission(
    State(state): State<AppState>,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<Response, AppError> {
    let (Some(name), Some(description), Some(code), Some(category)) = (
        non_blank(req.name),
        non_blank(req.description),
        non_blank(req.code),
        non_blank(req.category),
    ) else {
        return Ok(failure(
            StatusCode::BAD_REQUEST,
            "Name, description, code, and category are required",
        ));
    };

    let Ok(category) = category.parse::<PermissionCategory>() else {
        return Ok(failure(StatusCode::BAD_REQUEST, "Invalid permission category"));
    };

    if state.access.find_permission_by_code(&code).await?.is_some() {
        return Ok(failure(StatusCode::BAD_REQUEST, "Permission code already exists"));
    }

    let permission = Permission::new(name, description, code, category);
    state.access.create_permission(&permission).await?;

    tracing::info!(permission_id = %permission.id, code = %permission.code, "Permission created");
    let mut response = ok_data(
        PermissionDto::from(&permission),
        Some("Permission created successfully"),
    );
    *response.status_mut() = StatusCode::CREATED;
    Ok(response)
}

pub async fn update_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<String>,
    Json(req): Json<UpdatePermissionRequest>,
) -> Result<Response, AppError> {
    let name = non_blank(req.name);
    let description = non_blank(req.description);
    let category = non_blank(req.category);
    let status = non_blank(req.status);
    if name.is_none() && description.is_none() && category.is_none() && status.is_none() {
        return Ok(failure(
            StatusCode::BAD_REQUEST,
            "At least one field (name, description, category, or status) is required for update",
        ));
    }

    let mut set = Document::new();
    if let Some(name) = name {
        set.insert("name", name);
    }
    if let Some(description) = description {
        set.insert("description", description);
    }
    if let Some(category) = category {
        let Ok(parsed) = category.parse::<PermissionCategory>() else {
            return Ok(failure(StatusCode::BAD_REQUEST, "Invalid permission category"));
        };
        set.insert("category", parsed.as_str());
    }
    if let Some(status) = status {
        if status.parse::<RecordStatus>().is_err() {
            return Ok(failure(StatusCode::BAD_REQUEST, "Invalid status value"));
        }
        set.insert("status", status);
    }

    let Ok(id) = ObjectId::parse_str(&permission_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, PERMISSION_NOT_FOUND));
    };
    let Some(permission) = state.access.update_permission(id, set).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, PERMISSION_NOT_FOUND));
    };

    Ok(ok_data(
        PermissionDto::from(&permission),
        Some("Permission updated successfully"),
    ))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<String>,
) -> Result<Response, AppError> {
    let Ok(id) = ObjectId::parse_str(&permission_id) else {
        return Ok(failure(StatusCode::NOT_FOUND, PERMISSION_NOT_FOUND));
    };
    if state.access.disable_permission(id).await?.is_none() {
        return Ok(failure(StatusCode::NOT_FOUND, PERMISSION_NOT_FOUND));
    }

    tracing::info!(permission_id = %id, "Permission disabled");
    Ok(Json(json!({ "success": true, "message": "Permission deleted successfully" })).into_response())
}
