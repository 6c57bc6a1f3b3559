use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl UpdateRoleRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionIdsRequest {
    #[serde(default)]
    pub permission_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleIdsRequest {
    #[serde(default)]
    pub role_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePermissionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}
