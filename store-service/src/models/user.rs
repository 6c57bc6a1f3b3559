use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    #[default]
    Active,
    Pending,
    Disabled,
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(UserStatus::Active),
            "PENDING" => Ok(UserStatus::Pending),
            "DISABLED" => Ok(UserStatus::Disabled),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub first_name: String,
    pub fathers_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grand_fathers_name: Option<String>,
    pub email: String,
    #[serde(rename = "phone_number")]
    pub phone_number: String,
    /// Argon2 PHC string.
    pub password: String,
    #[serde(default)]
    pub roles: Vec<ObjectId>,
    /// Single legacy role name, predates document roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub legacy_roles: Vec<String>,
    #[serde(default)]
    pub legacy_permissions: Vec<String>,
    #[serde(rename = "profile_pic", default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        first_name: String,
        fathers_name: String,
        grand_fathers_name: Option<String>,
        email: String,
        phone_number: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            first_name,
            fathers_name,
            grand_fathers_name,
            email,
            phone_number,
            password: password_hash,
            roles: Vec::new(),
            role: None,
            legacy_roles: Vec::new(),
            legacy_permissions: Vec::new(),
            profile_pic: None,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
