use crate::models::{Permission, PermissionCategory, RecordStatus, User, UserStatus};
use crate::services::access::PopulatedRole;
use crate::utils::validation::{is_alpha_name, is_valid_email, is_valid_phone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDto {
    pub id: String,
    pub name: String,
    pub code: String,
    pub description: String,
    pub category: PermissionCategory,
    pub status: RecordStatus,
}

impl From<&Permission> for PermissionDto {
    fn from(permission: &Permission) -> Self {
        Self {
            id: permission.id.to_hex(),
            name: permission.name.clone(),
            code: permission.code.clone(),
            description: permission.description.clone(),
            category: permission.category,
            status: permission.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionDto>,
    pub status: RecordStatus,
}

impl From<&PopulatedRole> for RoleDto {
    fn from(populated: &PopulatedRole) -> Self {
        Self {
            id: populated.role.id.to_hex(),
            name: populated.role.name.clone(),
            description: populated.role.description.clone(),
            permissions: populated.permissions.iter().map(PermissionDto::from).collect(),
            status: populated.role.status,
        }
    }
}

/// Public view of a user. The password hash never leaves the service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub first_name: String,
    pub fathers_name: String,
    pub grand_fathers_name: Option<String>,
    pub email: String,
    pub roles: Vec<RoleDto>,
    #[serde(rename = "phone_number")]
    pub phone_number: String,
    #[serde(rename = "profile_pic")]
    pub profile_pic: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDto {
    pub fn new(user: &User, roles: &[PopulatedRole]) -> Self {
        Self {
            id: user.id.to_hex(),
            first_name: user.first_name.clone(),
            fathers_name: user.fathers_name.clone(),
            grand_fathers_name: user.grand_fathers_name.clone(),
            email: user.email.clone(),
            roles: roles.iter().map(RoleDto::from).collect(),
            phone_number: user.phone_number.clone(),
            profile_pic: user.profile_pic.clone(),
            status: user.status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(flatten)]
    pub user: UserDto,
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn alpha_name(value: &str) -> Result<(), ValidationError> {
    if is_alpha_name(value) {
        Ok(())
    } else {
        Err(rule("alpha_name", "must not contain numbers or symbols"))
    }
}

fn email_format(value: &str) -> Result<(), ValidationError> {
    if is_valid_email(value) {
        Ok(())
    } else {
        Err(rule("email", "is not a valid email"))
    }
}

fn phone_format(value: &str) -> Result<(), ValidationError> {
    if is_valid_phone(value) {
        Ok(())
    } else {
        Err(rule("phone_number", "is not a valid phone number"))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Account fields shared by self-registration and admin creation.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 25, message = "must be between 3 and 25 characters"),
        custom(function = "alpha_name")
    )]
    pub first_name: String,
    #[validate(
        length(min = 3, max = 25, message = "must be between 3 and 25 characters"),
        custom(function = "alpha_name")
    )]
    pub fathers_name: String,
    #[validate(custom(function = "alpha_name"))]
    pub grand_fathers_name: Option<String>,
    #[validate(custom(function = "email_format"))]
    pub email: String,
    #[serde(rename = "phone_number")]
    #[validate(custom(function = "phone_format"))]
    pub phone_number: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn into_user(self, password_hash: String) -> User {
        User::new(
            self.first_name,
            self.fathers_name,
            self.grand_fathers_name.filter(|n| !n.is_empty()),
            self.email,
            self.phone_number,
            password_hash,
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 3, max = 25, message = "must be between 3 and 25 characters"),
        custom(function = "alpha_name")
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 3, max = 25, message = "must be between 3 and 25 characters"),
        custom(function = "alpha_name")
    )]
    pub fathers_name: Option<String>,
    #[validate(custom(function = "alpha_name"))]
    pub grand_fathers_name: Option<String>,
    #[validate(custom(function = "email_format"))]
    pub email: Option<String>,
    #[serde(rename = "phone_number")]
    #[validate(custom(function = "phone_format"))]
    pub phone_number: Option<String>,
    #[serde(rename = "profile_pic")]
    pub profile_pic: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SendVerificationRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(first: &str, email: &str, phone: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: first.to_string(),
            fathers_name: "Kebede".to_string(),
            grand_fathers_name: None,
            email: email.to_string(),
            phone_number: phone.to_string(),
            password: "Abcde1!".to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(register("Abebe", "abebe@mail.com", "0912345678").validate().is_ok());
    }

    #[test]
    fn registration_rules_name_the_failing_field() {
        let errors = register("Ab", "abebe@mail.com", "0912345678").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("first_name"));

        let errors = register("Abebe", "abebe@mail", "0912345678").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let errors = register("Abebe", "abebe@mail.com", "12345").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone_number"));
    }

    #[test]
    fn user_dto_uses_wire_names_and_hides_password() {
        let user = User::new(
            "Abebe".to_string(),
            "Kebede".to_string(),
            None,
            "abebe@mail.com".to_string(),
            "0912345678".to_string(),
            "$argon2id$secret".to_string(),
        );
        let json = serde_json::to_value(UserDto::new(&user, &[])).unwrap();
        assert_eq!(json["firstName"], "Abebe");
        assert_eq!(json["phone_number"], "0912345678");
        assert!(json.get("password").is_none());
        assert_eq!(json["roles"].as_array().unwrap().len(), 0);
    }
}
