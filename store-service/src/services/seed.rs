//! Idempotent migration of the static catalogue into role and permission documents.

use crate::auth::{LegacyRole, PermissionCode};
use crate::models::{Permission, PermissionCategory, Role};
use crate::services::access::AccessRepository;
use anyhow::Result;
use mongodb::bson::{doc, oid::ObjectId};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub roles_updated: usize,
}

/// Category for a permission code; the first matching keyword wins.
pub fn category_for(code: &str) -> PermissionCategory {
    if code.contains("user") {
        PermissionCategory::User
    } else if code.contains("product") {
        PermissionCategory::Product
    } else if code.contains("content") {
        PermissionCategory::Content
    } else if code.contains("order") {
        PermissionCategory::Order
    } else if code.contains("analytics") {
        PermissionCategory::Analytics
    } else if code.contains("discount") || code.contains("promotion") {
        PermissionCategory::Marketing
    } else {
        PermissionCategory::System
    }
}

pub async fn migrate_roles_and_permissions(access: &AccessRepository) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    let mut ids: HashMap<String, ObjectId> = access
        .all_permissions()
        .await?
        .into_iter()
        .map(|p| (p.code, p.id))
        .collect();

    for permission in PermissionCode::ALL {
        let code = permission.code();
        if ids.contains_key(code) {
            continue;
        }
        let doc = Permission::new(
            permission.display_name(),
            permission.description(),
            code.to_string(),
            category_for(code),
        );
        access.create_permission(&doc).await?;
        ids.insert(code.to_string(), doc.id);
        summary.permissions_created += 1;
    }

    for role in LegacyRole::ALL {
        let permission_ids: Vec<ObjectId> = role
            .permissions()
            .iter()
            .filter_map(|p| ids.get(p.code()).copied())
            .collect();

        match access.find_role_by_name(role.key()).await? {
            Some(existing) => {
                access
                    .update_role(existing.id, doc! { "permissions": permission_ids })
                    .await?;
                summary.roles_updated += 1;
            }
            None => {
                let doc = Role::new(
                    role.key().to_string(),
                    format!("Role for {}", role.readable()),
                    permission_ids,
                );
                access.create_role(&doc).await?;
                summary.roles_created += 1;
            }
        }
    }

    tracing::info!(
        permissions_created = summary.permissions_created,
        roles_created = summary.roles_created,
        roles_updated = summary.roles_updated,
        "Role and permission migration complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_keyword_precedence() {
        assert_eq!(category_for("view:users"), PermissionCategory::User);
        assert_eq!(category_for("manage:product_images"), PermissionCategory::Product);
        assert_eq!(category_for("manage:media"), PermissionCategory::System);
        assert_eq!(category_for("view:order_analytics"), PermissionCategory::Order);
        assert_eq!(category_for("view:analytics"), PermissionCategory::Analytics);
        assert_eq!(category_for("update:discount"), PermissionCategory::Marketing);
        assert_eq!(category_for("manage:promotions"), PermissionCategory::Marketing);
        assert_eq!(category_for("view:customer_data"), PermissionCategory::System);
        assert_eq!(category_for("view:content"), PermissionCategory::Content);
    }

    #[test]
    fn every_catalogue_code_has_a_category() {
        for permission in PermissionCode::ALL {
            let category = category_for(permission.code());
            assert!(!category.as_str().is_empty());
        }
    }
}
