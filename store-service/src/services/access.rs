//! Role and permission documents.

use crate::models::{Permission, PermissionCategory, RecordStatus, Role};
use crate::services::database::MongoDb;
use anyhow::Result;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use std::collections::HashMap;

#[derive(Clone)]
pub struct AccessRepository {
    db: MongoDb,
}

/// A role with its permission documents resolved.
#[derive(Debug, Clone)]
pub struct PopulatedRole {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn page(skip: u64, limit: u64) -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .skip(skip)
        .limit(limit as i64)
        .build()
}

impl AccessRepository {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    // Roles

    pub async fn list_roles(&self, filter: Document, skip: u64, limit: u64) -> Result<Vec<Role>> {
        Ok(self
            .db
            .roles()
            .find(filter, page(skip, limit))
            .await?
            .try_collect()
            .await?)
    }

    pub async fn find_role(&self, id: ObjectId) -> Result<Option<Role>> {
        Ok(self.db.roles().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.db.roles().find_one(doc! { "name": name }, None).await?)
    }

    pub async fn roles_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<Role>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .db
            .roles()
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?
            .try_collect()
            .await?)
    }

    pub async fn create_role(&self, role: &Role) -> Result<()> {
        self.db.roles().insert_one(role, None).await?;
        tracing::info!(role = %role.name, "Role created");
        Ok(())
    }

    pub async fn update_role(&self, id: ObjectId, mut set: Document) -> Result<Option<Role>> {
        set.insert("updatedAt", BsonDateTime::now());
        Ok(self
            .db
            .roles()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_updated())
            .await?)
    }

    pub async fn add_role_permissions(&self, id: ObjectId, permission_ids: &[ObjectId]) -> Result<Option<Role>> {
        Ok(self
            .db
            .roles()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$addToSet": { "permissions": { "$each": permission_ids.to_vec() } },
                    "$set": { "updatedAt": BsonDateTime::now() },
                },
                return_updated(),
            )
            .await?)
    }

    pub async fn remove_role_permissions(&self, id: ObjectId, permission_ids: &[ObjectId]) -> Result<Option<Role>> {
        Ok(self
            .db
            .roles()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$pull": { "permissions": { "$in": permission_ids.to_vec() } },
                    "$set": { "updatedAt": BsonDateTime::now() },
                },
                return_updated(),
            )
            .await?)
    }

    /// Resolves each role's permission ids in one query.
    pub async fn populate(&self, roles: Vec<Role>) -> Result<Vec<PopulatedRole>> {
        let ids: Vec<ObjectId> = roles.iter().flat_map(|r| r.permissions.iter().copied()).collect();
        let by_id: HashMap<ObjectId, Permission> = self
            .permissions_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(roles
            .into_iter()
            .map(|role| {
                let permissions = role
                    .permissions
                    .iter()
                    .filter_map(|id| by_id.get(id).cloned())
                    .collect();
                PopulatedRole { role, permissions }
            })
            .collect())
    }

    /// Whether any ACTIVE role among `role_ids` grants `permission_id`.
    pub async fn active_role_grants(&self, role_ids: &[ObjectId], permission_id: ObjectId) -> Result<bool> {
        if role_ids.is_empty() {
            return Ok(false);
        }
        let count = self
            .db
            .roles()
            .count_documents(
                doc! {
                    "_id": { "$in": role_ids.to_vec() },
                    "status": "ACTIVE",
                    "permissions": permission_id,
                },
                None,
            )
            .await?;
        Ok(count > 0)
    }

    // Permissions

    pub async fn list_permissions(&self, filter: Document, skip: u64, limit: u64) -> Result<Vec<Permission>> {
        Ok(self
            .db
            .permissions()
            .find(filter, page(skip, limit))
            .await?
            .try_collect()
            .await?)
    }

    pub async fn permissions_by_category(&self, category: PermissionCategory) -> Result<Vec<Permission>> {
        let options = FindOptions::builder().sort(doc! { "code": 1 }).build();
        Ok(self
            .db
            .permissions()
            .find(doc! { "category": category.as_str(), "status": "ACTIVE" }, options)
            .await?
            .try_collect()
            .await?)
    }

    pub async fn permissions_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .db
            .permissions()
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?
            .try_collect()
            .await?)
    }

    pub async fn all_permissions(&self) -> Result<Vec<Permission>> {
        Ok(self.db.permissions().find(doc! {}, None).await?.try_collect().await?)
    }

    pub async fn find_permission(&self, id: ObjectId) -> Result<Option<Permission>> {
        Ok(self.db.permissions().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>> {
        Ok(self.db.permissions().find_one(doc! { "code": code }, None).await?)
    }

    pub async fn create_permission(&self, permission: &Permission) -> Result<()> {
        self.db.permissions().insert_one(permission, None).await?;
        tracing::info!(code = %permission.code, "Permission created");
        Ok(())
    }

    pub async fn update_permission(&self, id: ObjectId, mut set: Document) -> Result<Option<Permission>> {
        set.insert("updatedAt", BsonDateTime::now());
        Ok(self
            .db
            .permissions()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_updated())
            .await?)
    }

    pub async fn disable_permission(&self, id: ObjectId) -> Result<Option<Permission>> {
        let status = mongodb::bson::to_bson(&RecordStatus::Disabled)?;
        self.update_permission(id, doc! { "status": status }).await
    }
}
