use crate::models::{User, UserStatus, Verification};
use crate::services::database::MongoDb;
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};

#[derive(Clone)]
pub struct UserRepository {
    db: MongoDb,
}

fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

impl UserRepository {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    pub async fn create(&self, user: &User) -> Result<()> {
        self.db.users().insert_one(user, None).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(())
    }

    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>> {
        Ok(self.db.users().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.db.users().find_one(doc! { "email": email }, None).await?)
    }

    pub async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        Ok(self
            .db
            .users()
            .find_one(doc! { "phone_number": phone_number }, None)
            .await?)
    }

    pub async fn list(&self, filter: Document, skip: u64, limit: u64) -> Result<Vec<User>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();
        Ok(self.db.users().find(filter, options).await?.try_collect().await?)
    }

    pub async fn update_password(&self, id: ObjectId, password_hash: &str) -> Result<bool> {
        let result = self
            .db
            .users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "password": password_hash, "updatedAt": BsonDateTime::now() } },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    pub async fn set_status(&self, id: ObjectId, status: UserStatus) -> Result<Option<User>> {
        let status = mongodb::bson::to_bson(&status)?;
        self.update_fields(id, doc! { "status": status }).await
    }

    /// `$set` of the given fields; `updatedAt` is refreshed.
    pub async fn update_fields(&self, id: ObjectId, mut set: Document) -> Result<Option<User>> {
        set.insert("updatedAt", BsonDateTime::now());
        Ok(self
            .db
            .users()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_updated())
            .await?)
    }

    pub async fn add_roles(&self, id: ObjectId, role_ids: &[ObjectId]) -> Result<Option<User>> {
        Ok(self
            .db
            .users()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$addToSet": { "roles": { "$each": role_ids.to_vec() } },
                    "$set": { "updatedAt": BsonDateTime::now() },
                },
                return_updated(),
            )
            .await?)
    }

    pub async fn remove_roles(&self, id: ObjectId, role_ids: &[ObjectId]) -> Result<Option<User>> {
        Ok(self
            .db
            .users()
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$pull": { "roles": { "$in": role_ids.to_vec() } },
                    "$set": { "updatedAt": BsonDateTime::now() },
                },
                return_updated(),
            )
            .await?)
    }

    /// Stores a fresh code for `email`, replacing any earlier one.
    pub async fn upsert_verification(&self, email: &str, code: &str) -> Result<()> {
        let now = BsonDateTime::now();
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        self.db
            .verifications()
            .find_one_and_update(
                doc! { "email": email },
                doc! {
                    "$set": { "code": code, "used": false, "createdAt": now, "updatedAt": now },
                },
                options,
            )
            .await?;
        Ok(())
    }

    /// An unused code for `email` issued after `issued_after`.
    pub async fn find_valid_verification(
        &self,
        email: &str,
        code: &str,
        issued_after: DateTime<Utc>,
    ) -> Result<Option<Verification>> {
        Ok(self
            .db
            .verifications()
            .find_one(
                doc! {
                    "email": email,
                    "code": code,
                    "used": false,
                    "createdAt": { "$gt": BsonDateTime::from_chrono(issued_after) },
                },
                None,
            )
            .await?)
    }

    pub async fn mark_verification_used(&self, id: ObjectId) -> Result<()> {
        self.db
            .verifications()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "used": true, "updatedAt": BsonDateTime::now() } },
                None,
            )
            .await?;
        Ok(())
    }
}
