//! Editable storefront copy: content blocks, image slots, about-us and contact details.

use crate::models::{AboutUs, ContactInfo, Content, ContentType, ImageAsset, ImageSize};
use crate::services::database::MongoDb;
use anyhow::{anyhow, Result};
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, DateTime as BsonDateTime};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

#[derive(Clone)]
pub struct SiteRepository {
    db: MongoDb,
}

fn upsert() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .upsert(true)
        .return_document(ReturnDocument::After)
        .build()
}

impl SiteRepository {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    pub async fn upsert_content(
        &self,
        name: &str,
        content: &str,
        alt: Option<&str>,
        content_type: ContentType,
    ) -> Result<Content> {
        let now = BsonDateTime::now();
        let mut set = doc! {
            "content": content,
            "type": to_bson(&content_type)?,
            "updatedAt": now,
        };
        if let Some(alt) = alt {
            set.insert("alt", alt);
        }

        self.db
            .contents()
            .find_one_and_update(
                doc! { "name": name },
                doc! { "$set": set, "$setOnInsert": { "createdAt": now } },
                upsert(),
            )
            .await?
            .ok_or_else(|| anyhow!("Content upsert returned no document"))
    }

    pub async fn find_content(&self, name: &str) -> Result<Option<Content>> {
        Ok(self.db.contents().find_one(doc! { "name": name }, None).await?)
    }

    pub async fn upsert_image(
        &self,
        name: &str,
        size: ImageSize,
        filename: &str,
        alt: Option<&str>,
    ) -> Result<ImageAsset> {
        let mut set = doc! { "size": size.as_str(), "filename": filename };
        if let Some(alt) = alt {
            set.insert("alt", alt);
        }

        self.db
            .images()
            .find_one_and_update(doc! { "name": name }, doc! { "$set": set }, upsert())
            .await?
            .ok_or_else(|| anyhow!("Image upsert returned no document"))
    }

    pub async fn find_image(&self, name: &str) -> Result<Option<ImageAsset>> {
        Ok(self.db.images().find_one(doc! { "name": name }, None).await?)
    }

    pub async fn upsert_about(
        &self,
        name: &str,
        description: &str,
        photo: &str,
        image_tag: &str,
    ) -> Result<AboutUs> {
        self.db
            .about()
            .find_one_and_update(
                doc! { "name": name },
                doc! {
                    "$set": {
                        "description": description,
                        "aboutus_photo": photo,
                        "image_tag": image_tag,
                    }
                },
                upsert(),
            )
            .await?
            .ok_or_else(|| anyhow!("About-us upsert returned no document"))
    }

    pub async fn list_about(&self) -> Result<Vec<AboutUs>> {
        Ok(self.db.about().find(doc! {}, None).await?.try_collect().await?)
    }

    /// The contact record is a singleton; the first document is replaced in place.
    pub async fn upsert_contact(
        &self,
        description: &str,
        phone_number: &str,
        email: &str,
        location: &str,
    ) -> Result<ContactInfo> {
        self.db
            .contact_info()
            .find_one_and_update(
                doc! {},
                doc! {
                    "$set": {
                        "description": description,
                        "phone_number": phone_number,
                        "email": email,
                        "location": location,
                    }
                },
                upsert(),
            )
            .await?
            .ok_or_else(|| anyhow!("Contact upsert returned no document"))
    }

    pub async fn find_contact(&self) -> Result<Option<ContactInfo>> {
        Ok(self.db.contact_info().find_one(doc! {}, None).await?)
    }
}
