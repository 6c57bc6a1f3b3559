use crate::models::{AboutUs, ContactInfo, Content, ContentType, ImageAsset, ImageSize};
use crate::utils::validation::{check_len, invalid, is_valid_email};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDto {
    pub id: String,
    pub name: String,
    pub alt: Option<String>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Content> for ContentDto {
    fn from(content: &Content) -> Self {
        Self {
            id: content.id.to_hex(),
            name: content.name.clone(),
            alt: content.alt.clone(),
            content_type: content.content_type,
            content: content.content.clone(),
            created_at: content.created_at,
            updated_at: content.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageDto {
    pub id: String,
    pub name: String,
    pub size: ImageSize,
    pub filename: String,
    pub alt: Option<String>,
}

impl From<&ImageAsset> for ImageDto {
    fn from(image: &ImageAsset) -> Self {
        Self {
            id: image.id.to_hex(),
            name: image.name.clone(),
            size: image.size,
            filename: image.filename.clone(),
            alt: image.alt.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AboutDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub aboutus_photo: String,
    pub image_tag: String,
}

impl From<&AboutUs> for AboutDto {
    fn from(about: &AboutUs) -> Self {
        Self {
            id: about.id.to_hex(),
            name: about.name.clone(),
            description: about.description.clone(),
            aboutus_photo: about.aboutus_photo.clone(),
            image_tag: about.image_tag.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactDto {
    pub id: String,
    pub description: String,
    pub phone_number: String,
    pub email: String,
    pub location: String,
}

impl From<&ContactInfo> for ContactDto {
    fn from(contact: &ContactInfo) -> Self {
        Self {
            id: contact.id.to_hex(),
            description: contact.description.clone(),
            phone_number: contact.phone_number.clone(),
            email: contact.email.clone(),
            location: contact.location.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub alt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextContentRequest {
    #[serde(default)]
    pub content: String,
    pub alt: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AboutFields {
    pub name: String,
    pub description: String,
    pub image_tag: String,
}

impl AboutFields {
    pub fn check(&self) -> Result<(), AppError> {
        check_len("name", &self.name, 3, 25)?;
        check_len("description", &self.description, 20, 500)?;
        check_len("image_tag", &self.image_tag, 10, 30)
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub location: String,
}

impl ContactRequest {
    pub fn check(&self) -> Result<(), AppError> {
        check_len("description", &self.description, 10, 200)?;
        check_len("phone_number", &self.phone_number, 5, 20)?;
        if !is_valid_email(&self.email) {
            return Err(invalid("email", "is not a valid email"));
        }
        check_len("location", &self.location, 5, 20)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_rules() {
        let mut contact = ContactRequest {
            description: "Open every day".to_string(),
            phone_number: "+1 416 555".to_string(),
            email: "shop@mail.com".to_string(),
            location: "Toronto".to_string(),
        };
        assert!(contact.check().is_ok());

        contact.location = "TO".to_string();
        assert!(matches!(
            contact.check(),
            Err(AppError::InvalidField { ref field, .. }) if field == "location"
        ));
    }

    #[test]
    fn about_rules() {
        let about = AboutFields {
            name: "Our story".to_string(),
            description: "We grind spices every week.".to_string(),
            image_tag: "short".to_string(),
        };
        assert!(matches!(
            about.check(),
            Err(AppError::InvalidField { ref field, .. }) if field == "image_tag"
        ));
    }
}
