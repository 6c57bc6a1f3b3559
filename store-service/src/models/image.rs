use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    Sm,
    Md,
    Lg,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Sm => "sm",
            ImageSize::Md => "md",
            ImageSize::Lg => "lg",
        }
    }

    /// Target box in pixels; `None` keeps the upload's dimensions.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            ImageSize::Sm => Some((341, 257)),
            ImageSize::Md => None,
            ImageSize::Lg => Some((800, 800)),
        }
    }
}

impl std::str::FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sm" => Ok(ImageSize::Sm),
            "md" => Ok(ImageSize::Md),
            "lg" => Ok(ImageSize::Lg),
            _ => Err(format!("Invalid image size: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// `{name}_{size}`
    pub name: String,
    pub size: ImageSize,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}
