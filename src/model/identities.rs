use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{domain::identity::IdentityMatch, tools::{alignment::{AlignmentError, Point, KEYPOINTS_COUNT}, image_tools::{align_face, decode_image}, log::{log_info, LogServiceType}}};

use super::{error::{Error, Result}, matcher::IdentityMatcher, ModelController};


#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IdentityForAdd {
    pub image: Option<String>,
    #[serde(default)]
    pub keypoints: Vec<Point>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IdentityForRecognition {
    pub image: Option<String>,
    #[serde(default)]
    pub keypoints: Vec<Point>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IdentityForUpdate {
    #[serde(rename = "newName", default)]
    pub new_name: String,
}

fn check_face_request(image: Option<String>, keypoints: &[Point]) -> Result<String> {
    let Some(image) = image.filter(|i| !i.trim().is_empty()) else {
        return Err(Error::MissingImage);
    };
    if keypoints.len() < KEYPOINTS_COUNT {
        return Err(AlignmentError::InsufficientKeypoints(keypoints.len()).into());
    }
    Ok(image)
}

fn check_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName);
    }
    Ok(name.to_string())
}

impl ModelController {

    pub async fn get_identity_names(&self) -> Result<Vec<String>> {
        Ok(self.store.list_names().await)
    }

    /// Decode, align and embed off the async workers.
    async fn embed_face(&self, image: String, keypoints: Vec<Point>) -> Result<Vec<f32>> {
        let face = tokio::task::spawn_blocking(move || -> Result<RgbImage> {
            let decoded = decode_image(&image)?;
            Ok(align_face(&decoded, &keypoints)?)
        }).await??;
        Ok(self.embedder.embed(face).await?)
    }

    pub async fn add_identity(&self, identity: IdentityForAdd) -> Result<()> {
        let image = check_face_request(identity.image, &identity.keypoints)?;
        let name = check_name(&identity.name)?;
        let embedding = self.embed_face(image, identity.keypoints).await?;
        self.store.add(&name, embedding).await?;
        Ok(())
    }

    pub async fn recognize_identity(&self, request: IdentityForRecognition) -> Result<Option<IdentityMatch>> {
        let image = check_face_request(request.image, &request.keypoints)?;
        let embedding = self.embed_face(image, request.keypoints).await?;
        let found = IdentityMatcher::match_best(&self.store, &embedding, self.threshold).await?;
        match &found {
            Some(m) => log_info(LogServiceType::Recognition, format!("Recognized {} ({:.4})", m.name, m.distance)),
            None => log_info(LogServiceType::Recognition, "No identity within threshold".to_string()),
        }
        Ok(found)
    }

    pub async fn rename_identity(&self, name: &str, update: IdentityForUpdate) -> Result<()> {
        let new_name = check_name(&update.new_name)?;
        self.store.rename(name.trim(), &new_name).await
    }

    pub async fn remove_identity(&self, name: &str) -> Result<()> {
        self.store.delete(name.trim()).await
    }
}
