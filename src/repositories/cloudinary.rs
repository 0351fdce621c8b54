use anyhow::{anyhow, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::ImageHost;
use crate::models::images::{ImageFolder, Upload};
use crate::settings;

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

pub struct CloudinaryClient {
    url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
    client: reqwest::Client,
}

impl CloudinaryClient {
    pub fn new(settings: &settings::Cloudinary) -> Self {
        Self {
            url: settings.url.trim_end_matches('/').to_string(),
            cloud_name: settings.cloud_name.clone(),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            folder: settings.folder.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn folder_for(&self, folder: ImageFolder) -> String {
        format!("{}/{}", self.folder, folder.as_str())
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload_image(
        &self,
        folder: ImageFolder,
        upload: Upload,
    ) -> Result<String, anyhow::Error> {
        let folder = self.folder_for(folder);
        let public_id = Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("folder", folder.as_str()),
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.api_secret,
        );

        let file = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder)
            .text("public_id", public_id)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(format!(
                "{}/v1_1/{}/image/upload",
                self.url, self.cloud_name
            ))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Cloudinary: upload failed with {}: {}", status, body);
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Cloudinary: bad upload response: {}", e))?;

        Ok(uploaded.secure_url)
    }
}

/// Hex SHA-256 over the alphabetically sorted `key=value` pairs followed by the secret.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut params = params.to_vec();
    params.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
