//! Multipart form extraction for post and timeline entry uploads

use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use media::{StorageError, Upload};
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};

/// Text fields and files of a multipart request
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<(String, Upload)>,
}

#[async_trait]
impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Self::read(multipart).await
    }
}

impl UploadForm {
    /// Drain the multipart stream. File inputs left empty by the browser
    /// (no name, no bytes) are skipped.
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files
                        .push((name, Upload::new(file_name, content_type, bytes.to_vec())));
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// `identityKey`, or the legacy `clerkId` field.
    pub fn identity_key(&mut self) -> ApiResult<String> {
        self.text("identityKey")
            .or_else(|| self.text("clerkId"))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ApiError::Validation("identityKey is required".to_string()))
    }

    /// Take the files sent under any of `accepted`. Files under any other
    /// field name are rejected.
    pub fn files(&mut self, accepted: &[&str]) -> ApiResult<Vec<Upload>> {
        if let Some((name, _)) = self
            .files
            .iter()
            .find(|(name, _)| !accepted.contains(&name.as_str()))
        {
            return Err(ApiError::Validation(format!("Unexpected file field: {}", name)));
        }

        Ok(self.files.drain(..).map(|(_, upload)| upload).collect())
    }

    /// At most one file under `name`.
    pub fn single_file(&mut self, name: &str) -> ApiResult<Option<Upload>> {
        let mut files = self.files(&[name])?;
        if files.len() > 1 {
            return Err(StorageError::TooManyFiles {
                count: files.len(),
                max: 1,
            }
            .into());
        }
        Ok(files.pop())
    }
}
