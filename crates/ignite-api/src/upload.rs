//! Avatar uploads

use reqwest::multipart::{Form, Part};

use crate::error::ApiError;
use crate::gateway::RequestBody;
use crate::Result;

/// Largest avatar image the server accepts.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Multipart form field the server reads the image from.
const AVATAR_FIELD: &str = "avatar";

/// An image picked by the user, checked locally before upload.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl AvatarUpload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ApiError::Validation("The selected image is empty".to_string()));
        }

        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::Validation(
                "The image is too large to be saved (max 5MB)".to_string(),
            ));
        }

        Ok(Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Image size in bytes, never zero.
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_body(self) -> Result<RequestBody> {
        let part = Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime_type)
            .map_err(|e| ApiError::Validation(format!("invalid image type: {e}")))?;

        Ok(RequestBody::Multipart(Form::new().part(AVATAR_FIELD, part)))
    }
}
