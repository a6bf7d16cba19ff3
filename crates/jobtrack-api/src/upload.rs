use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::debug;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// A multipart body read fully into memory: text parts by name, file parts by name.
#[derive(Debug, Default, Clone)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read {name}: {e}")))?;
                    // Browsers send an empty part for an untouched file input.
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    debug!("Received file part {} ({}, {} bytes)", name, file_name, data.len());
                    form.files.insert(name, UploadedFile { file_name, data });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read {name}: {e}")))?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.files.insert(
            name.to_string(),
            UploadedFile {
                file_name: file_name.to_string(),
                data: Bytes::copy_from_slice(data),
            },
        );
        self
    }

    /// Raw value, or `""` when absent.
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn opt(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}
