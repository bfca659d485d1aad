//! Multipart form reading shared by the upload handlers

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use crate::error::AppError;
use crate::storage::ImageUpload;

/// Text fields and files of one multipart form
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    /// File bytes, or the reason the file was refused
    files: HashMap<String, Result<Vec<u8>, String>>,
}

impl UploadForm {
    /// Read every part, capping each file at `max_file_bytes`
    ///
    /// A file part with no content counts as not sent. When the request
    /// body limit trips, reading stops and the file being read is refused
    /// as too large, so the caller still reports field errors.
    pub async fn read(mut multipart: Multipart, max_file_bytes: usize) -> Result<Self, AppError> {
        let mut form = Self::default();
        // File that was cut short or refused, if any
        let mut last_file: Option<String> = None;

        loop {
            let mut field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(error) if is_body_limit(&error) => {
                    return form.truncated(last_file, max_file_bytes);
                }
                Err(error) => return Err(error.into()),
            };
            let Some(name) = field.name().map(ToOwned::to_owned) else {
                continue;
            };

            if field.file_name().is_none() {
                match field.text().await {
                    Ok(text) => {
                        form.fields.insert(name, text);
                    }
                    Err(error) if is_body_limit(&error) => {
                        return form.truncated(last_file, max_file_bytes);
                    }
                    Err(error) => return Err(error.into()),
                }
                continue;
            }

            last_file = Some(name.clone());
            let mut bytes = Vec::new();
            let mut too_large = false;
            loop {
                let chunk = match field.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(error) if is_body_limit(&error) => {
                        return form.truncated(last_file, max_file_bytes);
                    }
                    Err(error) => return Err(error.into()),
                };
                if bytes.len() + chunk.len() > max_file_bytes {
                    too_large = true;
                    break;
                }
                bytes.extend_from_slice(&chunk);
            }

            if too_large {
                form.refuse_too_large(name, max_file_bytes);
            } else {
                last_file = None;
                if !bytes.is_empty() {
                    form.files.insert(name, Ok(bytes));
                }
            }
        }

        Ok(form)
    }

    fn refuse_too_large(&mut self, name: String, max_file_bytes: usize) {
        tracing::debug!(field = %name, max_file_bytes, "Upload over size limit");
        self.files.insert(
            name,
            Err(format!("Ensure this file is at most {} bytes.", max_file_bytes)),
        );
    }

    /// Finish a form whose body was cut off by the request size limit
    fn truncated(
        mut self,
        last_file: Option<String>,
        max_file_bytes: usize,
    ) -> Result<Self, AppError> {
        match last_file {
            Some(name) => {
                self.refuse_too_large(name, max_file_bytes);
                Ok(self)
            }
            None => Err(AppError::Validation("Request body too large".to_string())),
        }
    }

    /// Text value of a field, empty when absent
    pub fn text(&mut self, name: &str) -> String {
        self.fields.remove(name).unwrap_or_default()
    }

    /// Check an uploaded file as an image
    ///
    /// `None` when no file was sent under `name`.
    pub async fn image(
        &mut self,
        name: &str,
    ) -> Result<Option<Result<ImageUpload, String>>, AppError> {
        match self.files.remove(name) {
            None => Ok(None),
            Some(Err(message)) => Ok(Some(Err(message))),
            Some(Ok(bytes)) => Ok(Some(ImageUpload::check(bytes).await?)),
        }
    }
}

fn is_body_limit(error: &MultipartError) -> bool {
    error.status() == StatusCode::PAYLOAD_TOO_LARGE
}
