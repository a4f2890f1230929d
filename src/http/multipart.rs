use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use std::collections::HashMap;

use crate::app::validation::{RawProfile, RawReport, UploadedImage};
use crate::http::AppError;

/// Text fields and at most one file from a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    file: Option<UploadedImage>,
}

impl FormData {
    /// Reads the whole body. Only `file_field` may carry a file; a file part
    /// with no name and no content (an untouched file input) counts as absent.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == file_field {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                let untouched = bytes.is_empty() && filename.as_deref().unwrap_or("").is_empty();
                if !untouched {
                    form.file = Some(UploadedImage {
                        bytes,
                        content_type,
                        filename,
                    });
                }
                continue;
            }

            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }

        Ok(form)
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn into_report(mut self) -> RawReport {
        RawReport {
            item_name: self.take("item_name"),
            color: self.take("color"),
            item_type: self.take("item_type"),
            brand: self.take("brand"),
            description: self.take("description"),
            distinctive_features: self.take("distinctive_features"),
            location: self.take("location"),
            contact_name: self.take("contact_name"),
            contact_email: self.take("contact_email"),
            contact_phone: self.take("contact_phone"),
            image: self.file,
        }
    }

    pub fn into_profile(mut self) -> RawProfile {
        RawProfile {
            first_name: self.take("first_name"),
            last_name: self.take("last_name"),
            email: self.take("email"),
            phone_number: self.take("phone_number"),
            gender: self.take("gender"),
            profile_image: self.file,
        }
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::payload_too_large("request body is too large");
    }
    AppError::bad_request(format!("invalid multipart body: {}", err.body_text()))
}
