//! Multipart image uploads.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Seller;
use crate::error::{ok, ApiError};
use crate::storage::{store_images, UploadFile};
use crate::AppState;

/// Form field that carries image files
pub const IMAGES_FIELD: &str = "images";

/// A multipart body split into text fields and image files
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadFile>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload is too large")
    } else {
        ApiError::bad_request(format!("Invalid upload: {}", err.body_text()))
    }
}

/// Read every part. File inputs left empty by the browser are skipped.
pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGES_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            form.files.push(UploadFile {
                file_name: if file_name.is_empty() {
                    "image".to_string()
                } else {
                    file_name
                },
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// POST /api/uploads
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_multipart(multipart).await?;
    let urls = store_images(
        state.images.as_ref(),
        seller.user_id,
        form.files,
        &state.config.storage,
    )
    .await?;
    tracing::info!(seller_id = %seller.user_id, count = urls.len(), "Images uploaded");
    Ok((StatusCode::CREATED, ok(serde_json::json!({ "urls": urls }))))
}
