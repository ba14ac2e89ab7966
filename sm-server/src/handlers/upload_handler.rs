use axum::{
    extract::{Extension, Multipart, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, warn};
use crate::error::{ErrorCode, reject};
use crate::middleware::auth::CurrentUser;
use crate::service::StorageService;

/// Stores the multipart field `file` as a message image.
pub async fn upload_message_image(
    Extension(storage): Extension<Arc<StorageService>>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "malformed multipart body");
                return Err(reject(ErrorCode::InvalidInput, "Malformed upload"));
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("image").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                error!(user_id = %user.id, error = %e, "failed to read upload");
                return Err(reject(ErrorCode::InvalidInput, "Failed to read file"));
            }
        };

        if data.len() > storage.max_image_bytes() {
            return Err(reject(ErrorCode::InvalidInput, "Image is too large"));
        }
        return match storage.save_image(&file_name, &content_type, &data).await {
            Ok(uploaded) => Ok(Json(uploaded)),
            Err(ErrorCode::InvalidInput) => Err(reject(ErrorCode::InvalidInput, "Only image files can be uploaded")),
            Err(code) => Err(reject(code, "Failed to store image")),
        };
    }

    Err(reject(ErrorCode::InvalidInput, "No file provided"))
}

/// Serves a stored object by its public path.
pub async fn get_object(
    Extension(storage): Extension<Arc<StorageService>>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    match storage.read(&path).await {
        Ok((bytes, content_type)) => Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes)),
        Err(code) => Err(reject(code, "Object not found")),
    }
}
