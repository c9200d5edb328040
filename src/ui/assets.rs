// Stylesheet and icons compiled into the binary

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "static/"]
pub struct StaticAssets;

/// GET /static/*path
pub async fn serve_static(Path(file): Path<String>) -> Result<impl IntoResponse, StatusCode> {
    match StaticAssets::get(&file) {
        Some(content) => {
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            Ok((
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                content.data.into_owned(),
            ))
        }
        None => {
            tracing::debug!(file = %file, "Static asset not found");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheet_is_embedded() {
        assert!(StaticAssets::get("app.css").is_some());
        assert!(StaticAssets::get("missing.css").is_none());
    }

    #[tokio::test]
    async fn test_serve_static_content_type() {
        let response = serve_static(Path("app.css".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css"
        );

        let missing = serve_static(Path("nope.js".to_string()))
            .await
            .into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
