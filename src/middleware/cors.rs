use axum::http::header::CONTENT_DISPOSITION;
use tower_http::cors::{Any, CorsLayer};

/// Open CORS for the API. `Content-Disposition` is exposed so browser
/// clients can read the file name of report downloads.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any)
        .expose_headers([CONTENT_DISPOSITION])
}
