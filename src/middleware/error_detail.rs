use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorDetail;
use crate::response::Envelope;

/// Rewrites error responses to carry their diagnostic `error` field.
/// Installed only outside production.
pub async fn expose_error_detail(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDetail { message, detail }) = response.extensions().get::<ErrorDetail>().cloned()
    else {
        return response;
    };
    (
        response.status(),
        Envelope::<()>::failure(message).with_error(detail),
    )
        .into_response()
}
