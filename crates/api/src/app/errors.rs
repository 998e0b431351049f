use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use kirana_infra::BookingError;

pub fn booking_error_to_response(err: BookingError) -> axum::response::Response {
    let message = err.to_string();
    let (status, code) = match &err {
        BookingError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        BookingError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        BookingError::ShopMismatch { .. } => (StatusCode::BAD_REQUEST, "shop_mismatch"),
        BookingError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, "insufficient_stock"),
        BookingError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        BookingError::Store(e) => {
            tracing::error!(error = %e, "storage failure");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "unexpected storage failure, please retry later",
            );
        }
    };
    json_error(status, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
