use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use kirana_core::{BookingId, CustomerId, ItemId, ShopId};
use kirana_infra::{BookingFilter, LineRequest, PlaceBooking};
use kirana_orders::BookingStatus;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", axum::routing::post(create_booking).get(list_bookings))
        .route("/:id", get(get_booking))
        .route("/:id/status", put(update_booking_status))
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateBookingRequest>,
) -> axum::response::Response {
    let customer_id: CustomerId = match body.customer_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id")
        }
    };
    let shop_id: ShopId = match body.shop_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shop id")
        }
    };

    let mut lines = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let item_id: ItemId = match item.item_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id")
            }
        };
        lines.push(LineRequest {
            item_id,
            quantity: item.quantity,
        });
    }

    let request = PlaceBooking {
        customer_id,
        shop_id,
        lines,
        note: body.notes,
    };

    match services.place_booking(request).await {
        Ok(booking) => {
            (StatusCode::CREATED, Json(dto::booking_to_json(&booking))).into_response()
        }
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let booking_id: BookingId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id")
        }
    };

    match services.get_booking(booking_id).await {
        Ok(Some(booking)) => (StatusCode::OK, Json(dto::booking_to_json(&booking))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "booking not found"),
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::BookingListQuery>,
) -> axum::response::Response {
    let mut filter = BookingFilter::default();

    if let Some(raw) = &query.customer_id {
        match raw.parse::<CustomerId>() {
            Ok(v) => filter.customer_id = Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid customer id",
                )
            }
        }
    }
    if let Some(raw) = &query.shop_id {
        match raw.parse::<ShopId>() {
            Ok(v) => filter.shop_id = Some(v),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shop id")
            }
        }
    }
    if let Some(raw) = &query.status {
        match raw.parse::<BookingStatus>() {
            Ok(v) => filter.status = Some(v),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_status", e.to_string())
            }
        }
    }

    match services.list_bookings(filter).await {
        Ok(bookings) => {
            let items = bookings.iter().map(dto::booking_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn update_booking_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateBookingStatusRequest>,
) -> axum::response::Response {
    let booking_id: BookingId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id")
        }
    };
    let target: BookingStatus = match body.status.parse() {
        Ok(v) => v,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_status", e.to_string())
        }
    };

    match services.update_status(booking_id, target).await {
        Ok(booking) => (StatusCode::OK, Json(dto::booking_to_json(&booking))).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}
