use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use kirana_core::ShopId;
use kirana_infra::BookingFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_shop))
        .route("/:id", get(get_shop))
        .route("/:id/items", get(list_shop_items))
        .route("/:id/orders", get(list_shop_orders))
}

pub async fn register_shop(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterShopRequest>,
) -> axum::response::Response {
    match services
        .register_shop(
            body.owner_name,
            body.owner_phone,
            body.shop_name,
            body.shop_phone,
            body.push_token,
        )
        .await
    {
        Ok((owner, shop)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "owner and shop registered",
                "ownerId": owner.id,
                "shopId": shop.id,
            })),
        )
            .into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn get_shop(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shop_id: ShopId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shop id")
        }
    };

    match services.get_shop(shop_id).await {
        Ok(Some(shop)) => (StatusCode::OK, Json(dto::shop_to_json(&shop))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "shop not found"),
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn list_shop_items(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shop_id: ShopId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shop id")
        }
    };

    match services.list_shop_items(shop_id).await {
        Ok(items) => {
            let items = items.iter().map(dto::item_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::booking_error_to_response(e),
    }
}

/// Owner's order view: the shop's bookings, newest first.
pub async fn list_shop_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shop_id: ShopId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shop id")
        }
    };

    let filter = BookingFilter {
        shop_id: Some(shop_id),
        ..Default::default()
    };
    match services.list_bookings(filter).await {
        Ok(bookings) => {
            let items = bookings.iter().map(dto::booking_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::booking_error_to_response(e),
    }
}
