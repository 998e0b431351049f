//! Request DTOs and response JSON mapping.
//!
//! Field names are camelCase to match the mobile client's wire format.

use serde::Deserialize;
use serde_json::{json, Value};

use kirana_catalog::Item;
use kirana_orders::Booking;
use kirana_parties::{Customer, Shop};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub customer_id: String,
    pub shop_id: String,
    pub items: Vec<BookingLineRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingLineRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub push_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePushTokenRequest {
    #[serde(default)]
    pub push_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterShopRequest {
    pub owner_name: String,
    pub owner_phone: String,
    pub shop_name: String,
    pub shop_phone: String,
    #[serde(default)]
    pub push_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub shop_id: String,
    pub name: String,
    pub price: u64,
    #[serde(default)]
    pub quantity: u32,
    pub category_id: String,
    pub subcategory_id: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub subcategory_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingListQuery {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub shop_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn booking_to_json(booking: &Booking) -> Value {
    json!({
        "id": booking.id,
        "customerId": booking.customer_id,
        "shopId": booking.shop_id,
        "items": booking
            .lines
            .iter()
            .map(|line| json!({
                "itemId": line.item_id,
                "quantity": line.quantity,
                "price": line.unit_price,
            }))
            .collect::<Vec<_>>(),
        "totalAmount": booking.total_amount,
        "dailyOrderNumber": booking.daily_order_number,
        "status": booking.status,
        "isCompleted": booking.is_completed,
        "notes": booking.note,
        "createdAt": booking.created_at,
        "updatedAt": booking.updated_at,
    })
}

pub fn item_to_json(item: &Item) -> Value {
    json!({
        "id": item.id,
        "shopId": item.shop_id,
        "name": item.name,
        "price": item.price,
        "quantityAvailable": item.available,
        "categoryId": item.category_id,
        "subcategoryId": item.subcategory_id,
        "imageUrl": item.image_url,
        "createdAt": item.created_at,
        "updatedAt": item.updated_at,
    })
}

pub fn shop_to_json(shop: &Shop) -> Value {
    json!({
        "id": shop.id,
        "name": shop.name,
        "phone": shop.phone,
        "isOpen": shop.is_open,
        "ownerId": shop.owner_id,
        "createdAt": shop.created_at,
    })
}

pub fn customer_to_json(customer: &Customer) -> Value {
    json!({
        "id": customer.id,
        "name": customer.name,
        "phone": customer.phone,
        "pushToken": customer.push_token,
        "bookings": customer.bookings,
        "createdAt": customer.created_at,
    })
}
