//! Booking execution pipeline (application-level orchestration).
//!
//! `BookingService` runs the two operations with real invariants — order
//! placement and status transitions — against an injected [`Store`] and
//! [`NotificationGateway`]. Each operation is one unit of work: validate,
//! mutate, commit; on any failure the unit of work is rolled back and the
//! store is left exactly as before the call. Store-level conflicts are
//! retried with exponential backoff a bounded number of times.
//!
//! Notifications are prepared inside the transaction (while the owner or
//! customer row is at hand) but dispatched only after a successful commit,
//! on a spawned task that logs and swallows its own failures.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use kirana_core::{BookingId, CustomerId, DomainError, ItemId, ShopId};
use kirana_orders::{Booking, BookingLine, BookingStatus, StockEffect};

use crate::notify::{spawn_best_effort, NotificationGateway, PushMessage};
use crate::store::{StockReservation, Store, StoreError, UnitOfWork};

use super::sequencer::next_daily_number;

/// Error surfaced by the booking pipeline.
///
/// Unifies deterministic domain failures with storage failures so the API
/// layer has a single taxonomy to map onto HTTP statuses.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("item {item} does not belong to the specified shop")]
    ShopMismatch { item: String },

    #[error("insufficient stock for {item}: {available} available, {requested} requested")]
    InsufficientStock {
        item: String,
        available: u32,
        requested: u32,
    },

    /// Surfaced only after the pipeline's own bounded retry gave up, or for
    /// deterministic conflicts (terminal booking status, duplicate phone).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for BookingError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => BookingError::Validation(msg),
            DomainError::NotFound(entity) => BookingError::NotFound(entity),
            DomainError::ShopMismatch { item } => BookingError::ShopMismatch { item },
            DomainError::InsufficientStock {
                item,
                available,
                requested,
            } => BookingError::InsufficientStock {
                item,
                available,
                requested,
            },
            DomainError::Conflict(msg) => BookingError::Conflict(msg),
            DomainError::InvalidId(msg) => BookingError::Validation(msg),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => BookingError::Conflict(msg),
            backend @ StoreError::Backend(_) => BookingError::Store(backend),
        }
    }
}

/// Transaction-internal error: keeps store conflicts distinguishable from
/// deterministic domain conflicts so only the former are retried.
#[derive(Debug)]
enum TxError {
    Domain(DomainError),
    Store(StoreError),
}

impl TxError {
    fn is_retryable(&self) -> bool {
        matches!(self, TxError::Store(StoreError::Conflict(_)))
    }
}

impl From<DomainError> for TxError {
    fn from(value: DomainError) -> Self {
        TxError::Domain(value)
    }
}

impl From<StoreError> for TxError {
    fn from(value: StoreError) -> Self {
        TxError::Store(value)
    }
}

impl From<TxError> for BookingError {
    fn from(value: TxError) -> Self {
        match value {
            TxError::Domain(e) => e.into(),
            TxError::Store(e) => e.into(),
        }
    }
}

/// One requested cart line.
#[derive(Debug, Clone, Copy)]
pub struct LineRequest {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// A cart-like booking request.
#[derive(Debug, Clone)]
pub struct PlaceBooking {
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub lines: Vec<LineRequest>,
    pub note: Option<String>,
}

/// Bounded retry for store-level conflicts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// The booking transaction orchestrator and status transition handler.
pub struct BookingService<S> {
    store: Arc<S>,
    notifier: Arc<dyn NotificationGateway>,
    retry: RetryPolicy,
}

impl<S: Store> BookingService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn NotificationGateway>) -> Self {
        Self {
            store,
            notifier,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Place a booking: validate, reserve stock all-or-nothing, assign the
    /// daily order number, persist, commit, then notify the shop owner.
    #[instrument(skip(self, request), fields(shop_id = %request.shop_id))]
    pub async fn place_booking(&self, request: PlaceBooking) -> Result<Booking, BookingError> {
        if request.lines.is_empty() {
            return Err(BookingError::Validation(
                "booking must contain at least one item".into(),
            ));
        }
        if request.lines.iter().any(|l| l.quantity == 0) {
            return Err(BookingError::Validation(
                "line quantity must be at least 1".into(),
            ));
        }

        let mut attempt = 0;
        loop {
            match self.place_once(&request).await {
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.attempts => {
                    tracing::debug!(attempt, "booking transaction conflict, retrying");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                other => return other.map_err(BookingError::from),
            }
        }
    }

    async fn place_once(&self, request: &PlaceBooking) -> Result<Booking, TxError> {
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let (booking, push) = match place_in(&mut uow, request, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                rollback_logged(uow).await;
                return Err(e);
            }
        };

        uow.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            daily_order_number = booking.daily_order_number,
            total_amount = booking.total_amount,
            "booking placed"
        );
        if let Some(push) = push {
            spawn_best_effort(self.notifier.clone(), push);
        }

        Ok(booking)
    }

    /// Apply a status transition: allow-list check, terminal guard,
    /// compensating stock restoration on cancellation, commit, then notify
    /// the customer.
    #[instrument(skip(self), fields(booking_id = %booking_id, target = %target))]
    pub async fn update_status(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let mut attempt = 0;
        loop {
            match self.update_once(booking_id, target).await {
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.attempts => {
                    tracing::debug!(attempt, "status transaction conflict, retrying");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                other => return other.map_err(BookingError::from),
            }
        }
    }

    async fn update_once(
        &self,
        booking_id: BookingId,
        target: BookingStatus,
    ) -> Result<Booking, TxError> {
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let (booking, push) = match transition_in(&mut uow, booking_id, target, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                rollback_logged(uow).await;
                return Err(e);
            }
        };

        uow.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            status = %booking.status,
            "booking status updated"
        );
        if let Some(push) = push {
            spawn_best_effort(self.notifier.clone(), push);
        }

        Ok(booking)
    }
}

/// Transaction body for order placement. Runs entirely inside `uow`; the
/// caller commits or rolls back.
async fn place_in<U: UnitOfWork>(
    uow: &mut U,
    request: &PlaceBooking,
    now: chrono::DateTime<Utc>,
) -> Result<(Booking, Option<PushMessage>), TxError> {
    let mut customer = uow
        .customer(request.customer_id)
        .await?
        .ok_or_else(|| DomainError::not_found("customer"))?;
    let shop = uow
        .shop(request.shop_id)
        .await?
        .ok_or_else(|| DomainError::not_found("shop"))?;

    // Capture prices and reserve stock line by line. The first shortage
    // aborts the transaction, which discards every reservation made so far.
    let mut lines = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let item = uow
            .item(line.item_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("item {}", line.item_id)))?;
        if item.shop_id != request.shop_id {
            return Err(DomainError::ShopMismatch { item: item.name }.into());
        }

        match uow.reserve_stock(item.id, line.quantity).await? {
            StockReservation::Reserved => {}
            StockReservation::Insufficient { available } => {
                return Err(DomainError::InsufficientStock {
                    item: item.name,
                    available,
                    requested: line.quantity,
                }
                .into());
            }
        }

        lines.push(BookingLine {
            item_id: item.id,
            quantity: line.quantity,
            unit_price: item.price,
        });
    }

    let number = next_daily_number(uow, request.shop_id, now).await?;
    let booking = Booking::place(
        request.customer_id,
        request.shop_id,
        lines,
        number,
        request.note.clone(),
        now,
    )?;

    uow.insert_booking(&booking).await?;
    customer.record_booking(booking.id);
    uow.upsert_customer(&customer).await?;

    let owner = uow.owner(shop.owner_id).await?;
    let push = owner
        .and_then(|o| o.push_token)
        .map(|token| PushMessage {
            token,
            title: format!("New order #{}", booking.daily_order_number),
            body: format!(
                "{} placed an order worth {}",
                customer.name,
                format_amount(booking.total_amount)
            ),
            data: json!({
                "bookingId": booking.id,
                "dailyOrderNumber": booking.daily_order_number,
                "totalAmount": booking.total_amount,
            }),
        });

    Ok((booking, push))
}

/// Transaction body for a status transition.
async fn transition_in<U: UnitOfWork>(
    uow: &mut U,
    booking_id: BookingId,
    target: BookingStatus,
    now: chrono::DateTime<Utc>,
) -> Result<(Booking, Option<PushMessage>), TxError> {
    let mut booking = uow
        .booking(booking_id)
        .await?
        .ok_or_else(|| DomainError::not_found("booking"))?;

    let effect = booking.transition_to(target, now)?;

    if effect == StockEffect::Restore {
        for line in &booking.lines {
            uow.restore_stock(line.item_id, line.quantity).await?;
        }
    }

    uow.update_booking(&booking).await?;

    let push = match booking.status {
        BookingStatus::Confirmed | BookingStatus::Cancelled => {
            let shop_name = uow
                .shop(booking.shop_id)
                .await?
                .map(|s| s.name)
                .unwrap_or_else(|| "The shop".to_string());
            uow.customer(booking.customer_id)
                .await?
                .and_then(|c| c.push_token)
                .map(|token| customer_push(token, &booking, &shop_name))
        }
        _ => None,
    };

    Ok((booking, push))
}

fn customer_push(token: String, booking: &Booking, shop_name: &str) -> PushMessage {
    let (title, body) = match booking.status {
        BookingStatus::Confirmed => (
            format!("Order #{} confirmed", booking.daily_order_number),
            format!("{shop_name} accepted your order."),
        ),
        _ => (
            format!("Order #{} cancelled", booking.daily_order_number),
            format!("{shop_name} cancelled your order."),
        ),
    };

    PushMessage {
        token,
        title,
        body,
        data: json!({
            "bookingId": booking.id,
            "status": booking.status,
        }),
    }
}

async fn rollback_logged<U: UnitOfWork>(uow: U) {
    if let Err(e) = uow.rollback().await {
        tracing::warn!(error = %e, "unit of work rollback failed");
    }
}

fn format_amount(paise: u64) -> String {
    format!("\u{20b9}{}.{:02}", paise / 100, paise % 100)
}
