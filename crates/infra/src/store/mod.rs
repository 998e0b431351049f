//! Persistence seam: explicit unit-of-work transactions over a shared store.
//!
//! The booking pipeline needs stock reservation, order numbering, and the
//! booking insert to execute as one isolated unit relative to any concurrent
//! pipeline touching the same items or the same shop's daily counter. Each
//! backend documents how it provides that isolation:
//!
//! - [`InMemoryStore`]: a store-wide async mutex held for the life of the
//!   unit of work (full serialization); mutations land in a scratch copy that
//!   is swapped in on commit, so dropping an uncommitted unit of work is a
//!   rollback.
//! - [`PgStore`]: one Postgres transaction per unit of work; per-shop
//!   `FOR UPDATE` row locking serializes numbering, a conditional update
//!   reserves stock, and serialization failures surface as
//!   [`StoreError::Conflict`] for the caller to retry.

mod memory;
mod postgres;

pub use memory::{InMemoryStore, InMemoryUow};
pub use postgres::{PgStore, PgUow};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use kirana_catalog::Item;
use kirana_core::{BookingId, CustomerId, ItemId, OwnerId, ShopId};
use kirana_orders::{Booking, BookingStatus};
use kirana_parties::{Customer, Owner, Shop};

/// Storage-layer error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The unit of work could not be serialized against a concurrent writer.
    /// Safe to retry with backoff.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Unexpected persistence failure. Not retried automatically.
    #[error("storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Outcome of a conditional stock reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockReservation {
    Reserved,
    Insufficient { available: u32 },
}

/// Filter for booking listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFilter {
    pub customer_id: Option<CustomerId>,
    pub shop_id: Option<ShopId>,
    pub status: Option<BookingStatus>,
}

/// A shared persistent store that can open units of work and serve
/// non-transactional reads.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Uow: UnitOfWork;

    /// Open a unit of work. Effects become visible only at
    /// [`UnitOfWork::commit`].
    async fn begin(&self) -> Result<Self::Uow, StoreError>;

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;
    /// Bookings matching the filter, newest first.
    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError>;
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;
    async fn list_shop_items(&self, shop_id: ShopId) -> Result<Vec<Item>, StoreError>;
    async fn get_shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError>;
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
}

/// One atomic, isolated transaction against the store.
///
/// All reads observe the transaction's own uncommitted writes. Dropping a
/// unit of work without committing discards every buffered effect;
/// [`UnitOfWork::rollback`] does the same explicitly.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
    async fn customer_by_phone(&mut self, phone: &str) -> Result<Option<Customer>, StoreError>;
    async fn owner(&mut self, id: OwnerId) -> Result<Option<Owner>, StoreError>;
    async fn owner_by_phone(&mut self, phone: &str) -> Result<Option<Owner>, StoreError>;
    async fn shop(&mut self, id: ShopId) -> Result<Option<Shop>, StoreError>;
    async fn shop_by_phone(&mut self, phone: &str) -> Result<Option<Shop>, StoreError>;
    async fn item(&mut self, id: ItemId) -> Result<Option<Item>, StoreError>;
    async fn booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Conditionally decrement an item's available quantity.
    ///
    /// Never takes stock below zero; reports `Insufficient` (with the
    /// quantity actually available) instead of partially reserving.
    async fn reserve_stock(
        &mut self,
        id: ItemId,
        quantity: u32,
    ) -> Result<StockReservation, StoreError>;

    /// Compensating increment for a cancelled booking line.
    ///
    /// A missing item here is a data-integrity failure, surfaced as
    /// [`StoreError::Backend`], never dropped.
    async fn restore_stock(&mut self, id: ItemId, quantity: u32) -> Result<(), StoreError>;

    /// Highest daily order number issued for the shop at or after `since`
    /// (0 when none). Serialized against concurrent callers for the same
    /// shop by the backend.
    async fn max_daily_number(
        &mut self,
        shop_id: ShopId,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError>;

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;

    async fn upsert_customer(&mut self, customer: &Customer) -> Result<(), StoreError>;
    async fn upsert_owner(&mut self, owner: &Owner) -> Result<(), StoreError>;
    async fn upsert_shop(&mut self, shop: &Shop) -> Result<(), StoreError>;
    async fn upsert_item(&mut self, item: &Item) -> Result<(), StoreError>;

    /// Make every buffered effect visible atomically.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every buffered effect.
    async fn rollback(self) -> Result<(), StoreError>;
}
