use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use kirana_catalog::Item;
use kirana_core::{BookingId, CustomerId, ItemId, OwnerId, ShopId};
use kirana_orders::Booking;
use kirana_parties::{Customer, Owner, Shop};

use super::{BookingFilter, StockReservation, Store, StoreError, UnitOfWork};

#[derive(Debug, Default, Clone)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    owners: HashMap<OwnerId, Owner>,
    shops: HashMap<ShopId, Shop>,
    items: HashMap<ItemId, Item>,
    bookings: HashMap<BookingId, Booking>,
}

/// In-memory store.
///
/// Intended for tests/dev. Units of work hold the store-wide mutex for their
/// whole lifetime, so concurrent transactions are fully serialized; isolation
/// therefore never produces [`StoreError::Conflict`] here.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Unit of work over [`InMemoryStore`].
///
/// Reads and writes go to a scratch copy of the state; commit swaps the
/// scratch in. Dropping without commit leaves the shared state untouched.
pub struct InMemoryUow {
    guard: OwnedMutexGuard<State>,
    scratch: State,
}

#[async_trait]
impl Store for InMemoryStore {
    type Uow = InMemoryUow;

    async fn begin(&self) -> Result<Self::Uow, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let scratch = guard.clone();
        Ok(InMemoryUow { guard, scratch })
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.customer_id.is_none_or(|c| b.customer_id == c))
            .filter(|b| filter.shop_id.is_none_or(|s| b.shop_id == s))
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn list_shop_items(&self, shop_id: ShopId) -> Result<Vec<Item>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|i| i.shop_id == shop_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn get_shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError> {
        Ok(self.state.lock().await.shops.get(&id).cloned())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.state.lock().await.customers.get(&id).cloned())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUow {
    async fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.scratch.customers.get(&id).cloned())
    }

    async fn customer_by_phone(&mut self, phone: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .scratch
            .customers
            .values()
            .find(|c| c.phone == phone)
            .cloned())
    }

    async fn owner(&mut self, id: OwnerId) -> Result<Option<Owner>, StoreError> {
        Ok(self.scratch.owners.get(&id).cloned())
    }

    async fn owner_by_phone(&mut self, phone: &str) -> Result<Option<Owner>, StoreError> {
        Ok(self
            .scratch
            .owners
            .values()
            .find(|o| o.phone == phone)
            .cloned())
    }

    async fn shop(&mut self, id: ShopId) -> Result<Option<Shop>, StoreError> {
        Ok(self.scratch.shops.get(&id).cloned())
    }

    async fn shop_by_phone(&mut self, phone: &str) -> Result<Option<Shop>, StoreError> {
        Ok(self
            .scratch
            .shops
            .values()
            .find(|s| s.phone == phone)
            .cloned())
    }

    async fn item(&mut self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.scratch.items.get(&id).cloned())
    }

    async fn booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.scratch.bookings.get(&id).cloned())
    }

    async fn reserve_stock(
        &mut self,
        id: ItemId,
        quantity: u32,
    ) -> Result<StockReservation, StoreError> {
        let item = self
            .scratch
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::backend(format!("item {id} vanished mid-transaction")))?;

        if item.available < quantity {
            return Ok(StockReservation::Insufficient {
                available: item.available,
            });
        }
        item.available -= quantity;
        item.updated_at = Utc::now();
        Ok(StockReservation::Reserved)
    }

    async fn restore_stock(&mut self, id: ItemId, quantity: u32) -> Result<(), StoreError> {
        let item = self
            .scratch
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::backend(format!("item {id} missing during restore")))?;
        item.available = item.available.saturating_add(quantity);
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn max_daily_number(
        &mut self,
        shop_id: ShopId,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        Ok(self
            .scratch
            .bookings
            .values()
            .filter(|b| b.shop_id == shop_id && b.created_at >= since)
            .map(|b| b.daily_order_number)
            .max()
            .unwrap_or(0))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        if self.scratch.bookings.contains_key(&booking.id) {
            return Err(StoreError::backend(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        self.scratch.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        if !self.scratch.bookings.contains_key(&booking.id) {
            return Err(StoreError::backend(format!(
                "booking {} missing during update",
                booking.id
            )));
        }
        self.scratch.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn upsert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        self.scratch
            .customers
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn upsert_owner(&mut self, owner: &Owner) -> Result<(), StoreError> {
        self.scratch.owners.insert(owner.id, owner.clone());
        Ok(())
    }

    async fn upsert_shop(&mut self, shop: &Shop) -> Result<(), StoreError> {
        self.scratch.shops.insert(shop.id, shop.clone());
        Ok(())
    }

    async fn upsert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        self.scratch.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.scratch;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // Dropping the guard without touching shared state is the rollback.
        Ok(())
    }
}
