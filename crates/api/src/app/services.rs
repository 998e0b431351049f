//! Application services: the booking pipeline plus the thin CRUD plumbing
//! around it, generic over the store backend.

use std::sync::Arc;

use chrono::Utc;

use kirana_catalog::Item;
use kirana_core::{BookingId, CategoryId, CustomerId, ItemId, ShopId, SubcategoryId};
use kirana_infra::{
    BookingError, BookingFilter, BookingService, ExpoPushGateway, InMemoryStore,
    NotificationGateway, PgStore, PlaceBooking, Store, StoreError, UnitOfWork,
};
use kirana_orders::{Booking, BookingStatus};
use kirana_parties::{register_owner_shop, Customer, Owner, Shop};

/// Backend-generic service bundle: the core pipeline plus CRUD helpers.
///
/// The CRUD paths go through the same unit-of-work seam as the core, so a
/// dropped transaction never leaves partial state (e.g. an owner without a
/// shop).
pub struct Services<S: Store> {
    store: Arc<S>,
    booking: BookingService<S>,
}

impl<S: Store> Services<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn NotificationGateway>) -> Self {
        let booking = BookingService::new(store.clone(), notifier);
        Self { store, booking }
    }

    async fn register_customer(
        &self,
        name: String,
        phone: String,
        push_token: Option<String>,
    ) -> Result<Customer, BookingError> {
        let mut uow = self.store.begin().await?;
        if uow.customer_by_phone(&phone).await?.is_some() {
            return Err(BookingError::Conflict(
                "a customer with this phone number already exists".into(),
            ));
        }
        let customer = Customer::new(name, phone, push_token, Utc::now())?;
        uow.upsert_customer(&customer).await?;
        uow.commit().await?;
        Ok(customer)
    }

    async fn set_customer_push_token(
        &self,
        id: CustomerId,
        push_token: Option<String>,
    ) -> Result<Customer, BookingError> {
        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .customer(id)
            .await?
            .ok_or_else(|| BookingError::NotFound("customer".into()))?;
        customer.set_push_token(push_token);
        uow.upsert_customer(&customer).await?;
        uow.commit().await?;
        Ok(customer)
    }

    async fn register_shop(
        &self,
        owner_name: String,
        owner_phone: String,
        shop_name: String,
        shop_phone: String,
        push_token: Option<String>,
    ) -> Result<(Owner, Shop), BookingError> {
        let mut uow = self.store.begin().await?;
        if uow.owner_by_phone(&owner_phone).await?.is_some() {
            return Err(BookingError::Conflict(
                "an owner with this phone number already exists".into(),
            ));
        }
        if uow.shop_by_phone(&shop_phone).await?.is_some() {
            return Err(BookingError::Conflict(
                "a shop with this phone number already exists".into(),
            ));
        }
        let (owner, shop) =
            register_owner_shop(owner_name, owner_phone, shop_name, shop_phone, push_token, Utc::now())?;
        uow.upsert_owner(&owner).await?;
        uow.upsert_shop(&shop).await?;
        uow.commit().await?;
        Ok((owner, shop))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_item(
        &self,
        shop_id: ShopId,
        name: String,
        price: u64,
        quantity: u32,
        category_id: CategoryId,
        subcategory_id: SubcategoryId,
        image_url: Option<String>,
    ) -> Result<Item, BookingError> {
        let mut uow = self.store.begin().await?;
        if uow.shop(shop_id).await?.is_none() {
            return Err(BookingError::NotFound("shop".into()));
        }
        let item = Item::new(
            shop_id,
            name,
            price,
            quantity,
            category_id,
            subcategory_id,
            image_url,
            Utc::now(),
        )?;
        uow.upsert_item(&item).await?;
        uow.commit().await?;
        Ok(item)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_item(
        &self,
        id: ItemId,
        name: Option<String>,
        price: Option<u64>,
        category_id: Option<CategoryId>,
        subcategory_id: Option<SubcategoryId>,
        image_url: Option<String>,
    ) -> Result<Item, BookingError> {
        let mut uow = self.store.begin().await?;
        let mut item = uow
            .item(id)
            .await?
            .ok_or_else(|| BookingError::NotFound("item".into()))?;
        item.update_listing(name, price, category_id, subcategory_id, image_url, Utc::now())?;
        uow.upsert_item(&item).await?;
        uow.commit().await?;
        Ok(item)
    }

    async fn adjust_stock(&self, id: ItemId, delta: i64) -> Result<Item, BookingError> {
        let mut uow = self.store.begin().await?;
        let mut item = uow
            .item(id)
            .await?
            .ok_or_else(|| BookingError::NotFound("item".into()))?;
        item.adjust_stock(delta, Utc::now())?;
        uow.upsert_item(&item).await?;
        uow.commit().await?;
        Ok(item)
    }
}

/// Concrete service bundle for the selected backend.
///
/// Backend selection happens once at startup; handlers stay backend-agnostic.
pub enum AppServices {
    InMemory(Services<InMemoryStore>),
    Postgres(Services<PgStore>),
}

macro_rules! on_backend {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            AppServices::InMemory($s) => $body,
            AppServices::Postgres($s) => $body,
        }
    };
}

impl AppServices {
    /// Select the backend from the environment: `DATABASE_URL` set →
    /// Postgres; otherwise the in-memory store (dev/test). `EXPO_PUSH_URL`
    /// overrides the push endpoint.
    pub async fn from_env() -> Result<Self, StoreError> {
        let notifier: Arc<dyn NotificationGateway> = match std::env::var("EXPO_PUSH_URL") {
            Ok(url) => Arc::new(ExpoPushGateway::with_endpoint(url)),
            Err(_) => Arc::new(ExpoPushGateway::new()),
        };

        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let store = Arc::new(PgStore::connect(&url).await?);
                tracing::info!("using postgres store");
                Ok(AppServices::Postgres(Services::new(store, notifier)))
            }
            Err(_) => {
                tracing::info!("DATABASE_URL not set; using in-memory store");
                Ok(AppServices::in_memory(notifier))
            }
        }
    }

    pub fn in_memory(notifier: Arc<dyn NotificationGateway>) -> Self {
        AppServices::InMemory(Services::new(Arc::new(InMemoryStore::new()), notifier))
    }

    pub async fn place_booking(&self, request: PlaceBooking) -> Result<Booking, BookingError> {
        on_backend!(self, s => s.booking.place_booking(request).await)
    }

    pub async fn update_status(
        &self,
        id: BookingId,
        target: BookingStatus,
    ) -> Result<Booking, BookingError> {
        on_backend!(self, s => s.booking.update_status(id, target).await)
    }

    pub async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, BookingError> {
        on_backend!(self, s => Ok(s.store.get_booking(id).await?))
    }

    pub async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, BookingError> {
        on_backend!(self, s => Ok(s.store.list_bookings(filter).await?))
    }

    pub async fn register_customer(
        &self,
        name: String,
        phone: String,
        push_token: Option<String>,
    ) -> Result<Customer, BookingError> {
        on_backend!(self, s => s.register_customer(name, phone, push_token).await)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, BookingError> {
        on_backend!(self, s => Ok(s.store.get_customer(id).await?))
    }

    pub async fn set_customer_push_token(
        &self,
        id: CustomerId,
        push_token: Option<String>,
    ) -> Result<Customer, BookingError> {
        on_backend!(self, s => s.set_customer_push_token(id, push_token).await)
    }

    pub async fn register_shop(
        &self,
        owner_name: String,
        owner_phone: String,
        shop_name: String,
        shop_phone: String,
        push_token: Option<String>,
    ) -> Result<(Owner, Shop), BookingError> {
        on_backend!(self, s => {
            s.register_shop(owner_name, owner_phone, shop_name, shop_phone, push_token)
                .await
        })
    }

    pub async fn get_shop(&self, id: ShopId) -> Result<Option<Shop>, BookingError> {
        on_backend!(self, s => Ok(s.store.get_shop(id).await?))
    }

    pub async fn list_shop_items(&self, shop_id: ShopId) -> Result<Vec<Item>, BookingError> {
        on_backend!(self, s => Ok(s.store.list_shop_items(shop_id).await?))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_item(
        &self,
        shop_id: ShopId,
        name: String,
        price: u64,
        quantity: u32,
        category_id: CategoryId,
        subcategory_id: SubcategoryId,
        image_url: Option<String>,
    ) -> Result<Item, BookingError> {
        on_backend!(self, s => {
            s.create_item(shop_id, name, price, quantity, category_id, subcategory_id, image_url)
                .await
        })
    }

    pub async fn get_item(&self, id: ItemId) -> Result<Option<Item>, BookingError> {
        on_backend!(self, s => Ok(s.store.get_item(id).await?))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_item(
        &self,
        id: ItemId,
        name: Option<String>,
        price: Option<u64>,
        category_id: Option<CategoryId>,
        subcategory_id: Option<SubcategoryId>,
        image_url: Option<String>,
    ) -> Result<Item, BookingError> {
        on_backend!(self, s => {
            s.update_item(id, name, price, category_id, subcategory_id, image_url)
                .await
        })
    }

    pub async fn adjust_stock(&self, id: ItemId, delta: i64) -> Result<Item, BookingError> {
        on_backend!(self, s => s.adjust_stock(id, delta).await)
    }
}
