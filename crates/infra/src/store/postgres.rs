//! Postgres-backed store implementation.
//!
//! Each unit of work is one Postgres transaction. Isolation strategy:
//!
//! - daily order numbering takes a `FOR UPDATE` lock on the shop row before
//!   reading the day's maximum, so two transactions numbering orders for the
//!   same shop serialize on that row;
//! - stock reservation is a conditional `UPDATE ... WHERE available >= $n`,
//!   so the non-negative floor is enforced by the database even under
//!   concurrent writers;
//! - serialization/deadlock failures (SQLSTATE 40001/40P01) and unique
//!   violations (23505) map to [`StoreError::Conflict`], which the booking
//!   pipeline retries with backoff.
//!
//! Runs at READ COMMITTED: once the shop row lock is acquired, the
//! per-statement snapshot makes the day's `MAX(daily_order_number)` read see
//! every committed numbering transaction, which is what keeps numbers
//! gap-free and duplicate-free.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use kirana_catalog::Item;
use kirana_core::{
    BookingId, CategoryId, CustomerId, ItemId, OwnerId, ShopId, SubcategoryId,
};
use kirana_orders::{Booking, BookingLine, BookingStatus};
use kirana_parties::{Customer, Owner, Shop};

use super::{BookingFilter, StockReservation, Store, StoreError, UnitOfWork};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL UNIQUE,
    push_token  TEXT,
    bookings    JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS owners (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL UNIQUE,
    shop_id     UUID NOT NULL,
    push_token  TEXT,
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS shops (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL UNIQUE,
    is_open     BOOLEAN NOT NULL DEFAULT TRUE,
    owner_id    UUID NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    id              UUID PRIMARY KEY,
    shop_id         UUID NOT NULL,
    name            TEXT NOT NULL,
    price           BIGINT NOT NULL CHECK (price > 0),
    available       INTEGER NOT NULL CHECK (available >= 0),
    category_id     UUID NOT NULL,
    subcategory_id  UUID NOT NULL,
    image_url       TEXT,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS items_shop_idx ON items (shop_id);

CREATE TABLE IF NOT EXISTS bookings (
    id                  UUID PRIMARY KEY,
    customer_id         UUID NOT NULL,
    shop_id             UUID NOT NULL,
    lines               JSONB NOT NULL,
    total_amount        BIGINT NOT NULL,
    daily_order_number  INTEGER NOT NULL CHECK (daily_order_number >= 1),
    status              TEXT NOT NULL,
    is_completed        BOOLEAN NOT NULL,
    note                TEXT,
    created_at          TIMESTAMPTZ NOT NULL,
    updated_at          TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS bookings_shop_created_idx ON bookings (shop_id, created_at DESC);
CREATE INDEX IF NOT EXISTS bookings_customer_idx ON bookings (customer_id);
"#;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await.map_err(map_sqlx)?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(map_sqlx)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Unit of work over [`PgStore`]: a live Postgres transaction.
pub struct PgUow {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PgStore {
    type Uow = PgUow;

    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Self::Uow, StoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(PgUow { tx })
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_booking(&r)).transpose()
    }

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM bookings
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR shop_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.customer_id.map(|c| *c.as_uuid()))
        .bind(filter.shop_id.map(|s| *s.as_uuid()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(decode_booking).collect()
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT * FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_item(&r)).transpose()
    }

    async fn list_shop_items(&self, shop_id: ShopId) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query("SELECT * FROM items WHERE shop_id = $1 ORDER BY name")
            .bind(shop_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode_item).collect()
    }

    async fn get_shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query("SELECT * FROM shops WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_shop(&r)).transpose()
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_customer(&r)).transpose()
    }
}

#[async_trait]
impl UnitOfWork for PgUow {
    async fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_customer(&r)).transpose()
    }

    async fn customer_by_phone(&mut self, phone: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customers WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_customer(&r)).transpose()
    }

    async fn owner(&mut self, id: OwnerId) -> Result<Option<Owner>, StoreError> {
        let row = sqlx::query("SELECT * FROM owners WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_owner(&r)).transpose()
    }

    async fn owner_by_phone(&mut self, phone: &str) -> Result<Option<Owner>, StoreError> {
        let row = sqlx::query("SELECT * FROM owners WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_owner(&r)).transpose()
    }

    async fn shop(&mut self, id: ShopId) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query("SELECT * FROM shops WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_shop(&r)).transpose()
    }

    async fn shop_by_phone(&mut self, phone: &str) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query("SELECT * FROM shops WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_shop(&r)).transpose()
    }

    async fn item(&mut self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT * FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_item(&r)).transpose()
    }

    async fn booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| decode_booking(&r)).transpose()
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn reserve_stock(
        &mut self,
        id: ItemId,
        quantity: u32,
    ) -> Result<StockReservation, StoreError> {
        let quantity = qty_i32(quantity)?;
        let result = sqlx::query(
            "UPDATE items SET available = available - $2, updated_at = $3 \
             WHERE id = $1 AND available >= $2",
        )
        .bind(id.as_uuid())
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() > 0 {
            return Ok(StockReservation::Reserved);
        }

        let row = sqlx::query("SELECT available FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?
            .ok_or_else(|| StoreError::backend(format!("item {id} vanished mid-transaction")))?;

        let available: i32 = row.try_get("available").map_err(map_sqlx)?;
        Ok(StockReservation::Insufficient {
            available: u32::try_from(available)
                .map_err(|_| StoreError::backend("negative stock in items table"))?,
        })
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn restore_stock(&mut self, id: ItemId, quantity: u32) -> Result<(), StoreError> {
        let quantity = qty_i32(quantity)?;
        let result = sqlx::query(
            "UPDATE items SET available = available + $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::backend(format!(
                "item {id} missing during restore"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(shop_id = %shop_id))]
    async fn max_daily_number(
        &mut self,
        shop_id: ShopId,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        // Serialize daily numbering per shop: every numbering transaction
        // must hold the shop row lock until it commits its insert.
        let locked = sqlx::query("SELECT id FROM shops WHERE id = $1 FOR UPDATE")
            .bind(shop_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        if locked.is_none() {
            return Err(StoreError::backend(format!(
                "shop {shop_id} vanished mid-transaction"
            )));
        }

        let row = sqlx::query(
            "SELECT COALESCE(MAX(daily_order_number), 0) AS max_number \
             FROM bookings WHERE shop_id = $1 AND created_at >= $2",
        )
        .bind(shop_id.as_uuid())
        .bind(since)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        let max_number: i32 = row.try_get("max_number").map_err(map_sqlx)?;
        u32::try_from(max_number)
            .map_err(|_| StoreError::backend("negative daily_order_number in bookings table"))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, customer_id, shop_id, lines, total_amount, daily_order_number,
                 status, is_completed, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(booking.id.as_uuid())
        .bind(booking.customer_id.as_uuid())
        .bind(booking.shop_id.as_uuid())
        .bind(encode_lines(&booking.lines)?)
        .bind(amount_i64(booking.total_amount)?)
        .bind(qty_i32(booking.daily_order_number)?)
        .bind(booking.status.as_str())
        .bind(booking.is_completed)
        .bind(booking.note.as_deref())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, is_completed = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.status.as_str())
        .bind(booking.is_completed)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::backend(format!(
                "booking {} missing during update",
                booking.id
            )));
        }
        Ok(())
    }

    async fn upsert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, push_token, bookings, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    phone = EXCLUDED.phone,
                    push_token = EXCLUDED.push_token,
                    bookings = EXCLUDED.bookings
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.push_token.as_deref())
        .bind(
            serde_json::to_value(&customer.bookings)
                .map_err(|e| StoreError::backend(e.to_string()))?,
        )
        .bind(customer.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn upsert_owner(&mut self, owner: &Owner) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO owners (id, name, phone, shop_id, push_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    phone = EXCLUDED.phone,
                    shop_id = EXCLUDED.shop_id,
                    push_token = EXCLUDED.push_token
            "#,
        )
        .bind(owner.id.as_uuid())
        .bind(&owner.name)
        .bind(&owner.phone)
        .bind(owner.shop_id.as_uuid())
        .bind(owner.push_token.as_deref())
        .bind(owner.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn upsert_shop(&mut self, shop: &Shop) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO shops (id, name, phone, is_open, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    phone = EXCLUDED.phone,
                    is_open = EXCLUDED.is_open,
                    owner_id = EXCLUDED.owner_id
            "#,
        )
        .bind(shop.id.as_uuid())
        .bind(&shop.name)
        .bind(&shop.phone)
        .bind(shop.is_open)
        .bind(shop.owner_id.as_uuid())
        .bind(shop.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn upsert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items
                (id, shop_id, name, price, available, category_id, subcategory_id,
                 image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    price = EXCLUDED.price,
                    available = EXCLUDED.available,
                    category_id = EXCLUDED.category_id,
                    subcategory_id = EXCLUDED.subcategory_id,
                    image_url = EXCLUDED.image_url,
                    updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.shop_id.as_uuid())
        .bind(&item.name)
        .bind(amount_i64(item.price)?)
        .bind(qty_i32(item.available)?)
        .bind(item.category_id.as_uuid())
        .bind(item.subcategory_id.as_uuid())
        .bind(item.image_url.as_deref())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_sqlx)
    }
}

fn qty_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::backend("quantity out of range"))
}

fn amount_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::backend("amount out of range"))
}

/// SQLx error mapping: retryable serialization/deadlock/unique failures
/// become `Conflict`; everything else is `Backend`.
fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            if code == "40001" || code == "40P01" {
                return StoreError::Conflict(format!("serialization failure: {db}"));
            }
            if code == "23505" {
                return StoreError::Conflict(format!("unique violation: {db}"));
            }
        }
    }
    StoreError::Backend(e.to_string())
}

fn decode_customer(row: &sqlx::postgres::PgRow) -> Result<Customer, StoreError> {
    let bookings: serde_json::Value = row.try_get("bookings").map_err(map_sqlx)?;
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        name: row.try_get("name").map_err(map_sqlx)?,
        phone: row.try_get("phone").map_err(map_sqlx)?,
        push_token: row.try_get("push_token").map_err(map_sqlx)?,
        bookings: serde_json::from_value(bookings)
            .map_err(|e| StoreError::backend(format!("corrupt booking history: {e}")))?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

fn decode_owner(row: &sqlx::postgres::PgRow) -> Result<Owner, StoreError> {
    Ok(Owner {
        id: OwnerId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        name: row.try_get("name").map_err(map_sqlx)?,
        phone: row.try_get("phone").map_err(map_sqlx)?,
        shop_id: ShopId::from_uuid(row.try_get("shop_id").map_err(map_sqlx)?),
        push_token: row.try_get("push_token").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

fn decode_shop(row: &sqlx::postgres::PgRow) -> Result<Shop, StoreError> {
    Ok(Shop {
        id: ShopId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        name: row.try_get("name").map_err(map_sqlx)?,
        phone: row.try_get("phone").map_err(map_sqlx)?,
        is_open: row.try_get("is_open").map_err(map_sqlx)?,
        owner_id: OwnerId::from_uuid(row.try_get("owner_id").map_err(map_sqlx)?),
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

fn decode_item(row: &sqlx::postgres::PgRow) -> Result<Item, StoreError> {
    let price: i64 = row.try_get("price").map_err(map_sqlx)?;
    let available: i32 = row.try_get("available").map_err(map_sqlx)?;
    Ok(Item {
        id: ItemId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        shop_id: ShopId::from_uuid(row.try_get("shop_id").map_err(map_sqlx)?),
        name: row.try_get("name").map_err(map_sqlx)?,
        price: u64::try_from(price)
            .map_err(|_| StoreError::backend("negative price in items table"))?,
        available: u32::try_from(available)
            .map_err(|_| StoreError::backend("negative stock in items table"))?,
        category_id: CategoryId::from_uuid(row.try_get("category_id").map_err(map_sqlx)?),
        subcategory_id: SubcategoryId::from_uuid(
            row.try_get("subcategory_id").map_err(map_sqlx)?,
        ),
        image_url: row.try_get("image_url").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn decode_booking(row: &sqlx::postgres::PgRow) -> Result<Booking, StoreError> {
    let lines: serde_json::Value = row.try_get("lines").map_err(map_sqlx)?;
    let lines: Vec<BookingLine> = serde_json::from_value(lines)
        .map_err(|e| StoreError::backend(format!("corrupt booking lines: {e}")))?;
    let total: i64 = row.try_get("total_amount").map_err(map_sqlx)?;
    let number: i32 = row.try_get("daily_order_number").map_err(map_sqlx)?;
    let status: String = row.try_get("status").map_err(map_sqlx)?;

    Ok(Booking {
        id: BookingId::from_uuid(row.try_get("id").map_err(map_sqlx)?),
        customer_id: CustomerId::from_uuid(row.try_get("customer_id").map_err(map_sqlx)?),
        shop_id: ShopId::from_uuid(row.try_get("shop_id").map_err(map_sqlx)?),
        lines,
        total_amount: u64::try_from(total)
            .map_err(|_| StoreError::backend("negative total in bookings table"))?,
        daily_order_number: u32::try_from(number)
            .map_err(|_| StoreError::backend("negative order number in bookings table"))?,
        status: status
            .parse::<BookingStatus>()
            .map_err(|e| StoreError::backend(format!("corrupt status: {e}")))?,
        is_completed: row.try_get("is_completed").map_err(map_sqlx)?,
        note: row.try_get("note").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn encode_lines(lines: &[BookingLine]) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(lines).map_err(|e| StoreError::backend(e.to_string()))
}
