use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{CategoryId, DomainError, ItemId, ShopId, SubcategoryId};

/// Catalog item offered by a single shop.
///
/// `available` is the one piece of shared mutable state in the system; it is
/// only ever changed through [`Item::reserve`], [`Item::restore`] and
/// [`Item::adjust_stock`], all of which keep it non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub shop_id: ShopId,
    pub name: String,
    /// Price in smallest currency unit (e.g., paise).
    pub price: u64,
    pub available: u32,
    pub category_id: CategoryId,
    pub subcategory_id: SubcategoryId,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        shop_id: ShopId,
        name: impl Into<String>,
        price: u64,
        available: u32,
        category_id: CategoryId,
        subcategory_id: SubcategoryId,
        image_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if price == 0 {
            return Err(DomainError::validation("item price must be positive"));
        }

        Ok(Self {
            id: ItemId::new(),
            shop_id,
            name,
            price,
            available,
            category_id,
            subcategory_id,
            image_url,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decrement available stock for a new booking line.
    ///
    /// Fails without mutating when `quantity` exceeds `available`; the caller
    /// aborts the whole cart in that case.
    pub fn reserve(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
        if quantity > self.available {
            return Err(DomainError::InsufficientStock {
                item: self.name.clone(),
                available: self.available,
                requested: quantity,
            });
        }
        self.available -= quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Compensating increment for a cancelled booking line.
    pub fn restore(&mut self, quantity: u32, now: DateTime<Utc>) {
        self.available = self.available.saturating_add(quantity);
        self.updated_at = now;
    }

    /// Owner stock correction by signed delta, floor at zero.
    pub fn adjust_stock(&mut self, delta: i64, now: DateTime<Utc>) -> Result<(), DomainError> {
        let new_stock = i64::from(self.available) + delta;
        if new_stock < 0 {
            return Err(DomainError::validation("stock cannot go negative"));
        }
        let new_stock = u32::try_from(new_stock)
            .map_err(|_| DomainError::validation("stock adjustment out of range"))?;
        self.available = new_stock;
        self.updated_at = now;
        Ok(())
    }

    /// Owner edit of the listing (name/price/category refs).
    ///
    /// Price edits never touch existing bookings: line prices are captured at
    /// order time.
    pub fn update_listing(
        &mut self,
        name: Option<String>,
        price: Option<u64>,
        category_id: Option<CategoryId>,
        subcategory_id: Option<SubcategoryId>,
        image_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("item name cannot be empty"));
            }
            self.name = name;
        }
        if let Some(price) = price {
            if price == 0 {
                return Err(DomainError::validation("item price must be positive"));
            }
            self.price = price;
        }
        if let Some(category_id) = category_id {
            self.category_id = category_id;
        }
        if let Some(subcategory_id) = subcategory_id {
            self.subcategory_id = subcategory_id;
        }
        if let Some(image_url) = image_url {
            self.image_url = Some(image_url);
        }
        self.updated_at = now;
        Ok(())
    }
}
