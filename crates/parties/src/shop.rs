use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{DomainError, OwnerId, ShopId};

use crate::customer::validate_phone;

/// A shop selling catalog items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub phone: String,
    pub is_open: bool,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
}

impl Shop {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let phone = phone.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("shop name cannot be empty"));
        }
        validate_phone(&phone)?;

        Ok(Self {
            id: ShopId::new(),
            name,
            phone,
            is_open: true,
            owner_id,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_shop_is_open() {
        let shop = Shop::new("Sharma Kirana", "9876543210", OwnerId::new(), Utc::now()).unwrap();
        assert!(shop.is_open);
    }
}
