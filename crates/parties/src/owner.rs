use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{DomainError, OwnerId, ShopId};

use crate::customer::validate_phone;

/// The owner of a shop; `push_token` is the notification address for
/// "new order" messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    pub phone: String,
    pub shop_id: ShopId,
    pub push_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Owner {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        shop_id: ShopId,
        push_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let phone = phone.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("owner name cannot be empty"));
        }
        validate_phone(&phone)?;

        Ok(Self {
            id: OwnerId::new(),
            name,
            phone,
            shop_id,
            push_token,
            created_at: now,
        })
    }

    pub fn set_push_token(&mut self, token: Option<String>) {
        self.push_token = token;
    }
}
