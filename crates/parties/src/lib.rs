//! `kirana-parties` — customers, shops, and shop owners.
//!
//! Lifecycle of these entities is mostly owned elsewhere (auth/OTP supplies
//! verified identities); the ordering core reads their existence, links
//! bookings to customers, and uses the push tokens as notification addresses.

pub mod customer;
pub mod owner;
pub mod shop;

pub use customer::Customer;
pub use owner::Owner;
pub use shop::Shop;

use chrono::{DateTime, Utc};
use kirana_core::{DomainError, ShopId};

/// Register an owner together with their shop, cross-linked.
///
/// The two records reference each other, so they are built as a pair and
/// persisted in one unit of work by the caller.
pub fn register_owner_shop(
    owner_name: impl Into<String>,
    owner_phone: impl Into<String>,
    shop_name: impl Into<String>,
    shop_phone: impl Into<String>,
    push_token: Option<String>,
    now: DateTime<Utc>,
) -> Result<(Owner, Shop), DomainError> {
    let mut owner = Owner::new(owner_name, owner_phone, ShopId::new(), push_token, now)?;
    let shop = Shop::new(shop_name, shop_phone, owner.id, now)?;
    owner.shop_id = shop.id;
    Ok((owner, shop))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_links_owner_and_shop_both_ways() {
        let (owner, shop) = register_owner_shop(
            "Ravi",
            "9000000001",
            "Ravi General Store",
            "9000000002",
            Some("ExponentPushToken[abc]".to_string()),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(owner.shop_id, shop.id);
        assert_eq!(shop.owner_id, owner.id);
    }
}
