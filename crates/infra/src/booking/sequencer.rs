//! Daily order numbering.
//!
//! Numbers are scoped per shop per UTC calendar day and assigned inside the
//! caller's unit of work; this is deliberately not a standalone operation,
//! because its correctness depends on being serialized with the booking
//! insert it numbers.

use chrono::{DateTime, NaiveTime, Utc};

use kirana_core::ShopId;

use crate::store::{StoreError, UnitOfWork};

/// Start of the UTC calendar day containing `now`.
pub(crate) fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Next daily order number for the shop: highest number issued today plus
/// one, or 1 when the shop has no bookings yet today.
pub(crate) async fn next_daily_number<U: UnitOfWork>(
    uow: &mut U,
    shop_id: ShopId,
    now: DateTime<Utc>,
) -> Result<u32, StoreError> {
    let max = uow.max_daily_number(shop_id, utc_day_start(now)).await?;
    Ok(max + 1)
}
