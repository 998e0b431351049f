use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{BookingId, CustomerId, DomainError, ItemId, ShopId};

/// Booking status lifecycle.
///
/// `pending` -> `confirmed` | `cancelled`; `confirmed` -> `cancelled` |
/// `completed`; `pending` -> `completed` is deliberately permitted.
/// `cancelled` and `completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

impl core::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(DomainError::validation(format!(
                "unknown booking status '{other}'"
            ))),
        }
    }
}

/// Inventory side effect a status transition requires from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// No inventory change (confirmation, completion).
    None,
    /// Restore every line's quantity onto its item (cancellation).
    Restore,
}

/// One (item, quantity, captured unit price) triple within a booking.
///
/// `unit_price` is the item's price at order time; later price edits never
/// change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingLine {
    pub item_id: ItemId,
    pub quantity: u32,
    /// Price in smallest currency unit, captured at order time.
    pub unit_price: u64,
}

impl BookingLine {
    /// Line subtotal with overflow checking.
    pub fn subtotal(&self) -> Result<u64, DomainError> {
        self.unit_price
            .checked_mul(u64::from(self.quantity))
            .ok_or_else(|| DomainError::validation("line subtotal overflows"))
    }
}

/// A customer's placed order against one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub lines: Vec<BookingLine>,
    /// Sum of captured unit price x quantity, frozen at creation.
    pub total_amount: u64,
    /// Shop-scoped, UTC-day-scoped sequential number, starting at 1.
    pub daily_order_number: u32,
    pub status: BookingStatus,
    pub is_completed: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Assemble a new `pending` booking from already-validated lines.
    ///
    /// The orchestrator has checked existence/ownership and reserved stock by
    /// the time it calls this; here only line shape and total arithmetic are
    /// enforced.
    pub fn place(
        customer_id: CustomerId,
        shop_id: ShopId,
        lines: Vec<BookingLine>,
        daily_order_number: u32,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("booking must contain at least one item"));
        }
        if lines.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::validation("line quantity must be at least 1"));
        }
        if daily_order_number == 0 {
            return Err(DomainError::validation("daily order number starts at 1"));
        }

        let total_amount = total_of(&lines)?;

        Ok(Self {
            id: BookingId::new(),
            customer_id,
            shop_id,
            lines,
            total_amount,
            daily_order_number,
            status: BookingStatus::Pending,
            is_completed: false,
            note,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a requested status change and report the inventory side effect.
    ///
    /// Allow-list of targets: `confirmed`, `cancelled`, `completed`; the
    /// target `pending` is rejected as validation. Transitions out of a
    /// terminal status are rejected as conflicts, which is what prevents a
    /// second cancellation from restoring stock twice.
    pub fn transition_to(
        &mut self,
        target: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<StockEffect, DomainError> {
        if target == BookingStatus::Pending {
            return Err(DomainError::validation(
                "status must be one of: confirmed, cancelled, completed",
            ));
        }
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "booking is already {}",
                self.status
            )));
        }

        let effect = match target {
            BookingStatus::Cancelled => StockEffect::Restore,
            BookingStatus::Confirmed | BookingStatus::Completed => StockEffect::None,
            BookingStatus::Pending => unreachable!("rejected above"),
        };

        self.status = target;
        if target == BookingStatus::Completed {
            self.is_completed = true;
        }
        self.updated_at = now;

        Ok(effect)
    }
}

/// Checked sum of line subtotals.
pub fn total_of(lines: &[BookingLine]) -> Result<u64, DomainError> {
    lines.iter().try_fold(0u64, |acc, line| {
        acc.checked_add(line.subtotal()?)
            .ok_or_else(|| DomainError::validation("booking total overflows"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, unit_price: u64) -> BookingLine {
        BookingLine {
            item_id: ItemId::new(),
            quantity,
            unit_price,
        }
    }

    fn place(lines: Vec<BookingLine>) -> Booking {
        Booking::place(
            CustomerId::new(),
            ShopId::new(),
            lines,
            1,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn place_computes_total_from_captured_prices() {
        let booking = place(vec![line(3, 100), line(2, 250)]);
        assert_eq!(booking.total_amount, 800);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(!booking.is_completed);
    }

    #[test]
    fn place_rejects_empty_cart_and_zero_quantity() {
        let err = Booking::place(
            CustomerId::new(),
            ShopId::new(),
            vec![],
            1,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = Booking::place(
            CustomerId::new(),
            ShopId::new(),
            vec![line(0, 100)],
            1,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn place_rejects_overflowing_total() {
        let err = Booking::place(
            CustomerId::new(),
            ShopId::new(),
            vec![line(2, u64::MAX)],
            1,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancel_pending_restores_stock() {
        let mut booking = place(vec![line(3, 100)]);
        let effect = booking
            .transition_to(BookingStatus::Cancelled, Utc::now())
            .unwrap();
        assert_eq!(effect, StockEffect::Restore);
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }

    #[test]
    fn cancel_confirmed_restores_stock() {
        let mut booking = place(vec![line(3, 100)]);
        booking
            .transition_to(BookingStatus::Confirmed, Utc::now())
            .unwrap();
        let effect = booking
            .transition_to(BookingStatus::Cancelled, Utc::now())
            .unwrap();
        assert_eq!(effect, StockEffect::Restore);
    }

    #[test]
    fn confirm_and_complete_have_no_stock_effect() {
        let mut booking = place(vec![line(1, 100)]);
        assert_eq!(
            booking
                .transition_to(BookingStatus::Confirmed, Utc::now())
                .unwrap(),
            StockEffect::None
        );
        assert_eq!(
            booking
                .transition_to(BookingStatus::Completed, Utc::now())
                .unwrap(),
            StockEffect::None
        );
        assert!(booking.is_completed);
    }

    #[test]
    fn pending_straight_to_completed_is_permitted() {
        let mut booking = place(vec![line(1, 100)]);
        booking
            .transition_to(BookingStatus::Completed, Utc::now())
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        assert!(booking.is_completed);
    }

    #[test]
    fn terminal_statuses_reject_all_transitions() {
        let mut cancelled = place(vec![line(1, 100)]);
        cancelled
            .transition_to(BookingStatus::Cancelled, Utc::now())
            .unwrap();
        let err = cancelled
            .transition_to(BookingStatus::Cancelled, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let mut completed = place(vec![line(1, 100)]);
        completed
            .transition_to(BookingStatus::Completed, Utc::now())
            .unwrap();
        let err = completed
            .transition_to(BookingStatus::Confirmed, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn pending_is_not_an_accepted_target() {
        let mut booking = place(vec![line(1, 100)]);
        let err = booking
            .transition_to(BookingStatus::Pending, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn status_parses_lowercase_strings_only() {
        assert_eq!(
            "confirmed".parse::<BookingStatus>().unwrap(),
            BookingStatus::Confirmed
        );
        assert!("Confirmed".parse::<BookingStatus>().is_err());
        assert!("shipped".parse::<BookingStatus>().is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Totals computed with u128 arithmetic agree with the checked
            // u64 path whenever the latter succeeds.
            #[test]
            fn total_matches_wide_arithmetic(
                lines in prop::collection::vec((1u32..1_000, 1u64..1_000_000), 1..8)
            ) {
                let lines: Vec<BookingLine> = lines
                    .into_iter()
                    .map(|(quantity, unit_price)| BookingLine {
                        item_id: ItemId::new(),
                        quantity,
                        unit_price,
                    })
                    .collect();

                let wide: u128 = lines
                    .iter()
                    .map(|l| u128::from(l.unit_price) * u128::from(l.quantity))
                    .sum();

                let total = total_of(&lines).unwrap();
                prop_assert_eq!(u128::from(total), wide);
            }

            // A cancellation restores exactly what `place` reserved, for any
            // line shape.
            #[test]
            fn cancel_effect_is_restore_for_any_cart(
                quantities in prop::collection::vec(1u32..100, 1..8)
            ) {
                let lines: Vec<BookingLine> = quantities
                    .iter()
                    .map(|&quantity| BookingLine {
                        item_id: ItemId::new(),
                        quantity,
                        unit_price: 100,
                    })
                    .collect();

                let mut booking = Booking::place(
                    CustomerId::new(),
                    ShopId::new(),
                    lines,
                    1,
                    None,
                    Utc::now(),
                )
                .unwrap();

                let effect = booking
                    .transition_to(BookingStatus::Cancelled, Utc::now())
                    .unwrap();
                prop_assert_eq!(effect, StockEffect::Restore);
                prop_assert!(booking
                    .transition_to(BookingStatus::Cancelled, Utc::now())
                    .is_err());
            }
        }
    }
}
