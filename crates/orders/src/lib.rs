//! `kirana-orders` — the booking (order) entity and its state machine.
//!
//! Pure decision logic only: total computation, status transitions, and the
//! compensating-stock decision. Persistence and notification live in
//! `kirana-infra`.

pub mod booking;

pub use booking::{Booking, BookingLine, BookingStatus, StockEffect};
