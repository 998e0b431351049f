//! `kirana-infra` — persistence, notification transport, and the booking
//! transaction pipeline.
//!
//! The domain crates stay pure; everything that touches a store or the
//! network lives here, behind traits so the API layer can run against the
//! in-memory backend in tests and Postgres in production.

pub mod booking;
pub mod notify;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use booking::{BookingError, BookingService, LineRequest, PlaceBooking, RetryPolicy};
pub use notify::{ExpoPushGateway, NotificationGateway, NotifyError, RecordingGateway};
pub use store::{
    BookingFilter, InMemoryStore, PgStore, StockReservation, Store, StoreError, UnitOfWork,
};
