use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{BookingId, CustomerId, DomainError};

/// A customer of the platform.
///
/// `bookings` is the customer's order history; the booking orchestrator
/// appends to it in the same unit of work that inserts the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub push_token: Option<String>,
    pub bookings: Vec<BookingId>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        push_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let phone = phone.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        validate_phone(&phone)?;

        Ok(Self {
            id: CustomerId::new(),
            name,
            phone,
            push_token,
            bookings: Vec::new(),
            created_at: now,
        })
    }

    pub fn record_booking(&mut self, booking_id: BookingId) {
        self.bookings.push(booking_id);
    }

    pub fn set_push_token(&mut self, token: Option<String>) {
        self.push_token = token;
    }
}

pub(crate) fn validate_phone(phone: &str) -> Result<(), DomainError> {
    if phone.len() != 10 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::validation(
            "phone must be a 10-digit number",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_customer_starts_with_empty_history() {
        let customer = Customer::new("Asha", "9876543210", None, Utc::now()).unwrap();
        assert!(customer.bookings.is_empty());
    }

    #[test]
    fn phone_must_be_ten_digits() {
        assert!(Customer::new("Asha", "12345", None, Utc::now()).is_err());
        assert!(Customer::new("Asha", "98765abc10", None, Utc::now()).is_err());
    }

    #[test]
    fn record_booking_appends() {
        let mut customer = Customer::new("Asha", "9876543210", None, Utc::now()).unwrap();
        let booking = BookingId::new();
        customer.record_booking(booking);
        assert_eq!(customer.bookings, vec![booking]);
    }
}
