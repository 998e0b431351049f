//! Integration tests for the full booking pipeline.
//!
//! Tests: request → unit of work → reservation/numbering/insert → commit →
//! post-commit notification, against the in-memory store.
//!
//! Verifies:
//! - all-or-nothing reservation across a multi-item cart
//! - gap-free daily order numbering under concurrency
//! - no overselling under concurrency
//! - price freezing, exact cancellation restore, terminal-state guards
//! - notification failures never surface to booking callers

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use kirana_catalog::Item;
    use kirana_core::{CategoryId, SubcategoryId};
    use kirana_orders::BookingStatus;
    use kirana_parties::{register_owner_shop, Customer, Owner, Shop};

    use crate::booking::{BookingError, BookingService, LineRequest, PlaceBooking};
    use crate::notify::{RecordingGateway, SentPush};
    use crate::store::{InMemoryStore, Store, UnitOfWork};

    struct Seeded {
        customer: Customer,
        shop: Shop,
        #[allow(dead_code)]
        owner: Owner,
        item_a: Item,
        item_b: Item,
    }

    async fn seed(store: &InMemoryStore, stock_a: u32, stock_b: u32) -> Seeded {
        let now = Utc::now();
        let customer = Customer::new(
            "Asha",
            "9876543210",
            Some("ExponentPushToken[customer]".to_string()),
            now,
        )
        .unwrap();
        let (owner, shop) = register_owner_shop(
            "Ravi",
            "9000000001",
            "Ravi General Store",
            "9000000002",
            Some("ExponentPushToken[owner]".to_string()),
            now,
        )
        .unwrap();
        let item_a = Item::new(
            shop.id,
            "Basmati Rice 1kg",
            12_000,
            stock_a,
            CategoryId::new(),
            SubcategoryId::new(),
            None,
            now,
        )
        .unwrap();
        let item_b = Item::new(
            shop.id,
            "Toor Dal 1kg",
            15_000,
            stock_b,
            CategoryId::new(),
            SubcategoryId::new(),
            None,
            now,
        )
        .unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.upsert_customer(&customer).await.unwrap();
        uow.upsert_owner(&owner).await.unwrap();
        uow.upsert_shop(&shop).await.unwrap();
        uow.upsert_item(&item_a).await.unwrap();
        uow.upsert_item(&item_b).await.unwrap();
        uow.commit().await.unwrap();

        Seeded {
            customer,
            shop,
            owner,
            item_a,
            item_b,
        }
    }

    fn service(
        store: &Arc<InMemoryStore>,
        gateway: &Arc<RecordingGateway>,
    ) -> BookingService<InMemoryStore> {
        BookingService::new(store.clone(), gateway.clone())
    }

    async fn wait_for_pushes(gateway: &RecordingGateway, count: usize) -> Vec<SentPush> {
        // Delivery runs on a spawned task; poll briefly until it lands.
        for _ in 0..200 {
            let sent = gateway.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected at least {count} pushes, got {:?}", gateway.sent());
    }

    #[tokio::test]
    async fn placing_a_booking_reserves_stock_and_numbers_it() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let booking = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![
                    LineRequest {
                        item_id: seeded.item_a.id,
                        quantity: 3,
                    },
                    LineRequest {
                        item_id: seeded.item_b.id,
                        quantity: 1,
                    },
                ],
                note: Some("ring the bell".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(booking.daily_order_number, 1);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, 3 * 12_000 + 15_000);

        let item_a = store.get_item(seeded.item_a.id).await.unwrap().unwrap();
        let item_b = store.get_item(seeded.item_b.id).await.unwrap().unwrap();
        assert_eq!(item_a.available, 2);
        assert_eq!(item_b.available, 4);

        // Booking is persisted and linked to the customer's history.
        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.lines.len(), 2);
        let customer = store
            .get_customer(seeded.customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.bookings, vec![booking.id]);
    }

    #[tokio::test]
    async fn one_short_line_aborts_the_whole_cart() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 10, 2).await;
        let svc = service(&store, &gateway);

        let err = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![
                    LineRequest {
                        item_id: seeded.item_a.id,
                        quantity: 4,
                    },
                    LineRequest {
                        item_id: seeded.item_b.id,
                        quantity: 3,
                    },
                ],
                note: None,
            })
            .await
            .unwrap_err();

        match err {
            BookingError::InsufficientStock {
                item,
                available,
                requested,
            } => {
                assert_eq!(item, "Toor Dal 1kg");
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // The reservation already made for item A was rolled back with the
        // rest of the transaction.
        let item_a = store.get_item(seeded.item_a.id).await.unwrap().unwrap();
        let item_b = store.get_item(seeded.item_b.id).await.unwrap().unwrap();
        assert_eq!(item_a.available, 10);
        assert_eq!(item_b.available, 2);
        assert!(store
            .list_bookings(Default::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn missing_references_fail_with_not_found_or_mismatch() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let err = svc
            .place_booking(PlaceBooking {
                customer_id: kirana_core::CustomerId::new(),
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 1,
                }],
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound(ref e) if e == "customer"));

        let err = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: kirana_core::ShopId::new(),
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 1,
                }],
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound(ref e) if e == "shop"));

        // Item from a different shop.
        let (other_owner, other_shop) = register_owner_shop(
            "Meena",
            "9000000003",
            "Meena Stores",
            "9000000004",
            None,
            Utc::now(),
        )
        .unwrap();
        let foreign_item = Item::new(
            other_shop.id,
            "Sugar 1kg",
            5_000,
            10,
            CategoryId::new(),
            SubcategoryId::new(),
            None,
            Utc::now(),
        )
        .unwrap();
        let mut uow = store.begin().await.unwrap();
        uow.upsert_owner(&other_owner).await.unwrap();
        uow.upsert_shop(&other_shop).await.unwrap();
        uow.upsert_item(&foreign_item).await.unwrap();
        uow.commit().await.unwrap();

        let err = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: foreign_item.id,
                    quantity: 1,
                }],
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ShopMismatch { ref item } if item == "Sugar 1kg"));
    }

    #[tokio::test]
    async fn daily_numbers_are_sequential_per_shop() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 100, 100).await;
        let svc = service(&store, &gateway);

        for expected in 1..=4u32 {
            let booking = svc
                .place_booking(PlaceBooking {
                    customer_id: seeded.customer.id,
                    shop_id: seeded.shop.id,
                    lines: vec![LineRequest {
                        item_id: seeded.item_a.id,
                        quantity: 1,
                    }],
                    note: None,
                })
                .await
                .unwrap();
            assert_eq!(booking.daily_order_number, expected);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_never_oversell_and_never_share_a_number() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 10, 100).await;
        let svc = Arc::new(service(&store, &gateway));

        let mut handles = Vec::new();
        for _ in 0..25 {
            let svc = svc.clone();
            let customer_id = seeded.customer.id;
            let shop_id = seeded.shop.id;
            let item_id = seeded.item_a.id;
            handles.push(tokio::spawn(async move {
                svc.place_booking(PlaceBooking {
                    customer_id,
                    shop_id,
                    lines: vec![LineRequest {
                        item_id,
                        quantity: 1,
                    }],
                    note: None,
                })
                .await
            }));
        }

        let mut numbers = Vec::new();
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(booking) => numbers.push(booking.daily_order_number),
                Err(BookingError::InsufficientStock { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        // Stock was 10, so exactly 10 orders of quantity 1 can succeed.
        assert_eq!(numbers.len(), 10);
        assert_eq!(rejected, 15);

        let item = store.get_item(seeded.item_a.id).await.unwrap().unwrap();
        assert_eq!(item.available, 0);

        // Numbers are exactly {1..=10}, no gaps, no duplicates.
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=10).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn price_edits_do_not_change_existing_bookings() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let booking = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 2,
                }],
                note: None,
            })
            .await
            .unwrap();
        assert_eq!(booking.total_amount, 24_000);

        // Owner doubles the price afterwards.
        let mut uow = store.begin().await.unwrap();
        let mut item = uow.item(seeded.item_a.id).await.unwrap().unwrap();
        item.update_listing(None, Some(24_000), None, None, None, Utc::now())
            .unwrap();
        uow.upsert_item(&item).await.unwrap();
        uow.commit().await.unwrap();

        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.total_amount, 24_000);
        assert_eq!(stored.lines[0].unit_price, 12_000);
    }

    #[tokio::test]
    async fn cancellation_restores_stock_exactly_once() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let booking = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![
                    LineRequest {
                        item_id: seeded.item_a.id,
                        quantity: 3,
                    },
                    LineRequest {
                        item_id: seeded.item_b.id,
                        quantity: 2,
                    },
                ],
                note: None,
            })
            .await
            .unwrap();

        let updated = svc
            .update_status(booking.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Cancelled);

        let item_a = store.get_item(seeded.item_a.id).await.unwrap().unwrap();
        let item_b = store.get_item(seeded.item_b.id).await.unwrap().unwrap();
        assert_eq!(item_a.available, 5);
        assert_eq!(item_b.available, 5);

        // A second cancellation is rejected and must not restore again.
        let err = svc
            .update_status(booking.id, BookingStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict(_)));
        let item_a = store.get_item(seeded.item_a.id).await.unwrap().unwrap();
        assert_eq!(item_a.available, 5);
    }

    #[tokio::test]
    async fn completion_does_not_touch_stock() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let booking = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 2,
                }],
                note: None,
            })
            .await
            .unwrap();

        svc.update_status(booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        let completed = svc
            .update_status(booking.id, BookingStatus::Completed)
            .await
            .unwrap();
        assert!(completed.is_completed);

        let item = store.get_item(seeded.item_a.id).await.unwrap().unwrap();
        assert_eq!(item.available, 3);
    }

    #[tokio::test]
    async fn cancelled_stock_can_be_reordered_with_the_next_number() {
        // The §8 walk-through: 5 in stock, order 3, reject 4, cancel, retry 4.
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let first = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 3,
                }],
                note: None,
            })
            .await
            .unwrap();
        assert_eq!(first.daily_order_number, 1);

        let err = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 4,
                }],
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InsufficientStock { .. }));

        svc.update_status(first.id, BookingStatus::Cancelled)
            .await
            .unwrap();

        let retry = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 4,
                }],
                note: None,
            })
            .await
            .unwrap();
        assert_eq!(retry.daily_order_number, 2);

        let item = store.get_item(seeded.item_a.id).await.unwrap().unwrap();
        assert_eq!(item.available, 1);
    }

    #[tokio::test]
    async fn owner_and_customer_are_notified_at_the_right_transitions() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let booking = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 1,
                }],
                note: None,
            })
            .await
            .unwrap();

        let sent = wait_for_pushes(&gateway, 1).await;
        assert_eq!(sent[0].token, "ExponentPushToken[owner]");
        assert_eq!(sent[0].title, "New order #1");
        assert!(sent[0].body.contains("Asha"));

        svc.update_status(booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        let sent = wait_for_pushes(&gateway, 2).await;
        assert_eq!(sent[1].token, "ExponentPushToken[customer]");
        assert_eq!(sent[1].title, "Order #1 confirmed");

        // Completion notifies nobody.
        svc.update_status(booking.id, BookingStatus::Completed)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(gateway.sent().len(), 2);
    }

    #[tokio::test]
    async fn notification_failure_never_fails_the_booking() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::failing());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let booking = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 1,
                }],
                note: None,
            })
            .await
            .unwrap();

        // Delivery was attempted and failed; the booking stands.
        wait_for_pushes(&gateway, 1).await;
        assert!(store.get_booking(booking.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_and_zero_quantity_carts_are_rejected_upfront() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let seeded = seed(&store, 5, 5).await;
        let svc = service(&store, &gateway);

        let err = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![],
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));

        let err = svc
            .place_booking(PlaceBooking {
                customer_id: seeded.customer.id,
                shop_id: seeded.shop.id,
                lines: vec![LineRequest {
                    item_id: seeded.item_a.id,
                    quantity: 0,
                }],
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }
}
