//! Request conversion integration tests.

mod common;

use common::{d, item, FailingOrders, TestApp};
use fulfillment_service::error::FulfillmentError;
use fulfillment_service::models::{ItemStatus, OrderStatus, RequestStatus, VendorRef};
use fulfillment_service::services::{ConversionEngine, Repository};
use rust_decimal::Decimal;
use service_core::retry::RetryConfig;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_two_vendors_yield_two_orders() {
    let app = TestApp::spawn().await;
    let vendor_a = VendorRef::external("VEN-A");
    let vendor_b = VendorRef::external("VEN-B");
    let request = app
        .approved_request(vec![
            item("Cotton poplin", "1", "100", vendor_a.clone()),
            item("Cotton twill", "1", "200", vendor_a.clone()),
            item("Viscose crepe", "1", "50", vendor_b.clone()),
        ])
        .await;

    let outcome = app
        .service()
        .convert_request(&request.id)
        .await
        .expect("Conversion failed");

    assert_eq!(outcome.orders.len(), 2);
    assert!(!outcome.degraded);

    let order_a = outcome.orders.iter().find(|o| o.vendor == vendor_a).unwrap();
    let order_b = outcome.orders.iter().find(|o| o.vendor == vendor_b).unwrap();
    assert_eq!(order_a.subtotal, d("300"));
    assert_eq!(order_b.subtotal, d("50"));
    assert_eq!(order_a.status, OrderStatus::Draft);
    assert!(order_a.id.starts_with("ORD-"));
    assert_ne!(order_a.id, order_b.id);

    assert!(outcome
        .request
        .items
        .iter()
        .all(|i| i.status == ItemStatus::Converted));
    assert_eq!(outcome.request.status(), RequestStatus::Converted);

    let stored = app
        .service()
        .repositories()
        .requests
        .find(&request.id)
        .await
        .unwrap();
    assert_eq!(stored.value.status(), RequestStatus::Converted);

    let orders = app.service().repositories().orders.load_all().await.unwrap();
    assert_eq!(orders.value.len(), 2);
}

#[tokio::test]
async fn test_house_items_group_together() {
    let app = TestApp::spawn().await;
    let request = app
        .approved_request(vec![
            item("Lining", "10", "12.50", VendorRef::House),
            item("Buttons", "100", "0.75", VendorRef::House),
        ])
        .await;

    let outcome = app.service().convert_request(&request.id).await.unwrap();
    assert_eq!(outcome.orders.len(), 1);
    assert!(outcome.orders[0].vendor.is_house());
    assert_eq!(outcome.orders[0].subtotal, d("200"));
}

#[tokio::test]
async fn test_order_subtotals_match_target_value() {
    let app = TestApp::spawn().await;
    let inputs = vec![
        item("Denim", "3.5", "212.33", VendorRef::external("VEN-A")),
        item("Chambray", "7", "99.99", VendorRef::external("VEN-B")),
        item("Canvas", "2.25", "140.10", VendorRef::external("VEN-C")),
        item("Drill", "1", "75", VendorRef::external("VEN-A")),
    ];
    let expected: Decimal = inputs
        .iter()
        .map(|i| i.target_price.unwrap() * i.quantity)
        .sum();

    let request = app.approved_request(inputs).await;
    let outcome = app.service().convert_request(&request.id).await.unwrap();

    assert_eq!(outcome.orders.len(), 3);
    let total: Decimal = outcome.orders.iter().map(|o| o.subtotal).sum();
    assert!((total - expected).abs() <= d("0.04"));
}

#[tokio::test]
async fn test_only_approved_items_convert() {
    let app = TestApp::spawn().await;
    let request = app
        .service()
        .create_request(
            common::local_customer(),
            vec![
                item("Poplin", "1", "100", VendorRef::external("VEN-A")),
                item("Oxford", "1", "80", VendorRef::external("VEN-A")),
            ],
        )
        .await
        .unwrap()
        .value;
    app.approve_item(&request.id, &request.items[0].id).await;

    let outcome = app.service().convert_request(&request.id).await.unwrap();
    assert_eq!(outcome.orders.len(), 1);
    assert_eq!(outcome.orders[0].line_items.len(), 1);
    assert_eq!(outcome.request.status(), RequestStatus::PartiallyConverted);
    assert_eq!(outcome.request.items[1].status, ItemStatus::PendingVendor);
}

#[tokio::test]
async fn test_reconversion_fails_with_nothing_to_convert() {
    let app = TestApp::spawn().await;
    let request = app
        .approved_request(vec![item("Poplin", "1", "100", VendorRef::House)])
        .await;
    app.service().convert_request(&request.id).await.unwrap();

    let again = app.service().convert_request(&request.id).await;
    assert!(matches!(again, Err(FulfillmentError::NothingToConvert)));

    let orders = app.service().repositories().orders.load_all().await.unwrap();
    assert_eq!(orders.value.len(), 1);
}

#[tokio::test]
async fn test_failed_group_is_reported_and_left_unconverted() {
    let app = TestApp::spawn().await;
    let good = VendorRef::external("VEN-GOOD");
    let bad = VendorRef::external("VEN-BAD");
    let request = app
        .approved_request(vec![
            item("Poplin", "1", "100", good.clone()),
            item("Crepe", "1", "50", bad.clone()),
        ])
        .await;

    let orders = FailingOrders::new(app.service().repositories().orders.clone(), bad.clone());
    let engine = ConversionEngine::new(RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        add_jitter: false,
        ..RetryConfig::quick()
    });

    let result = engine.convert_approved(&request, &orders).await;
    let Err(FulfillmentError::PartialConversionFailure {
        failed_vendors,
        succeeded_order_ids,
        orders: created,
        request: updated,
    }) = result
    else {
        panic!("expected a partial conversion failure");
    };

    assert_eq!(failed_vendors, vec!["VEN-BAD".to_string()]);
    assert_eq!(succeeded_order_ids.len(), 1);
    assert_eq!(created[0].vendor, good);
    // one attempt plus two retries
    assert_eq!(orders.attempts.load(Ordering::SeqCst), 3);

    let bad_item = updated.items.iter().find(|i| i.vendor == bad).unwrap();
    let good_item = updated.items.iter().find(|i| i.vendor == good).unwrap();
    assert_eq!(bad_item.status, ItemStatus::CustomerApproved);
    assert_eq!(good_item.status, ItemStatus::Converted);
    assert_eq!(updated.status(), RequestStatus::PartiallyConverted);

    // the failed group can be converted once the store recovers
    let retried = engine
        .convert_approved(&updated, app.service().repositories().orders.as_ref())
        .await
        .unwrap();
    assert_eq!(retried.orders.len(), 1);
    assert_eq!(retried.request.status(), RequestStatus::Converted);
}

#[tokio::test]
async fn test_conversion_with_remote_down_is_degraded_not_lost() {
    let app = TestApp::spawn().await;
    let request = app
        .approved_request(vec![item("Poplin", "2", "100", VendorRef::House)])
        .await;

    app.remote.set_down(true);
    let outcome = app.service().convert_request(&request.id).await.unwrap();

    assert!(outcome.degraded);
    assert_eq!(outcome.orders.len(), 1);
    assert_eq!(outcome.request.status(), RequestStatus::Converted);

    let cached = app.service().repositories().orders.load_all().await.unwrap();
    assert!(cached.is_degraded());
    assert_eq!(cached.value.len(), 1);
}
