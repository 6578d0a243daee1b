//! Request authoring, item workflow and catalog tests.

mod common;

use common::{d, date, item, local_customer, TestApp};
use fulfillment_service::error::FulfillmentError;
use fulfillment_service::models::{
    Color, CreateRequestItem, ItemStatus, NewPayment, PaymentMethod, RequestStatus, VendorRef,
};
use fulfillment_service::services::{Freshness, TransitionPayload};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_request_authoring() {
    let app = TestApp::spawn().await;
    let created = app
        .service()
        .create_request(local_customer(), vec![])
        .await
        .unwrap();
    assert!(created.is_fresh());
    assert_eq!(created.value.status(), RequestStatus::Draft);

    let with_item = app
        .service()
        .add_item(
            &created.value.id,
            item("Khadi", "25", "140", VendorRef::external("VEN-K")),
        )
        .await
        .unwrap()
        .value;
    assert_eq!(with_item.items.len(), 1);
    assert_eq!(with_item.items[0].status, ItemStatus::PendingVendor);
    assert!(with_item.items[0].id.starts_with("ITEM-"));

    let invalid = app
        .service()
        .add_item(
            &created.value.id,
            CreateRequestItem::custom("Khadi", Decimal::ZERO),
        )
        .await;
    assert!(matches!(invalid, Err(FulfillmentError::ValidationError(_))));

    let blank = app
        .service()
        .create_request(
            local_customer(),
            vec![CreateRequestItem::custom("  ", Decimal::ONE)],
        )
        .await;
    assert!(matches!(blank, Err(FulfillmentError::ValidationError(_))));
}

#[tokio::test]
async fn test_item_walks_forward_and_rejects_skips() {
    let app = TestApp::spawn().await;
    let request = app
        .service()
        .create_request(
            local_customer(),
            vec![item("Muslin", "40", "60", VendorRef::House)],
        )
        .await
        .unwrap()
        .value;
    let item_id = request.items[0].id.clone();

    let skip = app
        .service()
        .transition_item(
            &request.id,
            &item_id,
            ItemStatus::CustomerApproved,
            TransitionPayload::default(),
        )
        .await;
    assert!(matches!(
        skip,
        Err(FulfillmentError::InvalidTransition {
            from: ItemStatus::PendingVendor,
            to: ItemStatus::CustomerApproved
        })
    ));

    let approved = app.approve_item(&request.id, &item_id).await;
    let approved_item = approved.item(&item_id).unwrap();
    assert_eq!(approved_item.status, ItemStatus::CustomerApproved);
    assert_eq!(approved_item.offered_price, Some(d("1")));
    assert_eq!(approved_item.vendor_notes.as_deref(), Some("in stock"));
    assert_eq!(approved_item.customer_notes.as_deref(), Some("go ahead"));
    assert_eq!(approved.status(), RequestStatus::InProgress);
}

#[tokio::test]
async fn test_unavailable_vendor_is_terminal() {
    let app = TestApp::spawn().await;
    let request = app
        .service()
        .create_request(
            local_customer(),
            vec![item("Organza", "5", "300", VendorRef::external("VEN-O"))],
        )
        .await
        .unwrap()
        .value;
    let item_id = request.items[0].id.clone();

    for target in [ItemStatus::VendorChecked, ItemStatus::VendorUnavailable] {
        app.service()
            .transition_item(&request.id, &item_id, target, TransitionPayload::default())
            .await
            .unwrap();
    }

    let cancel = app
        .service()
        .transition_item(
            &request.id,
            &item_id,
            ItemStatus::Cancelled,
            TransitionPayload::default(),
        )
        .await;
    assert!(matches!(cancel, Err(FulfillmentError::InvalidTransition { .. })));

    let convert = app.service().convert_request(&request.id).await;
    assert!(matches!(convert, Err(FulfillmentError::NothingToConvert)));
}

#[tokio::test]
async fn test_operator_override_moves_item_back() {
    let app = TestApp::spawn().await;
    let request = app
        .approved_request(vec![item("Satin", "8", "220", VendorRef::House)])
        .await;
    let item_id = request.items[0].id.clone();

    let reopened = app
        .service()
        .override_item(
            &request.id,
            &item_id,
            ItemStatus::VendorChecked,
            "ops-lead",
            TransitionPayload::default().with_vendor_notes("price changed"),
        )
        .await
        .unwrap()
        .value;
    let reopened_item = reopened.item(&item_id).unwrap();
    assert_eq!(reopened_item.status, ItemStatus::VendorChecked);
    assert_eq!(reopened_item.vendor_notes.as_deref(), Some("price changed"));

    let anonymous = app
        .service()
        .override_item(
            &request.id,
            &item_id,
            ItemStatus::PendingVendor,
            "",
            TransitionPayload::default(),
        )
        .await;
    assert!(matches!(anonymous, Err(FulfillmentError::ValidationError(_))));
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let app = TestApp::spawn().await;
    let request = app
        .service()
        .create_request(local_customer(), vec![])
        .await
        .unwrap()
        .value;

    let result = app
        .service()
        .transition_item(
            &request.id,
            "ITEM-0",
            ItemStatus::VendorChecked,
            TransitionPayload::default(),
        )
        .await;
    assert!(matches!(result, Err(FulfillmentError::NotFound { .. })));

    let missing_request = app
        .service()
        .transition_item(
            "REQ-0",
            "ITEM-0",
            ItemStatus::VendorChecked,
            TransitionPayload::default(),
        )
        .await;
    assert!(matches!(
        missing_request,
        Err(FulfillmentError::NotFound {
            entity: "request",
            ..
        })
    ));
}

#[tokio::test]
async fn test_archive_and_delete() {
    let app = TestApp::spawn().await;
    let keep = app
        .service()
        .create_request(local_customer(), vec![])
        .await
        .unwrap()
        .value;
    let archive = app
        .service()
        .create_request(local_customer(), vec![])
        .await
        .unwrap()
        .value;

    app.service().archive_request(&archive.id).await.unwrap();
    let active = app.service().list_requests(false).await.unwrap().value;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, keep.id);
    assert_eq!(app.service().list_requests(true).await.unwrap().value.len(), 2);

    let no_operator = app.service().delete_request(&archive.id, " ").await;
    assert!(matches!(no_operator, Err(FulfillmentError::ValidationError(_))));

    app.service()
        .delete_request(&archive.id, "ops-lead")
        .await
        .unwrap();
    assert_eq!(app.service().list_requests(true).await.unwrap().value.len(), 1);
}

#[tokio::test]
async fn test_remote_outage_is_reported_as_cached() {
    let app = TestApp::spawn().await;
    let request = app
        .service()
        .create_request(local_customer(), vec![])
        .await
        .unwrap()
        .value;

    app.remote.set_down(true);
    let updated = app
        .service()
        .add_item(&request.id, item("Tulle", "3", "90", VendorRef::House))
        .await
        .unwrap();
    assert_eq!(updated.freshness, Freshness::Cached);
    assert_eq!(updated.value.items.len(), 1);

    let listed = app.service().list_requests(false).await.unwrap();
    assert_eq!(listed.freshness, Freshness::Cached);
    assert_eq!(listed.value[0].items.len(), 1);
}

#[tokio::test]
async fn test_quality_catalog_rejects_duplicate_colors() {
    let app = TestApp::spawn().await;
    let quality = app
        .service()
        .create_quality(
            "Rayon slub",
            vec![Color::new(101, "Indigo"), Color::new(102, "Rust")],
        )
        .await
        .unwrap()
        .value;
    assert!(quality.id.starts_with("QUA-"));

    let duplicate = app
        .service()
        .add_color(&quality.id, Color::new(101, "Navy"))
        .await;
    assert!(matches!(
        duplicate,
        Err(FulfillmentError::DuplicateColorNumber { number: 101, .. })
    ));

    let added = app
        .service()
        .add_color(&quality.id, Color::new(103, "Olive"))
        .await
        .unwrap()
        .value;
    assert_eq!(added.colors.len(), 3);

    let invalid = app
        .service()
        .create_quality("Twill", vec![Color::new(1, "Red"), Color::new(1, "Blue")])
        .await;
    assert!(matches!(
        invalid,
        Err(FulfillmentError::DuplicateColorNumber { .. })
    ));
}

#[tokio::test]
async fn test_tax_summary_skips_cancelled_challans() {
    let app = TestApp::spawn().await;
    let mut customer = local_customer();
    customer.region = Some("KA".to_string());

    let mut challan_ids = Vec::new();
    for (day, price) in [(10, "1000"), (11, "2000"), (20, "500")] {
        let request = app
            .service()
            .create_request(
                customer.clone(),
                vec![item("Georgette", "1", price, VendorRef::House)],
            )
            .await
            .unwrap()
            .value;
        let challan = app
            .service()
            .issue_challan_for_request(&request.id, date(day))
            .await
            .unwrap()
            .value;
        challan_ids.push(challan.id().to_string());
    }

    app.service()
        .record_payment(
            &challan_ids[0],
            NewPayment::new(date(12), d("100"), PaymentMethod::Upi),
        )
        .await
        .unwrap();
    app.service().cancel_challan(&challan_ids[1]).await.unwrap();

    let summary = app
        .service()
        .tax_summary(date(1), date(15))
        .await
        .unwrap()
        .value;
    assert_eq!(summary.document_count, 1);
    assert_eq!(summary.taxable_value, d("1000"));

    let bad_period = app.service().tax_summary(date(15), date(1)).await;
    assert!(matches!(bad_period, Err(FulfillmentError::ValidationError(_))));
}

#[tokio::test]
async fn test_challan_export_is_json() {
    let app = TestApp::spawn().await;
    let request = app
        .service()
        .create_request(
            local_customer(),
            vec![item("Chanderi", "4", "250", VendorRef::House)],
        )
        .await
        .unwrap()
        .value;
    let challan = app
        .service()
        .issue_challan_for_request(&request.id, date(8))
        .await
        .unwrap()
        .value;

    let bytes = app.service().export_challan(challan.id()).await.unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["document"], "delivery_challan");
    assert_eq!(doc["number"], challan.challan_number());
    assert_eq!(doc["status"], "pending");
}
