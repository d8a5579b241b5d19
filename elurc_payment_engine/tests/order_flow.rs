use elurc_payment_engine::{
    db_types::{
        ChangedBy,
        DiscrepancyResolution,
        DiscrepancyType,
        ElurcAmount,
        NewOrder,
        OrderStatusType::*,
        PaymentDiscrepancy,
    },
    payments::OrderStatusTransitionError,
    OrderFlowApi,
    OrderFlowError,
    OrderManagement,
    StoreError,
};

mod support;
use support::*;

#[tokio::test]
async fn orders_keep_their_items_and_snapshot_prices() {
    let db = setup().await;
    let api = OrderFlowApi::new(db.clone());
    let order = api.insert_order(new_order("ORD-2001", 10_000_000, recent_time(1))).await.unwrap();
    assert_eq!(order.status, Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].price_snapshot.elurc, ElurcAmount::from(5_000_000));
    assert_eq!(order.status_history.len(), 1);
    assert_eq!(order.status_history[0].changed_by, ChangedBy::System);

    let by_number = db.fetch_order_by_number("ORD-2001").await.unwrap().unwrap();
    assert_eq!(by_number, order);

    let err = api.insert_order(new_order("ORD-2001", 5, recent_time(1))).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Store(StoreError::DuplicateOrder(_))));
    let err = api.insert_order(NewOrder::new("ORD-2002".to_string(), ElurcAmount::from(0), customer_wallet())).await;
    assert!(matches!(err, Err(OrderFlowError::InvalidOrder(_))));
    let err = api.insert_order(NewOrder::new("ORD-2002", ElurcAmount::from(10_000_000), "not-a-wallet")).await;
    assert!(matches!(err, Err(OrderFlowError::InvalidOrder(m)) if m.contains("not-a-wallet")));
    assert!(db.fetch_order_by_number("ORD-2002").await.unwrap().is_none());
    tear_down(db).await;
}

#[tokio::test]
async fn admin_walks_an_order_to_fulfilled() {
    let db = setup().await;
    let api = OrderFlowApi::new(db.clone());
    let order = insert_order(&db, "ORD-2003", 10_000_000, recent_time(1)).await;

    let err = api.modify_status(&order.id, Processing, ChangedBy::Admin, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Transition(OrderStatusTransitionError::Forbidden { .. })));

    api.modify_status(&order.id, Paid, ChangedBy::Admin, Some("Paid by bank transfer".into())).await.unwrap();
    api.modify_status(&order.id, Processing, ChangedBy::Admin, None).await.unwrap();
    let fulfilled = api.modify_status(&order.id, Fulfilled, ChangedBy::Admin, None).await.unwrap();
    assert_eq!(fulfilled.status, Fulfilled);
    assert!(fulfilled.fulfilled_at.is_some());

    let err = api.modify_status(&order.id, Cancelled, ChangedBy::Admin, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Transition(OrderStatusTransitionError::Forbidden { from: Fulfilled, to: Cancelled })));

    let history = api.status_history(&order.id).await.unwrap();
    let statuses = history.iter().map(|h| h.status).collect::<Vec<_>>();
    assert_eq!(statuses, vec![Pending, Paid, Processing, Fulfilled]);
    assert_eq!(history[1].reason.as_deref(), Some("Paid by bank transfer"));
    assert!(history[1..].iter().all(|h| h.changed_by == ChangedBy::Admin));
    tear_down(db).await;
}

#[tokio::test]
async fn status_updates_are_compare_and_swap() {
    let db = setup().await;
    let order = insert_order(&db, "ORD-2004", 10_000_000, recent_time(1)).await;
    let update = elurc_payment_engine::db_types::OrderStatusUpdate::new(Cancelled, ChangedBy::Admin);
    db.update_order_status(&order.id, Pending, update.clone()).await.unwrap();
    let err = db.update_order_status(&order.id, Pending, update).await.unwrap_err();
    match err {
        StoreError::StatusConflict { expected, actual, .. } => {
            assert_eq!(expected, Pending);
            assert_eq!(actual, Cancelled);
        },
        e => panic!("Unexpected error {e}"),
    }
    let order = db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status_history.len(), 2);
    tear_down(db).await;
}

#[tokio::test]
async fn discrepancies_can_be_resolved() {
    let db = setup().await;
    let api = OrderFlowApi::new(db.clone());
    let order = insert_order(&db, "ORD-2005", 10_000_000, recent_time(1)).await;

    let err = api.resolve_discrepancy(&order.id, DiscrepancyResolution::ManuallyApproved, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NoDiscrepancy(_)));

    let discrepancy = PaymentDiscrepancy::detected(ElurcAmount::from(-20_000), DiscrepancyType::Underpayment);
    db.record_discrepancy(&order.id, discrepancy).await.unwrap();
    let resolved = api
        .resolve_discrepancy(&order.id, DiscrepancyResolution::ManuallyApproved, Some("Customer topped up".into()))
        .await
        .unwrap();
    let d = resolved.payment_discrepancy.unwrap();
    assert_eq!(d.resolution, DiscrepancyResolution::ManuallyApproved);
    assert_eq!(d.notes.as_deref(), Some("Customer topped up"));
    assert_eq!(d.difference_amount, ElurcAmount::from(-20_000));
    assert_eq!(d.discrepancy_type, DiscrepancyType::Underpayment);

    let underpaid = api.modify_status(&order.id, Underpaid, ChangedBy::Admin, None).await.unwrap();
    assert_eq!(underpaid.status, Underpaid);
    tear_down(db).await;
}
