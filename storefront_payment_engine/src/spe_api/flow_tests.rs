//! End-to-end exercises of the payment flows against the in-memory backend and the scripted gateway.
use serde_json::json;
use spg_common::Gel;

use crate::{
    db_types::{LineItem, NewOrder, OrderId, OrderStatusType, PaymentStatus},
    events::EventProducers,
    spe_api::payment_flow_api::PaymentFlowApi,
    status::PaymentUpdate,
    test_utils::{MemoryDatabase, ScriptedGateway},
    traits::{GatewayClientError, PaymentGatewayDatabase, RemoteStatus},
    PaymentFlowError,
};

fn order_of(id: &str, total_gel: i64) -> NewOrder {
    let items = vec![LineItem {
        product_id: "khv-1".to_string(),
        name: "Khinkali (10)".to_string(),
        size_kg: None,
        quantity: 1,
        unit_price: Gel::from_gel(total_gel),
    }];
    NewOrder::new(
        OrderId(id.to_string()),
        "Nino".to_string(),
        "Beridze".to_string(),
        "+995555123456".to_string(),
        items,
    )
}

fn update_of(id: &str, status: &str) -> PaymentUpdate {
    PaymentUpdate {
        order_id: OrderId(id.to_string()),
        gateway_order_id: Some(format!("gw-{id}")),
        transaction_id: Some(format!("tx-{id}")),
        amount: None,
        status_text: status.to_string(),
        payment_method: Some("card".to_string()),
        refund_actions: vec![],
        raw: json!({"order_status": status}),
    }
}

fn refund_update(id: &str, actions: Vec<(&str, i64)>) -> PaymentUpdate {
    let refund_actions = actions
        .iter()
        .filter_map(|(kind, gel)| crate::status::classify_action(kind, Gel::from_gel(*gel)))
        .collect();
    PaymentUpdate {
        order_id: OrderId(id.to_string()),
        transaction_id: None,
        refund_actions,
        ..update_of(id, "refunded")
    }
}

fn api() -> (PaymentFlowApi<MemoryDatabase, ScriptedGateway>, MemoryDatabase, ScriptedGateway) {
    let db = MemoryDatabase::new();
    let gateway = ScriptedGateway::new();
    let api = PaymentFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    (api, db, gateway)
}

#[tokio::test]
async fn order_creation_opens_a_checkout_session() {
    let (api, _db, gateway) = api();
    let summary = api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    assert_eq!(summary.order.status, OrderStatusType::Pending);
    assert_eq!(summary.gateway_order_id, "gw-ord-1");
    assert!(summary.payment_url.contains("gw-ord-1"));
    assert_eq!(gateway.checkout_calls(), 1);

    let err = api.initiate_order(order_of("ord-1", 40)).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::OrderAlreadyExists(_)));
}

#[tokio::test]
async fn checkout_failure_keeps_the_order_pending() {
    let (api, db, gateway) = api();
    gateway.fail_checkouts_with(GatewayClientError::Unavailable("connection refused".to_string()));
    let err = api.initiate_order(order_of("ord-1", 40)).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::GatewayError(_)));
    let order = db.fetch_order_by_id(&OrderId("ord-1".to_string())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(order.gateway_order_id.is_none());
}

#[tokio::test]
async fn inconsistent_totals_are_rejected() {
    let (api, _db, _gateway) = api();
    let mut order = order_of("ord-1", 40);
    order.total_price = Gel::from_gel(35);
    let err = api.initiate_order(order).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidOrder(_, _)));
}

#[tokio::test]
async fn successful_webhook_marks_the_order_paid_exactly_once() {
    let (api, db, _gateway) = api();
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();

    let updated = api.process_payment_update(update_of("ord-1", "success")).await.unwrap().unwrap();
    assert_eq!(updated.status, OrderStatusType::Paid);
    assert!(updated.notification_sent);

    // A replay is recorded but changes nothing.
    let replay = api.process_payment_update(update_of("ord-1", "success")).await.unwrap();
    assert!(replay.is_none());
    assert_eq!(db.payment_count(), 1);
}

#[tokio::test]
async fn failed_payment_can_still_succeed_on_retry() {
    let (api, _db, _gateway) = api();
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    let failed = api.process_payment_update(update_of("ord-1", "rejected")).await.unwrap().unwrap();
    assert_eq!(failed.status, OrderStatusType::Failed);
    let paid = api.process_payment_update(update_of("ord-1", "PERFORMED")).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn late_paid_webhook_does_not_regress_fulfilment() {
    let (api, _db, _gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    api.process_payment_update(update_of("ord-1", "success")).await.unwrap();
    api.advance_order(&oid, OrderStatusType::Preparing).await.unwrap();

    let result = api.process_payment_update(update_of("ord-1", "success")).await.unwrap();
    assert!(result.is_none());
    assert_eq!(api.fetch_order(&oid).await.unwrap().status, OrderStatusType::Preparing);
}

#[tokio::test]
async fn unknown_statuses_are_recorded_without_moving_the_order() {
    let (api, db, _gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    let result = api.process_payment_update(update_of("ord-1", "in_limbo")).await.unwrap();
    assert!(result.is_none());
    assert_eq!(api.fetch_order(&oid).await.unwrap().status, OrderStatusType::Pending);
    let payments = db.fetch_payments_for_order(&oid).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
}

#[tokio::test]
async fn admin_cannot_set_payment_statuses() {
    let (api, _db, _gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    let err = api.advance_order(&oid, OrderStatusType::Paid).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidStatusChange { .. }));
    // A pending order cannot be sent to the kitchen either.
    let err = api.advance_order(&oid, OrderStatusType::Preparing).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidStatusChange { .. }));
}

#[tokio::test]
async fn partial_then_full_refund_settles_in_two_rounds() {
    let (api, _db, gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    api.process_payment_update(update_of("ord-1", "success")).await.unwrap();

    // Round one: refund 15 of 40. The gateway accepts, so the order settles straight away.
    let result = api.refund(&oid, Some(Gel::from_gel(15)), "manager").await.unwrap();
    assert_eq!(result.order.status, OrderStatusType::RefundedPartially);
    assert!(!result.manual_mode);
    let detail = result.order.refund_detail.clone().unwrap();
    assert_eq!(detail.refunded_amount, Gel::from_gel(15));
    assert_eq!(detail.requested_amount, None);
    assert_eq!(result.order.refundable_amount(), Gel::from_gel(25));
    let recorded = gateway.last_refund().unwrap();
    assert_eq!(recorded.amount, Some(Gel::from_gel(15)));

    // The gateway's own settlement notification arrives later and changes nothing.
    let echo = api.process_payment_update(refund_update("ord-1", vec![("refund", 15)])).await.unwrap();
    assert!(echo.is_none());
    let order = api.fetch_order(&oid).await.unwrap();
    assert_eq!(order.refund_detail.unwrap().refunded_amount, Gel::from_gel(15));

    // Round two: a full-refund request covers the remaining 25.
    let result = api.refund(&oid, None, "manager").await.unwrap();
    assert_eq!(result.amount, Gel::from_gel(25));
    assert_eq!(result.order.status, OrderStatusType::Refunded);
    assert_eq!(result.order.refund_detail.unwrap().refunded_amount, Gel::from_gel(40));
    let recorded = gateway.last_refund().unwrap();
    assert_ne!(recorded.idempotency_key, "");
}

#[tokio::test]
async fn refund_preconditions_are_checked_in_order() {
    let (api, db, _gateway) = api();
    let oid = OrderId("ord-1".to_string());

    let err = api.refund(&oid, None, "manager").await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::OrderNotFound(_)));

    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    let err = api.refund(&oid, None, "manager").await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::OrderNotRefundable { .. }));

    api.process_payment_update(update_of("ord-1", "success")).await.unwrap();
    let err = api.refund(&oid, Some(Gel::from_gel(50)), "manager").await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidRefundAmount(_)));
    let err = api.refund(&oid, Some(Gel::default()), "manager").await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidRefundAmount(_)));

    db.backdate_order(&oid, 8);
    let err = api.refund(&oid, Some(Gel::from_gel(10)), "manager").await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::RefundWindowExpired { .. }));
}

#[tokio::test]
async fn unreachable_gateway_queues_a_manual_refund() {
    let (api, _db, gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    api.process_payment_update(update_of("ord-1", "success")).await.unwrap();

    gateway.fail_refunds_with(GatewayClientError::RefundUnsupported("404 at every candidate".to_string()));
    let result = api.refund(&oid, None, "manager").await.unwrap();
    assert!(result.manual_mode);
    assert_eq!(result.order.status, OrderStatusType::RefundPending);
    let detail = result.order.refund_detail.unwrap();
    assert!(detail.manual_mode);
    assert_eq!(detail.requested_amount, Some(Gel::from_gel(40)));
    assert_eq!(detail.refunded_by.as_deref(), Some("manager"));
}

#[tokio::test]
async fn a_manual_refund_can_be_retried_once_the_gateway_recovers() {
    let (api, _db, gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    api.process_payment_update(update_of("ord-1", "success")).await.unwrap();

    gateway.fail_refunds_with(GatewayClientError::Unavailable("connection refused".to_string()));
    let queued = api.refund(&oid, None, "manager").await.unwrap();
    assert!(queued.manual_mode);
    assert_eq!(queued.order.status, OrderStatusType::RefundPending);

    gateway.restore_refunds();
    let result = api.refund(&oid, None, "manager").await.unwrap();
    assert!(!result.manual_mode);
    assert_eq!(result.order.status, OrderStatusType::Refunded);
    let detail = result.order.refund_detail.unwrap();
    assert_eq!(detail.refunded_amount, Gel::from_gel(40));
    assert!(!detail.manual_mode);
    assert_eq!(gateway.refund_calls(), 2);
}

#[tokio::test]
async fn rejected_refund_is_an_error_and_changes_nothing() {
    let (api, _db, gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    api.process_payment_update(update_of("ord-1", "success")).await.unwrap();

    gateway.fail_refunds_with(GatewayClientError::Rejected { status: 422, message: "already refunded".to_string() });
    let err = api.refund(&oid, None, "manager").await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::GatewayError(GatewayClientError::Rejected { .. })));
    let order = api.fetch_order(&oid).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert!(order.refund_detail.is_none());
}

#[tokio::test]
async fn sync_repairs_a_lost_webhook() {
    let (api, _db, gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    api.initiate_order(order_of("ord-2", 20)).await.unwrap();

    gateway.set_remote_status(
        "gw-ord-1",
        RemoteStatus { status_text: "performed".to_string(), raw: json!({"order_status": "performed"}) },
    );
    gateway.set_remote_status(
        "gw-ord-2",
        RemoteStatus { status_text: "created".to_string(), raw: json!({"order_status": "created"}) },
    );

    let report = api.sync_orders().await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert!(report.failures.is_empty());
    assert_eq!(api.fetch_order(&oid).await.unwrap().status, OrderStatusType::Paid);

    // A second pass re-examines both (paid orders stay in scope for late reversals) but moves nothing.
    let report = api.sync_orders().await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.updated, 0);
    assert_eq!(report.unchanged, 2);
}

#[tokio::test]
async fn sync_reports_gateway_failures_per_order() {
    let (api, _db, gateway) = api();
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    gateway.fail_status_queries_with(GatewayClientError::Unavailable("timeout".to_string()));
    let report = api.sync_orders().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, OrderId("ord-1".to_string()));
}

#[tokio::test]
async fn sync_confirms_a_pending_refund() {
    let (api, _db, gateway) = api();
    let oid = OrderId("ord-1".to_string());
    api.initiate_order(order_of("ord-1", 40)).await.unwrap();
    api.process_payment_update(update_of("ord-1", "success")).await.unwrap();
    gateway.fail_refunds_with(GatewayClientError::Unavailable("timeout".to_string()));
    api.refund(&oid, None, "manager").await.unwrap();
    assert_eq!(api.fetch_order(&oid).await.unwrap().status, OrderStatusType::RefundPending);

    gateway.set_remote_status(
        "gw-ord-1",
        RemoteStatus {
            status_text: "refunded".to_string(),
            raw: json!({"order_status": "refunded", "actions": [{"action_type": "refund", "amount": "40.00"}]}),
        },
    );
    let report = api.sync_orders().await.unwrap();
    assert_eq!(report.updated, 1);
    let order = api.fetch_order(&oid).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Refunded);
    assert_eq!(order.refund_detail.unwrap().refunded_amount, Gel::from_gel(40));
}
