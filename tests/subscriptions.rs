use paymill_connector::config::{ApiConfig, ApiMode, AppConfig};
use paymill_connector::domain::interval::{Interval, IntervalUnit};
use paymill_connector::domain::order::{Article, Customer, Order, PaymentData, PlanDetails};
use paymill_connector::erp::memory::{MemoryInvoiceStore, MemoryLedger, MemoryOrderStore};
use paymill_connector::error::Error;
use paymill_connector::gateways::mock::MockPaymillApi;
use paymill_connector::gateways::{GatewaySubscription, SubscriptionStatus};
use paymill_connector::repo::memory::{
    MemoryOffersStore, MemorySubscriptionTransactionsStore, MemorySubscriptionsStore,
};
use paymill_connector::repo::SubscriptionRow;
use paymill_connector::service::offer_service::OfferService;
use paymill_connector::service::subscription_service::SubscriptionService;
use std::sync::Arc;

#[tokio::test]
async fn create_subscription_builds_offer_payment_and_mirror_row() {
    let (service, api, fixtures) = setup(vec![plan_order("o-1")], Vec::new());

    let id = service.create_subscription("o-1", "tok_abc").await.unwrap();

    assert_eq!(api.call_count("create_offer"), 1);
    assert_eq!(api.call_count("create_payment_method"), 1);
    assert_eq!(api.call_count("create_subscription"), 1);

    let rows = fixtures.subscriptions.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].paymill_subscription_id, id);
    assert!(rows[0].active);
    assert_eq!(rows[0].global_process_id, "o-1");

    let order = fixtures.orders.orders.lock().unwrap().get("o-1").cloned().unwrap();
    assert_eq!(order.payment_data.subscription_id.as_deref(), Some(id.as_str()));
    assert!(order.successful);
}

#[tokio::test]
async fn create_subscription_is_idempotent_per_order() {
    let (service, api, fixtures) = setup(vec![plan_order("o-1")], Vec::new());

    let first = service.create_subscription("o-1", "tok_abc").await.unwrap();
    let second = service.create_subscription("o-1", "tok_abc").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(api.call_count("create_subscription"), 1);
    assert_eq!(fixtures.subscriptions.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn create_subscription_requires_a_token() {
    let (service, api, _) = setup(vec![plan_order("o-1")], Vec::new());

    let err = service.create_subscription("o-1", "").await.unwrap_err();

    assert!(matches!(err, Error::MissingToken));
    assert_eq!(api.call_count("create_payment_method"), 0);
}

#[tokio::test]
async fn non_recurring_payment_method_is_deleted_again() {
    let (service, api, fixtures) = setup(vec![plan_order("o-1")], Vec::new());
    *api.recurring_eligible.lock().unwrap() = false;

    let err = service.create_subscription("o-1", "tok_abc").await.unwrap_err();

    assert!(matches!(err, Error::NotRecurring));
    assert_eq!(api.call_count("delete_payment_method"), 1);
    assert_eq!(api.call_count("create_subscription"), 0);
    assert!(fixtures.subscriptions.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_deactivates_locally_only_after_gateway_success() {
    let (service, api, fixtures) = setup(Vec::new(), vec![subscription_row("sub_1", "gp-1", true)]);
    *api.fail_cancel.lock().unwrap() = true;

    let err = service.cancel_subscription("sub_1", None).await.unwrap_err();
    assert!(matches!(err, Error::GatewayApi { .. }));

    // Gateway refused, so the mirror row must stay active for a retry.
    let still_active = fixtures.subscriptions.rows.lock().unwrap()[0].active;
    assert!(still_active);

    *api.fail_cancel.lock().unwrap() = false;
    service.cancel_subscription("sub_1", Some("user request")).await.unwrap();

    let active = fixtures.subscriptions.rows.lock().unwrap()[0].active;
    assert!(!active);
}

#[tokio::test]
async fn cancel_without_local_row_is_a_no_op() {
    let (service, api, _) = setup(Vec::new(), Vec::new());

    service.cancel_subscription("sub_unknown", None).await.unwrap();
    assert_eq!(api.call_count("cancel_subscription"), 0);
}

#[tokio::test]
async fn inactive_row_is_not_cancelled_twice() {
    let (service, api, _) = setup(Vec::new(), vec![subscription_row("sub_1", "gp-1", false)]);

    service.cancel_subscription("sub_1", None).await.unwrap();
    assert_eq!(api.call_count("cancel_subscription"), 0);
}

#[tokio::test]
async fn subscription_details_come_from_the_gateway() {
    let (service, api, _) = setup(Vec::new(), Vec::new());
    *api.subscription.lock().unwrap() = Some(gateway_subscription("sub_1", SubscriptionStatus::Active));

    let details = service.get_subscription_details("sub_1").await.unwrap();
    assert_eq!(details.id, "sub_1");

    assert!(service.is_subscription_active_at_gateway("sub_1").await.unwrap());

    *api.subscription.lock().unwrap() =
        Some(gateway_subscription("sub_1", SubscriptionStatus::Canceled));
    assert!(!service.is_subscription_active_at_gateway("sub_1").await.unwrap());
}

#[tokio::test]
async fn local_only_deactivation_and_lookups() {
    let (service, _, fixtures) = setup(
        Vec::new(),
        vec![
            subscription_row("sub_1", "gp-1", true),
            subscription_row("sub_2", "gp-2", false),
        ],
    );

    assert_eq!(service.get_subscription_ids(false).await.unwrap(), vec!["sub_1"]);
    assert_eq!(service.get_subscription_ids(true).await.unwrap().len(), 2);

    assert_eq!(
        service.get_subscription_global_process_id("sub_2").await.unwrap(),
        "gp-2"
    );
    let err = service
        .get_subscription_global_process_id("sub_missing")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SubscriptionNotFound { .. }));

    service.set_subscription_as_inactive("sub_1").await.unwrap();
    assert!(!fixtures.subscriptions.rows.lock().unwrap()[0].active);
}

#[tokio::test]
async fn confirm_data_formats_sum_and_interval() {
    let (service, _, _) = setup(vec![plan_order("o-1")], Vec::new());

    let data = service.get_confirm_subscription_data("o-1").await.unwrap();

    assert_eq!(data.sum, "9.90");
    assert_eq!(data.currency, "EUR");
    assert_eq!(data.interval_text, "every month");
}

struct Fixtures {
    orders: Arc<MemoryOrderStore>,
    subscriptions: Arc<MemorySubscriptionsStore>,
}

fn setup(
    orders: Vec<Order>,
    subscriptions: Vec<SubscriptionRow>,
) -> (SubscriptionService, Arc<MockPaymillApi>, Fixtures) {
    let api = Arc::new(MockPaymillApi::new());

    let order_store = Arc::new(MemoryOrderStore::default());
    for order in orders {
        order_store.orders.lock().unwrap().insert(order.hash.clone(), order);
    }

    let subscription_store = Arc::new(MemorySubscriptionsStore::with_rows(subscriptions));
    let offers = Arc::new(MemoryOffersStore::default());

    let offer_service = OfferService {
        api: api.clone(),
        offers,
        config: test_config(),
    };

    let service = SubscriptionService::new(
        api.clone(),
        order_store.clone(),
        Arc::new(MemoryInvoiceStore::default()),
        Arc::new(MemoryLedger::default()),
        subscription_store.clone(),
        Arc::new(MemorySubscriptionTransactionsStore::default()),
        offer_service,
        test_config(),
        "paymill".to_string(),
    );

    (
        service,
        api,
        Fixtures {
            orders: order_store,
            subscriptions: subscription_store,
        },
    )
}

fn subscription_row(id: &str, global_process_id: &str, active: bool) -> SubscriptionRow {
    SubscriptionRow {
        paymill_subscription_id: id.to_string(),
        paymill_offer_id: "offer_1".to_string(),
        paymill_payment_id: "pay_1".to_string(),
        customer: Customer {
            id: "c-1".to_string(),
            name: "Erika Mustermann".to_string(),
            lang: "de".to_string(),
        },
        global_process_id: global_process_id.to_string(),
        active,
    }
}

fn gateway_subscription(id: &str, status: SubscriptionStatus) -> GatewaySubscription {
    GatewaySubscription {
        id: id.to_string(),
        status,
        offer_id: Some("offer_1".to_string()),
        payment_method_id: Some("pay_1".to_string()),
        amount_minor: Some(990),
        currency: Some("EUR".to_string()),
        next_capture_at: None,
        canceled_at: None,
    }
}

fn plan_order(hash: &str) -> Order {
    Order {
        hash: hash.to_string(),
        prefixed_id: format!("ORD-{hash}"),
        currency: "EUR".to_string(),
        price_sum: 9.9,
        customer: Customer {
            id: "c-1".to_string(),
            name: "Erika Mustermann".to_string(),
            lang: "de".to_string(),
        },
        articles: vec![Article {
            product_id: 42,
            title: "Monthly plan".to_string(),
            is_plan: true,
        }],
        plan: Some(PlanDetails {
            invoice_interval: Interval { count: 1, unit: IntervalUnit::Month },
            duration: Interval { count: 12, unit: IntervalUnit::Month },
            auto_extend: true,
        }),
        payment_data: PaymentData::default(),
        history: Vec::new(),
        successful: false,
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: String::new(),
        bind_addr: String::new(),
        paymill_base_url: String::new(),
        billing_interval_secs: 3600,
        transaction_description: "Order {orderId}".to_string(),
        api: ApiConfig {
            mode: ApiMode::Sandbox,
            sandbox_public_key: "pk_test".to_string(),
            sandbox_private_key: "sk_test".to_string(),
            live_public_key: "pk_live".to_string(),
            live_private_key: "sk_live".to_string(),
        },
    }
}
