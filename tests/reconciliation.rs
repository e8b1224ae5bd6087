use chrono::{Duration, Utc};
use paymill_connector::config::{ApiConfig, ApiMode, AppConfig};
use paymill_connector::domain::invoice::Invoice;
use paymill_connector::domain::ledger::{LedgerStatus, LedgerTransaction};
use paymill_connector::domain::order::Customer;
use paymill_connector::erp::memory::{MemoryInvoiceStore, MemoryLedger, MemoryOrderStore};
use paymill_connector::error::Error;
use paymill_connector::gateways::mock::MockPaymillApi;
use paymill_connector::gateways::{GatewayTransaction, TransactionStatus};
use paymill_connector::repo::memory::{
    MemoryOffersStore, MemorySubscriptionTransactionsStore, MemorySubscriptionsStore,
};
use paymill_connector::repo::{SubscriptionRow, SubscriptionTransactionRow};
use paymill_connector::service::offer_service::OfferService;
use paymill_connector::service::subscription_service::{find_matching, SubscriptionService};
use std::sync::Arc;

#[test]
fn matching_is_greedy_and_order_preserving() {
    let rows = vec![
        cached_tx("tran_1", 500, "EUR", 3),
        cached_tx("tran_2", 990, "EUR", 2),
        cached_tx("tran_3", 990, "EUR", 1),
    ];

    // tran_1 is too small, tran_2 is the first that covers the amount.
    assert_eq!(find_matching(&rows, 990, "EUR"), Some(1));
}

#[test]
fn matching_never_crosses_currencies() {
    let rows = vec![
        cached_tx("tran_1", 990, "USD", 2),
        cached_tx("tran_2", 990, "EUR", 1),
    ];

    assert_eq!(find_matching(&rows, 990, "EUR"), Some(1));
    assert_eq!(find_matching(&rows, 990, "GBP"), None);
}

#[test]
fn matching_accepts_overpayment_but_not_partial() {
    let rows = vec![cached_tx("tran_1", 1000, "EUR", 1)];

    assert_eq!(find_matching(&rows, 990, "EUR"), Some(0));
    assert_eq!(find_matching(&rows, 1001, "EUR"), None);
}

#[tokio::test]
async fn billing_settles_an_invoice_from_the_cache() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 9.9, false)]);
    fx.transactions
        .rows
        .lock()
        .unwrap()
        .push(cached_tx("tran_1", 990, "EUR", 1));

    fx.service.bill_subscription_balance("inv-1").await.unwrap();

    let ledger = fx.ledger.all();
    assert_eq!(ledger.len(), 1);
    assert_complete_payment(&ledger[0], "tran_1");

    let cache = fx.transactions.rows.lock().unwrap();
    assert_eq!(cache[0].ledger_transaction_id, Some(ledger[0].id));

    let invoice = fx.invoices.invoices.lock().unwrap().get("inv-1").cloned().unwrap();
    assert_eq!(invoice.ledger_transaction_ids, vec![ledger[0].id]);
}

#[tokio::test]
async fn billing_creates_at_most_one_ledger_transaction_per_call() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 9.9, false)]);
    {
        let mut rows = fx.transactions.rows.lock().unwrap();
        rows.push(cached_tx("tran_1", 990, "EUR", 2));
        rows.push(cached_tx("tran_2", 990, "EUR", 1));
    }

    fx.service.bill_subscription_balance("inv-1").await.unwrap();

    assert_eq!(fx.ledger.all().len(), 1);
    let unlinked = fx
        .transactions
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.ledger_transaction_id.is_none())
        .count();
    assert_eq!(unlinked, 1);
}

#[tokio::test]
async fn empty_cache_triggers_exactly_one_gateway_refresh() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 9.9, false)]);
    fx.api
        .transactions
        .lock()
        .unwrap()
        .push(gateway_tx("tran_9", 990, "EUR", TransactionStatus::Closed));

    fx.service.bill_subscription_balance("inv-1").await.unwrap();

    assert_eq!(fx.api.call_count("list_transactions"), 1);
    assert_eq!(fx.ledger.all().len(), 1);

    // The refresh is memoized, so another invoice of the same subscription
    // in the same run does not hit the gateway again.
    fx.invoices_store(vec![invoice("inv-2", "gp-1", 9.9, false)]);
    fx.service.bill_subscription_balance("inv-2").await.unwrap();
    assert_eq!(fx.api.call_count("list_transactions"), 1);
}

#[tokio::test]
async fn refresh_caches_only_final_states() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 99.0, false)]);
    {
        let mut gw = fx.api.transactions.lock().unwrap();
        gw.push(gateway_tx("tran_1", 990, "EUR", TransactionStatus::Closed));
        gw.push(gateway_tx("tran_2", 990, "EUR", TransactionStatus::Open));
        gw.push(gateway_tx("tran_3", 990, "EUR", TransactionStatus::Pending));
        gw.push(gateway_tx("tran_4", 990, "EUR", TransactionStatus::Failed));
    }

    // Nothing settles the 99.00 invoice, but the refresh still runs.
    fx.service.bill_subscription_balance("inv-1").await.unwrap();

    let cached: Vec<String> = fx
        .transactions
        .rows
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.paymill_transaction_id.clone())
        .collect();
    assert_eq!(cached, vec!["tran_1", "tran_4"]);
    assert!(fx.ledger.all().is_empty());
}

#[tokio::test]
async fn denied_processing_records_the_first_matching_entry_only() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 9.9, false)]);
    {
        let mut rows = fx.transactions.rows.lock().unwrap();
        rows.push(failed_tx("tran_usd", 990, "USD", 4));
        rows.push(failed_tx("tran_small", 500, "EUR", 3));
        rows.push(failed_tx("tran_b", 990, "EUR", 2));
        rows.push(failed_tx("tran_a", 990, "EUR", 1));
    }

    fx.service.process_denied_transactions("inv-1").await.unwrap();

    // The foreign-currency and too-small rows are skipped, and only the
    // oldest covering EUR row produces an entry.
    let ledger = fx.ledger.all();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, LedgerStatus::Error);
    assert_eq!(ledger[0].gateway_transaction_id.as_deref(), Some("tran_b"));
    assert_eq!(ledger[0].currency, "EUR");
    assert_eq!(ledger[0].amount, 9.9);

    let unlinked = fx
        .transactions
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.ledger_transaction_id.is_none())
        .count();
    assert_eq!(unlinked, 3);

    let invoice = fx.invoices.invoices.lock().unwrap().get("inv-1").cloned().unwrap();
    assert_eq!(invoice.ledger_transaction_ids.len(), 1);
}

#[tokio::test]
async fn denied_processing_without_a_match_records_nothing() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 9.9, false)]);
    fx.transactions
        .rows
        .lock()
        .unwrap()
        .push(failed_tx("tran_small", 500, "EUR", 1));

    fx.service.process_denied_transactions("inv-1").await.unwrap();

    assert!(fx.ledger.all().is_empty());
    let invoice = fx.invoices.invoices.lock().unwrap().get("inv-1").cloned().unwrap();
    assert!(invoice.ledger_transaction_ids.is_empty());
}

#[tokio::test]
async fn invoice_without_subscription_id_is_rejected() {
    let fx = setup();
    let mut orphan = invoice("inv-1", "gp-1", 9.9, false);
    orphan.subscription_id = None;
    fx.invoices_store(vec![orphan]);

    let err = fx.service.bill_subscription_balance("inv-1").await.unwrap_err();
    assert!(matches!(err, Error::SubscriptionIdNotFound { .. }));
    assert_eq!(fx.api.call_count("list_transactions"), 0);
    assert!(fx.ledger.all().is_empty());
}

#[tokio::test]
async fn cached_rows_without_a_match_do_not_trigger_a_refresh() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 9.9, false)]);
    fx.transactions
        .rows
        .lock()
        .unwrap()
        .push(cached_tx("tran_small", 500, "EUR", 1));

    fx.service.bill_subscription_balance("inv-1").await.unwrap();

    // The cache has unprocessed rows, so the gateway window is not re-read
    // even though none of them covers the balance.
    assert_eq!(fx.api.call_count("list_transactions"), 0);
    assert!(fx.ledger.all().is_empty());
}

#[tokio::test]
async fn unpaid_invoice_run_settles_known_subscriptions_only() {
    let fx = setup();
    fx.invoices_store(vec![
        invoice("inv-1", "gp-1", 9.9, false),
        invoice("inv-2", "gp-unknown", 9.9, false),
        invoice("inv-3", "gp-1", 9.9, true),
    ]);
    fx.api
        .transactions
        .lock()
        .unwrap()
        .push(gateway_tx("tran_1", 990, "EUR", TransactionStatus::Closed));

    fx.service.process_unpaid_invoices().await.unwrap();

    // Only inv-1 belongs to a mirrored subscription and is unpaid.
    assert_eq!(fx.ledger.all().len(), 1);
    let settled = fx.invoices.invoices.lock().unwrap().get("inv-1").cloned().unwrap();
    assert_eq!(settled.ledger_transaction_ids.len(), 1);

    let untouched = fx.invoices.invoices.lock().unwrap().get("inv-2").cloned().unwrap();
    assert!(untouched.ledger_transaction_ids.is_empty());
}

#[tokio::test]
async fn each_run_refreshes_the_gateway_window_again() {
    let fx = setup();
    fx.invoices_store(vec![invoice("inv-1", "gp-1", 9.9, false)]);

    fx.service.process_unpaid_invoices().await.unwrap();
    assert_eq!(fx.api.call_count("list_transactions"), 1);

    // A new run clears the memo and asks the gateway again.
    fx.api
        .transactions
        .lock()
        .unwrap()
        .push(gateway_tx("tran_1", 990, "EUR", TransactionStatus::Closed));
    fx.service.process_unpaid_invoices().await.unwrap();

    assert_eq!(fx.api.call_count("list_transactions"), 2);
    assert_eq!(fx.ledger.all().len(), 1);
}

struct Fx {
    service: SubscriptionService,
    api: Arc<MockPaymillApi>,
    invoices: Arc<MemoryInvoiceStore>,
    ledger: Arc<MemoryLedger>,
    transactions: Arc<MemorySubscriptionTransactionsStore>,
}

impl Fx {
    fn invoices_store(&self, invoices: Vec<Invoice>) {
        let mut map = self.invoices.invoices.lock().unwrap();
        for invoice in invoices {
            map.insert(invoice.id.clone(), invoice);
        }
    }
}

fn setup() -> Fx {
    let api = Arc::new(MockPaymillApi::new());
    let invoices = Arc::new(MemoryInvoiceStore::default());
    let ledger = Arc::new(MemoryLedger::default());
    let transactions = Arc::new(MemorySubscriptionTransactionsStore::default());

    let subscriptions = Arc::new(MemorySubscriptionsStore::with_rows(vec![SubscriptionRow {
        paymill_subscription_id: "sub_1".to_string(),
        paymill_offer_id: "offer_1".to_string(),
        paymill_payment_id: "pay_1".to_string(),
        customer: Customer {
            id: "c-1".to_string(),
            name: "Erika Mustermann".to_string(),
            lang: "de".to_string(),
        },
        global_process_id: "gp-1".to_string(),
        active: true,
    }]));

    let offer_service = OfferService {
        api: api.clone(),
        offers: Arc::new(MemoryOffersStore::default()),
        config: test_config(),
    };

    let service = SubscriptionService::new(
        api.clone(),
        Arc::new(MemoryOrderStore::default()),
        invoices.clone(),
        ledger.clone(),
        subscriptions,
        transactions.clone(),
        offer_service,
        test_config(),
        "paymill".to_string(),
    );

    Fx {
        service,
        api,
        invoices,
        ledger,
        transactions,
    }
}

fn assert_complete_payment(tx: &LedgerTransaction, gateway_id: &str) {
    assert_eq!(tx.status, LedgerStatus::Complete);
    assert_eq!(tx.gateway_transaction_id.as_deref(), Some(gateway_id));
}

fn invoice(id: &str, global_process_id: &str, outstanding: f64, paid: bool) -> Invoice {
    Invoice {
        id: id.to_string(),
        global_process_id: global_process_id.to_string(),
        currency: "EUR".to_string(),
        outstanding,
        payment_type: "paymill".to_string(),
        subscription_id: Some("sub_1".to_string()),
        paid,
        ledger_transaction_ids: Vec::new(),
    }
}

fn gateway_tx(id: &str, amount_minor: i64, currency: &str, status: TransactionStatus) -> GatewayTransaction {
    GatewayTransaction {
        id: id.to_string(),
        status,
        amount_minor,
        currency: currency.to_string(),
        response_code: Some(20000),
        created_at: Utc::now(),
    }
}

fn failed_tx(id: &str, amount_minor: i64, currency: &str, days_ago: i64) -> SubscriptionTransactionRow {
    let mut row = cached_tx(id, amount_minor, currency, days_ago);
    row.data.status = TransactionStatus::Failed;
    row
}

fn cached_tx(id: &str, amount_minor: i64, currency: &str, days_ago: i64) -> SubscriptionTransactionRow {
    let created = Utc::now() - Duration::days(days_ago);

    SubscriptionTransactionRow {
        paymill_transaction_id: id.to_string(),
        paymill_subscription_id: "sub_1".to_string(),
        data: GatewayTransaction {
            id: id.to_string(),
            status: TransactionStatus::Closed,
            amount_minor,
            currency: currency.to_string(),
            response_code: Some(20000),
            created_at: created,
        },
        transaction_date: created,
        global_process_id: "gp-1".to_string(),
        ledger_transaction_id: None,
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
