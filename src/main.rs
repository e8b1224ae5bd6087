use axum::routing::{delete, get, post};
use axum::Router;
use paymill_connector::config::AppConfig;
use paymill_connector::erp::pg::{PgInvoiceStore, PgLedger, PgOrderStore};
use paymill_connector::gateways::paymill::PaymillRestClient;
use paymill_connector::repo::offers_repo::PgOffersRepo;
use paymill_connector::repo::subscription_transactions_repo::PgSubscriptionTransactionsRepo;
use paymill_connector::repo::subscriptions_repo::PgSubscriptionsRepo;
use paymill_connector::service::offer_service::OfferService;
use paymill_connector::service::payment_service::PaymentService;
use paymill_connector::service::subscription_service::SubscriptionService;
use paymill_connector::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let api = Arc::new(PaymillRestClient::new(
        cfg.paymill_base_url.clone(),
        cfg.api.private_key().to_string(),
    ));

    let orders = Arc::new(PgOrderStore { pool: pool.clone() });
    let invoices = Arc::new(PgInvoiceStore { pool: pool.clone() });
    let ledger = Arc::new(PgLedger { pool: pool.clone() });
    let offers_repo = Arc::new(PgOffersRepo { pool: pool.clone() });
    let subscriptions_repo = Arc::new(PgSubscriptionsRepo { pool: pool.clone() });
    let transactions_repo = Arc::new(PgSubscriptionTransactionsRepo { pool: pool.clone() });

    let payment_service = PaymentService {
        api: api.clone(),
        orders: orders.clone(),
        ledger: ledger.clone(),
        config: cfg.clone(),
    };

    let offer_service = OfferService {
        api: api.clone(),
        offers: offers_repo,
        config: cfg.clone(),
    };

    let subscription_service = SubscriptionService::new(
        api,
        orders,
        invoices,
        ledger,
        subscriptions_repo,
        transactions_repo,
        offer_service.clone(),
        cfg.clone(),
        "paymill".to_string(),
    );

    let billing = subscription_service.clone();
    let billing_interval = Duration::from_secs(cfg.billing_interval_secs);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(billing_interval);
        loop {
            tick.tick().await;
            if let Err(e) = billing.process_unpaid_invoices().await {
                tracing::error!("billing run failed: {e:#}");
            }
        }
    });

    let state = AppState {
        payment_service,
        offer_service,
        subscription_service,
        api_config: cfg.api.clone(),
    };

    let app = Router::new()
        .route("/health", get(paymill_connector::http::handlers::provider::health))
        .route("/checkout", post(paymill_connector::http::handlers::checkout::checkout))
        .route(
            "/recurring/checkout",
            post(paymill_connector::http::handlers::checkout::recurring_checkout),
        )
        .route(
            "/recurring/confirm",
            get(paymill_connector::http::handlers::checkout::confirm_subscription_data),
        )
        .route(
            "/recurring/offers",
            get(paymill_connector::http::handlers::offers::list_offers),
        )
        .route(
            "/recurring/offers/:id",
            delete(paymill_connector::http::handlers::offers::delete_offer),
        )
        .route(
            "/recurring/subscriptions",
            get(paymill_connector::http::handlers::subscriptions::list_subscriptions),
        )
        .route(
            "/recurring/subscriptions/:id",
            get(paymill_connector::http::handlers::subscriptions::get_subscription)
                .delete(paymill_connector::http::handlers::subscriptions::cancel_subscription),
        )
        .route(
            "/provider/public-key",
            get(paymill_connector::http::handlers::provider::public_key),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
