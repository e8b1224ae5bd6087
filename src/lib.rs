pub mod config;
pub mod domain {
    pub mod interval;
    pub mod invoice;
    pub mod ledger;
    pub mod money;
    pub mod order;
}
pub mod erp;
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod checkout;
        pub mod offers;
        pub mod provider;
        pub mod subscriptions;
    }
}
pub mod repo;
pub mod service {
    pub mod offer_service;
    pub mod payment_service;
    pub mod subscription_service;
}

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub offer_service: service::offer_service::OfferService,
    pub subscription_service: service::subscription_service::SubscriptionService,
    pub api_config: config::ApiConfig,
}
