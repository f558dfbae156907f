use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use flora_settlement_engine::{OrderApi, SettlementApi, SettlementConfig, SqliteDatabase, WalletApi};
use log::info;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::refunds::{HttpRefundProvider, RefundProvider},
    payment_routes,
    refund_worker::start_refund_worker,
    routes,
    routes::health,
    settlement_worker::start_settlement_worker,
};

const REFUND_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let settlement_config = SettlementConfig { commission_rate_bps: config.commission_rate_bps };
    start_settlement_worker(
        SettlementApi::new(db.clone(), settlement_config),
        config.auto_complete_after,
        config.worker_interval_secs,
    );
    let refund_provider: Arc<dyn RefundProvider> =
        Arc::new(HttpRefundProvider::new(&config.refund.endpoint, REFUND_REQUEST_TIMEOUT)?);
    start_refund_worker(
        SettlementApi::new(db.clone(), settlement_config),
        refund_provider,
        config.refund.clone(),
        config.worker_interval_secs,
    );
    info!("💻️ Background workers started");

    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Registers all application data and routes. Shared between the production server and the
/// endpoint tests.
pub fn configure_app(cfg: &mut web::ServiceConfig, db: &SqliteDatabase, config: &ServerConfig) {
    let settlement_config = SettlementConfig { commission_rate_bps: config.commission_rate_bps };
    cfg.app_data(web::Data::new(SettlementApi::new(db.clone(), settlement_config)))
        .app_data(web::Data::new(OrderApi::new(db.clone())))
        .app_data(web::Data::new(WalletApi::new(db.clone())))
        .app_data(web::Data::new(config.providers.clone()))
        .app_data(web::Data::new(ServerOptions::from_config(config)))
        .service(health)
        .service(web::resource("/callback/vnpay").route(web::get().to(payment_routes::vnpay_callback::<SqliteDatabase>)))
        .service(web::resource("/webhook/payos").route(web::post().to(payment_routes::payos_webhook::<SqliteDatabase>)))
        .service(
            web::resource("/orders")
                .route(web::post().to(routes::create_order::<SqliteDatabase>))
                .route(web::get().to(routes::search_orders::<SqliteDatabase>)),
        )
        .service(web::resource("/orders/{order_id}").route(web::get().to(routes::order_details::<SqliteDatabase>)))
        .service(
            web::resource("/orders/{order_id}/status")
                .route(web::post().to(routes::update_order_status::<SqliteDatabase>)),
        )
        .service(
            web::resource("/orders/{order_id}/review").route(web::post().to(routes::submit_review::<SqliteDatabase>)),
        )
        .service(web::resource("/wallets/{farmer_id}").route(web::get().to(routes::wallet_balance::<SqliteDatabase>)))
        .service(
            web::resource("/wallets/{farmer_id}/entries")
                .route(web::get().to(routes::wallet_entries::<SqliteDatabase>)),
        );
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let bind_address = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fpg::access_log"))
            .configure(|cfg| configure_app(cfg, &db, &config))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(bind_address)?
    .run();
    Ok(srv)
}
