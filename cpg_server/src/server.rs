use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use cpg_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    OrderFlowApi,
    RequestDeduplicator,
    SqliteDatabase,
    TransactionApi,
};
use log::*;

use crate::{
    auth::TokenVerifier,
    config::{GatewayKeys, GatewayOptions, ServerConfig},
    errors::ServerError,
    expiry_worker::{start_sweeper, SWEEP_INTERVAL},
    routes::{
        gateway_redirect,
        health,
        CreateCodOrderRoute,
        GatewayCallbackRoute,
        InitiatePaymentRoute,
        MyOrdersRoute,
        VerifyPaymentRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;
const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_timeout(&config.database_url, MAX_DB_CONNECTIONS, config.storage_timeout)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, order_created_hooks());
    let producers = handlers.producers();
    handlers.start_handlers();
    let dedup = RequestDeduplicator::new(config.dedup_ttl);
    let _sweeper = start_sweeper(db.clone(), dedup.clone(), config.pending_txn_ttl, SWEEP_INTERVAL);
    let srv = create_server_instance(config, db, dedup, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Paid orders that could not be matched to an account or a cart are logged loudly so that they can be reconciled by
/// hand.
fn order_created_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_created(|ev| {
        Box::pin(async move {
            let order = &ev.order;
            if ev.needs_reconciliation() {
                let owner = order.user_id.map(|id| format!("user #{id}, no items")).unwrap_or_else(|| "no owner".into());
                warn!(
                    "📬️ Order #{} ({}, txn {}, {owner}) needs manual reconciliation",
                    order.id,
                    order.total_amount,
                    order.external_txn_id.as_ref().map(|t| t.as_str()).unwrap_or("-")
                );
            } else {
                info!("📬️ Order #{} created for user #{:?} ({})", order.id, order.user_id, order.payment_method);
            }
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    dedup: RequestDeduplicator,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let keys = GatewayKeys::new(config.gateway.authenticator());
    let options = GatewayOptions::from_config(&config);
    let verifier = TokenVerifier::new(&config.auth);
    let storage_timeout = config.storage_timeout;
    let srv = HttpServer::new(move || {
        let orders_api =
            OrderFlowApi::new(db.clone(), producers.clone()).with_storage_timeout(storage_timeout);
        let transactions_api = TransactionApi::new(db.clone());
        let api_scope = web::scope("/api")
            .service(InitiatePaymentRoute::<SqliteDatabase>::new())
            .service(GatewayCallbackRoute::<SqliteDatabase>::new())
            .service(gateway_redirect)
            .service(VerifyPaymentRoute::<SqliteDatabase>::new())
            .service(CreateCodOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(transactions_api))
            .app_data(web::Data::new(dedup.clone()))
            .app_data(web::Data::new(keys.clone()))
            .app_data(web::Data::new(options.clone()))
            .app_data(web::Data::new(verifier.clone()))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Checkout payment server listening on {}:{}", config.host, config.port);
    Ok(srv)
}
