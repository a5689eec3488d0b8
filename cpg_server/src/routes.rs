//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two belong in a separate module
//! (see [`crate::callbacks`]). Keep this module neat and tidy 🙏
//!
//! Every handler is async and every storage call is awaited, so a slow database never blocks a worker thread.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use cpg_engine::{
    db_types::TransactionId,
    CheckoutDatabase,
    OrderFlowApi,
    PaymentContext,
    PaymentRequest,
    PendingTransactions,
    RequestDeduplicator,
    TransactionApi,
};
use log::*;

use crate::{
    auth::{AuthenticatedUser, OptionalUser},
    callbacks::{classify_browser_redirect, process_server_callback, CallbackOutcome},
    config::{GatewayKeys, GatewayOptions},
    data_objects::{
        BrowserRedirectQuery,
        GatewayCallbackForm,
        OrderResponse,
        PaymentInitiationRequest,
        PaymentInitiationResponse,
        VerifyPaymentRequest,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initiate_payment => Post "/payment/gateway/create" impl PendingTransactions);
/// Opens a gateway transaction and returns the signed fields the storefront posts to the gateway.
///
/// The caller may be signed in or anonymous. Identical requests (same caller, same amount) inside the
/// deduplication window are refused with `429 Too Many Requests` and a `Retry-After` header.
pub async fn initiate_payment<B: PendingTransactions>(
    body: Result<web::Json<PaymentInitiationRequest>, actix_web::Error>,
    user: OptionalUser,
    keys: web::Data<GatewayKeys>,
    options: web::Data<GatewayOptions>,
    dedup: web::Data<RequestDeduplicator>,
    api: web::Data<TransactionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let body = body.map_err(|e| {
        debug!("💻️ Could not read payment initiation request. {e}");
        ServerError::InvalidRequestBody(format!("Invalid request body. {e}"))
    })?;
    let request = body.into_inner().validate()?;
    let authenticator = keys.authenticator().ok_or_else(|| {
        error!("💻️ Payment initiation requested, but the gateway credentials are not configured");
        ServerError::ConfigurationMissing("Payment gateway keys not configured on server".into())
    })?;
    let identity = user.id().map(|id| id.to_string()).unwrap_or_else(|| request.email.to_lowercase());
    if dedup.check_and_record(&identity, &request.amount) {
        info!("💻️ Refusing duplicate payment initiation for {identity}");
        return Err(ServerError::DuplicateRequest { retry_after: options.retry_after_secs });
    }
    let payment = PaymentRequest {
        amount: request.amount.clone(),
        payer_name: request.name,
        payer_email: request.email,
        payer_phone: request.phone,
        product_info: options.product_info.clone(),
        user_id: user.id(),
    };
    let signed = api.initiate(authenticator, payment).await.map_err(|e| {
        // Nothing was opened, so the customer may retry straight away
        dedup.forget(&identity, &request.amount);
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(PaymentInitiationResponse::new(signed, &options.urls)))
}

route!(gateway_callback => Post "/payment/gateway/callback" impl CheckoutDatabase);
/// The gateway's signed server-to-server notification. Always answers with a redirect to the storefront.
pub async fn gateway_callback<B: CheckoutDatabase>(
    req: HttpRequest,
    form: Result<web::Form<GatewayCallbackForm>, actix_web::Error>,
    keys: web::Data<GatewayKeys>,
    options: web::Data<GatewayOptions>,
    api: web::Data<OrderFlowApi<B>>,
) -> HttpResponse {
    let outcome = match (form, options.ip_whitelist.as_ref()) {
        (Err(e), _) => {
            warn!("💻️ Could not read gateway callback. {e}");
            CallbackOutcome::failure(None, None, "Invalid callback data")
        },
        (Ok(form), Some(whitelist)) => {
            let ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
            match ip {
                Some(ip) if whitelist.contains(&ip) => {
                    process_server_callback(form.into_inner(), keys.authenticator(), api.as_ref()).await
                },
                _ => {
                    warn!("💻️ Gateway callback from {ip:?} is not on the whitelist. Ignoring it.");
                    CallbackOutcome::failure(form.txnid.as_deref(), form.status.as_deref(), "Unauthorized callback source")
                },
            }
        },
        (Ok(form), None) => process_server_callback(form.into_inner(), keys.authenticator(), api.as_ref()).await,
    };
    outcome.into_response(&options.urls)
}

/// The customer's browser returning from the gateway. Unsigned, so it only decides which page to show.
#[get("/payment/gateway/callback")]
pub async fn gateway_redirect(
    query: Result<web::Query<BrowserRedirectQuery>, actix_web::Error>,
    options: web::Data<GatewayOptions>,
) -> HttpResponse {
    let outcome = match query {
        Ok(q) => classify_browser_redirect(&q),
        Err(e) => {
            warn!("💻️ Could not read gateway redirect. {e}");
            CallbackOutcome::failure(None, None, "Invalid callback data")
        },
    };
    outcome.into_response(&options.urls)
}

route!(verify_payment => Post "/payment/verify" impl CheckoutDatabase);
/// Lets a signed-in customer claim a gateway transaction they initiated, creating the order if the server callback
/// has not done so already.
pub async fn verify_payment<B: CheckoutDatabase>(
    user: AuthenticatedUser,
    body: Result<web::Json<VerifyPaymentRequest>, actix_web::Error>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let txn_id = body
        .ok()
        .and_then(|b| b.into_inner().txnid)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::InvalidRequestBody("Missing txnid".into()))?;
    debug!("💻️ User #{} is claiming transaction {txn_id}", user.id());
    let order = api.claim_transaction(&TransactionId::from(txn_id), user.id()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::new(order)))
}

route!(create_cod_order => Post "/payment/cod/create" impl CheckoutDatabase);
pub async fn create_cod_order<B: CheckoutDatabase>(
    user: AuthenticatedUser,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ Cash-on-delivery order requested by user #{}", user.id());
    let order = api.materialize(Some(user.id()), PaymentContext::CashOnDelivery).await?;
    Ok(HttpResponse::Ok()
        .json(OrderResponse::with_message(order, "Order placed successfully. You will pay when the order is delivered.")))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl CheckoutDatabase);
/// The signed-in customer's orders, newest first.
pub async fn my_orders<B: CheckoutDatabase>(
    user: AuthenticatedUser,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for user #{}", user.id());
    let orders = api.orders_for_user(user.id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}
