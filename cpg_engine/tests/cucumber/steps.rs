use cpg_engine::{
    db_types::{Money, OrderStatusType, TransactionId},
    CartManagement,
    CheckoutError,
    PaymentContext,
};
use cucumber::{then, when};

use crate::cucumber::CheckoutWorld;

#[when(expr = "{word} places a cash-on-delivery order")]
async fn cod_order(world: &mut CheckoutWorld, name: String) {
    let system = world.system();
    let user_id = system.customer(&name).id;
    let result = system.api.materialize(Some(user_id), PaymentContext::CashOnDelivery).await;
    world.last_result = Some(result);
}

#[when(expr = "the gateway confirms transaction {word} for {word} paid by {word}")]
async fn gateway_confirms(world: &mut CheckoutWorld, txn: String, amount: String, email: String) {
    let system = world.system();
    let txn_id = TransactionId::from(txn);
    let result = match system.api.resolve_payer(&txn_id, &email).await {
        Ok(payer) => system.api.materialize(payer, PaymentContext::gateway(txn_id, None, amount)).await,
        Err(e) => Err(e),
    };
    world.last_result = Some(result);
}

#[then(expr = "the order is {word} with a total of {word}")]
async fn order_status_and_total(world: &mut CheckoutWorld, status: String, total: String) {
    let order = world.last_order();
    let expected_status = status.parse::<OrderStatusType>().expect("status");
    let expected_total = total.parse::<Money>().expect("total");
    assert_eq!(order.status, expected_status);
    assert_eq!(order.total_amount, expected_total);
}

#[then(expr = "the order belongs to {word}")]
async fn order_owner(world: &mut CheckoutWorld, name: String) {
    let user_id = world.system().customer(&name).id;
    assert_eq!(world.last_order().user_id, Some(user_id));
}

#[then(expr = "an unattributed order is recorded for {word}")]
async fn unattributed_order(world: &mut CheckoutWorld, total: String) {
    let order = world.last_order();
    assert!(order.is_unattributed());
    assert!(order.items.is_empty());
    assert_eq!(order.total_amount, total.parse::<Money>().expect("total"));
}

#[then(expr = "the order fails because {string}")]
async fn order_fails(world: &mut CheckoutWorld, reason: String) {
    match &world.last_result {
        Some(Err(e)) => {
            let matched = match reason.as_str() {
                "the cart is empty" => matches!(e, CheckoutError::EmptyCart),
                "there is no address" => matches!(e, CheckoutError::AddressMissing(_)),
                other => panic!("Unknown failure reason in feature file: {other}"),
            };
            assert!(matched, "Expected failure '{reason}', got {e:?}");
        },
        other => panic!("Expected a failure, got {other:?}"),
    }
}

#[then(expr = "{word}'s cart is empty")]
async fn cart_is_empty(world: &mut CheckoutWorld, name: String) {
    let system = world.system();
    let cart = system.store.db.fetch_cart(system.customer(&name).id).await.expect("cart");
    assert!(cart.is_empty(), "{cart:?}");
}

#[then(expr = "{word}'s cart has {int} line(s)")]
async fn cart_lines(world: &mut CheckoutWorld, name: String, lines: usize) {
    let system = world.system();
    let cart = system.store.db.fetch_cart(system.customer(&name).id).await.expect("cart");
    assert_eq!(cart.len(), lines);
}

#[then(expr = "there is exactly {int} order for transaction {word}")]
async fn orders_for_txn(world: &mut CheckoutWorld, count: i64, txn: String) {
    let n = world.system().store.db.count_orders_for_txn_id(&TransactionId::from(txn)).await.expect("count");
    assert_eq!(n, count);
}
