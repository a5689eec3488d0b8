use std::{fmt::Debug, future::Future, time::Duration};

use log::*;

use crate::{
    checkout_api::{cart_pricer::price_cart, errors::CheckoutError},
    db_types::{Money, NewOrder, Order, PaymentMethod, TransactionId},
    events::{EventProducers, OrderCreatedEvent},
    traits::{CheckoutDatabase, InsertOrderResult, StorageError},
};

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// How the customer is paying for the order being materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentContext {
    /// A payment the gateway has confirmed. `verified_amount` is the amount string exactly as it was covered by the
    /// verified digest.
    Gateway { txn_id: TransactionId, payment_ref: Option<String>, verified_amount: String },
    CashOnDelivery,
}

impl PaymentContext {
    pub fn gateway<S: Into<String>>(txn_id: TransactionId, payment_ref: Option<String>, verified_amount: S) -> Self {
        Self::Gateway { txn_id, payment_ref, verified_amount: verified_amount.into() }
    }

    pub fn txn_id(&self) -> Option<&TransactionId> {
        match self {
            PaymentContext::Gateway { txn_id, .. } => Some(txn_id),
            PaymentContext::CashOnDelivery => None,
        }
    }

    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentContext::Gateway { .. } => PaymentMethod::Gateway,
            PaymentContext::CashOnDelivery => PaymentMethod::CashOnDelivery,
        }
    }
}

/// What to do with a gateway payment when the payer's cart has nothing payable in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CartlessPayment {
    /// Record the verified amount as an order without items.
    Record,
    Refuse,
}

fn parse_verified_amount(amount: &str) -> Result<Money, CheckoutError> {
    amount.trim().parse::<Money>().map_err(|e| CheckoutError::InvalidAmount(e.to_string()))
}

/// `OrderFlowApi` turns carts into orders.
///
/// For gateway payments it guarantees at most one order per external transaction id, no matter how often or how
/// concurrently the same transaction is delivered. The guarantee rests on the storage uniqueness constraint, so it
/// holds across processes too.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    storage_timeout: Duration,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi (storage timeout {:?})", self.storage_timeout)
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone(), storage_timeout: self.storage_timeout }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, storage_timeout: DEFAULT_STORAGE_TIMEOUT }
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: CheckoutDatabase
{
    /// Materializes the cart of `payer` into an order.
    ///
    /// 1. A gateway payment that already has an order returns that order unchanged. Nothing is re-priced and the cart
    ///    is left alone.
    /// 2. Otherwise the cart is priced from the current catalogue and the saved shipping address is attached.
    ///    Cash-on-delivery fails with [`CheckoutError::EmptyCart`] or [`CheckoutError::AddressMissing`]. A gateway
    ///    payment has already been taken, so it is recorded without an address if there is none, and for the verified
    ///    amount with no items if the cart is empty.
    /// 3. The order is inserted and the cart cleared in one storage transaction. If a concurrent call won the race for
    ///    the same transaction id, its order is returned instead.
    ///
    /// A gateway payment without a payer becomes an unattributed order for the verified amount. Cash-on-delivery
    /// requires a payer.
    ///
    /// [`OrderCreatedEvent`] is published only when this call inserted the order.
    pub async fn materialize(&self, payer: Option<i64>, payment: PaymentContext) -> Result<Order, CheckoutError> {
        self.materialize_with(payer, payment, CartlessPayment::Record).await
    }

    async fn materialize_with(
        &self,
        payer: Option<i64>,
        payment: PaymentContext,
        cartless: CartlessPayment,
    ) -> Result<Order, CheckoutError> {
        if let Some(txn_id) = payment.txn_id() {
            if let Some(existing) = self.bounded("order lookup", self.db.fetch_order_by_txn_id(txn_id)).await? {
                debug!("🔄️ Transaction {txn_id} already has order #{}. Returning it unchanged", existing.id);
                return Ok(existing);
            }
        }
        let new_order = match (payer, &payment) {
            (Some(user_id), _) => match self.order_from_cart(user_id, &payment).await {
                Ok(order) => order,
                Err(CheckoutError::EmptyCart) => match &payment {
                    PaymentContext::Gateway { txn_id, payment_ref, verified_amount } => {
                        // A concurrent delivery may have committed and cleared the cart since the lookup above
                        if let Some(existing) =
                            self.bounded("order lookup", self.db.fetch_order_by_txn_id(txn_id)).await?
                        {
                            return Ok(existing);
                        }
                        if cartless == CartlessPayment::Refuse {
                            return Err(CheckoutError::EmptyCart);
                        }
                        let amount = parse_verified_amount(verified_amount)?;
                        warn!(
                            "🔄️ User #{user_id} paid {amount} under {txn_id} with nothing payable in their cart. \
                             Recording the payment without items"
                        );
                        NewOrder::for_verified_amount(Some(user_id), txn_id.clone(), payment_ref.clone(), amount)
                    },
                    PaymentContext::CashOnDelivery => return Err(CheckoutError::EmptyCart),
                },
                Err(e) => return Err(e),
            },
            (None, PaymentContext::Gateway { txn_id, payment_ref, verified_amount }) => {
                let amount = parse_verified_amount(verified_amount)?;
                warn!(
                    "🔄️ Nobody could be matched to transaction {txn_id}. Recording an unattributed order for {amount}"
                );
                NewOrder::for_verified_amount(None, txn_id.clone(), payment_ref.clone(), amount)
            },
            (None, PaymentContext::CashOnDelivery) => return Err(CheckoutError::PayerRequired),
        };
        match self.persist(new_order, payment.txn_id()).await {
            Ok(InsertOrderResult::Inserted(order)) => {
                info!(
                    "🔄️ Order #{} created for {} ({} {}, {})",
                    order.id,
                    order.user_id.map(|id| format!("user #{id}")).unwrap_or_else(|| "nobody".to_string()),
                    order.total_amount,
                    order.currency,
                    order.payment_method
                );
                self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
                Ok(order)
            },
            Ok(InsertOrderResult::AlreadyExists(order)) => {
                debug!("🔄️ Lost the race for transaction {:?}. Returning order #{}", order.external_txn_id, order.id);
                Ok(order)
            },
            Err(CheckoutError::StorageConflict(txn)) => {
                debug!("🔄️ Insert for {txn} conflicted and the winner was not yet visible. Fetching it again");
                let txn_id = TransactionId::from(txn.as_str());
                self.bounded("order re-fetch", self.db.fetch_order_by_txn_id(&txn_id))
                    .await?
                    .ok_or_else(|| CheckoutError::UpstreamUnavailable(format!("order for {txn} could not be read back")))
            },
            Err(e) => Err(e),
        }
    }

    /// Decides which account a verified gateway payment belongs to.
    ///
    /// The account that initiated the transaction is authoritative. Failing that, the payer email is looked up, and
    /// only an unambiguous match is accepted. `None` means the payment should be recorded as unattributed.
    pub async fn resolve_payer(&self, txn_id: &TransactionId, payer_email: &str) -> Result<Option<i64>, CheckoutError> {
        let pending = self.bounded("pending transaction lookup", self.db.fetch_pending_transaction(txn_id)).await?;
        if let Some(user_id) = pending.as_ref().and_then(|p| p.user_id) {
            trace!("🔄️ Transaction {txn_id} was initiated by user #{user_id}");
            return Ok(Some(user_id));
        }
        let email = payer_email.trim();
        if email.is_empty() {
            return Ok(None);
        }
        let candidates = self.bounded("customer lookup", self.db.fetch_customers_by_email(email)).await?;
        match candidates.as_slice() {
            [customer] => {
                debug!("🔄️ Transaction {txn_id} attributed to user #{} by email", customer.id);
                Ok(Some(customer.id))
            },
            [] => Ok(None),
            many => {
                warn!("🔄️ {} accounts share the payer email of transaction {txn_id}. Not guessing.", many.len());
                Ok(None)
            },
        }
    }

    /// Returns the order for `txn_id` on behalf of the signed-in `user_id`, materializing it from their cart if the
    /// gateway callback has not done so yet.
    ///
    /// The caller must be the one who initiated the transaction: either the initiating account, or for anonymous
    /// initiations, the account whose email matches the payer email. An order that already belongs to someone else is
    /// refused.
    pub async fn claim_transaction(&self, txn_id: &TransactionId, user_id: i64) -> Result<Order, CheckoutError> {
        let mine = self.bounded("order lookup", self.db.fetch_order_by_txn_id_for_user(txn_id, user_id)).await?;
        if let Some(order) = mine {
            return Ok(order);
        }
        if self.bounded("order lookup", self.db.fetch_order_by_txn_id(txn_id)).await?.is_some() {
            warn!("🔄️ User #{user_id} tried to claim transaction {txn_id}, which belongs to another order");
            return Err(CheckoutError::TransactionOwnedByAnotherUser(txn_id.to_string()));
        }
        let pending = self
            .bounded("pending transaction lookup", self.db.fetch_pending_transaction(txn_id))
            .await?
            .ok_or_else(|| CheckoutError::UnknownTransaction(txn_id.to_string()))?;
        let initiated_by_caller = match pending.user_id {
            Some(initiator) => initiator == user_id,
            None => self
                .bounded("customer lookup", self.db.fetch_customer(user_id))
                .await?
                .is_some_and(|c| c.email.trim().eq_ignore_ascii_case(pending.payer_email.trim())),
        };
        if !initiated_by_caller {
            warn!("🔄️ User #{user_id} tried to claim transaction {txn_id} without having initiated it");
            return Err(CheckoutError::UnknownTransaction(txn_id.to_string()));
        }
        // The amount here was only signed, never confirmed by the gateway, so an empty cart is not recorded
        let payment = PaymentContext::gateway(txn_id.clone(), None, pending.amount);
        let order = self.materialize_with(Some(user_id), payment, CartlessPayment::Refuse).await?;
        if order.user_id != Some(user_id) {
            // the server callback got there first and attributed it elsewhere
            return Err(CheckoutError::TransactionOwnedByAnotherUser(txn_id.to_string()));
        }
        Ok(order)
    }

    /// Newest first.
    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, CheckoutError> {
        self.bounded("order history", self.db.fetch_orders_for_user(user_id)).await
    }

    async fn order_from_cart(&self, user_id: i64, payment: &PaymentContext) -> Result<NewOrder, CheckoutError> {
        let lines = self.bounded("cart lookup", self.db.fetch_cart(user_id)).await?;
        let mut product_ids = lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
        product_ids.sort_unstable();
        product_ids.dedup();
        let catalogue = self.bounded("pricing lookup", self.db.fetch_product_pricing(&product_ids)).await?;
        let priced = price_cart(&lines, &catalogue)?;
        let address = self.bounded("address lookup", self.db.fetch_shipping_address(user_id)).await?;
        let mut order = NewOrder::new(user_id, priced.items, priced.total, payment.method());
        let order = match payment {
            PaymentContext::Gateway { txn_id, payment_ref, verified_amount } => {
                if address.is_none() {
                    warn!("🔄️ User #{user_id} has no saved shipping address. Recording {txn_id} without one");
                }
                order.shipping_address = address;
                if verified_amount.trim().parse::<Money>().ok() != Some(priced.total) {
                    warn!(
                        "🔄️ Cart for user #{user_id} now totals {}, but {verified_amount} was paid under {txn_id}. \
                         Recording the cart total.",
                        priced.total
                    );
                }
                order.with_transaction(txn_id.clone(), payment_ref.clone())
            },
            PaymentContext::CashOnDelivery => {
                order.with_shipping_address(address.ok_or(CheckoutError::AddressMissing(user_id))?)
            },
        };
        Ok(order)
    }

    /// Writes the order. A write that times out may still have committed, so the order is looked up again by
    /// transaction id before giving up.
    async fn persist(
        &self,
        order: NewOrder,
        txn_id: Option<&TransactionId>,
    ) -> Result<InsertOrderResult, CheckoutError> {
        match tokio::time::timeout(self.storage_timeout, self.db.insert_order_and_clear_cart(order)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!("🔄️ Order write timed out after {:?}", self.storage_timeout);
                let Some(txn_id) = txn_id else {
                    return Err(CheckoutError::UpstreamUnavailable("order write timed out".to_string()));
                };
                match self.bounded("order re-fetch", self.db.fetch_order_by_txn_id(txn_id)).await? {
                    Some(order) => {
                        info!("🔄️ The timed-out write for {txn_id} did commit as order #{}", order.id);
                        Ok(InsertOrderResult::AlreadyExists(order))
                    },
                    None => Err(CheckoutError::UpstreamUnavailable(format!("order write for {txn_id} timed out"))),
                }
            },
        }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, CheckoutError>
    where F: Future<Output = Result<T, StorageError>> {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!("🔄️ {what} did not complete within {:?}", self.storage_timeout);
                Err(CheckoutError::UpstreamUnavailable(format!("{what} timed out")))
            },
        }
    }
}
