//! # Gateway digest format
//!
//! Every payment request we hand to the gateway carries a digest, and the gateway signs its server-to-server callback
//! the same way. The digest is the lowercase hex SHA-512 of a `|`-delimited sequence of fields followed by the shared
//! salt. The sequence is fixed by the gateway and must match byte for byte, including the ten empty slots reserved for
//! user-defined fields:
//!
//! ```text
//!   initiation:   key|txnid|amount|productinfo|firstname|email|||||||||||salt
//!   verification: key|txnid|amount|productinfo|firstname|email|status|||||||||||salt
//! ```
//!
//! `amount` is always hashed as the exact string that was sent or received. Re-formatting it ("1600" vs "1600.00")
//! changes the digest.
use cpg_common::Secret;
use log::*;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

const RESERVED_SLOTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The gateway digest for transaction {txn_id} does not match the payload")]
pub struct DigestMismatch {
    pub txn_id: String,
}

/// Fields we sign when handing a new transaction to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiationFields<'a> {
    pub txn_id: &'a str,
    pub amount: &'a str,
    pub product_info: &'a str,
    pub payer_name: &'a str,
    pub payer_email: &'a str,
}

/// Fields the gateway signs in its callback. Identical to [`InitiationFields`] plus the payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFields<'a> {
    pub txn_id: &'a str,
    pub amount: &'a str,
    pub product_info: &'a str,
    pub payer_name: &'a str,
    pub payer_email: &'a str,
    pub status: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestFields<'a> {
    Initiation(InitiationFields<'a>),
    Verification(VerificationFields<'a>),
}

impl<'a> From<InitiationFields<'a>> for DigestFields<'a> {
    fn from(fields: InitiationFields<'a>) -> Self {
        Self::Initiation(fields)
    }
}

impl<'a> From<VerificationFields<'a>> for DigestFields<'a> {
    fn from(fields: VerificationFields<'a>) -> Self {
        Self::Verification(fields)
    }
}

impl<'a> DigestFields<'a> {
    pub fn txn_id(&self) -> &'a str {
        match self {
            DigestFields::Initiation(f) => f.txn_id,
            DigestFields::Verification(f) => f.txn_id,
        }
    }

    /// The fields between the merchant key and the reserved slots, in wire order.
    fn payload(&self) -> Vec<&'a str> {
        match self {
            DigestFields::Initiation(f) => vec![f.txn_id, f.amount, f.product_info, f.payer_name, f.payer_email],
            DigestFields::Verification(f) => {
                vec![f.txn_id, f.amount, f.product_info, f.payer_name, f.payer_email, f.status]
            },
        }
    }

    fn canonical_sequence(&self, merchant_key: &str, salt: &str) -> String {
        let mut parts = Vec::with_capacity(8 + RESERVED_SLOTS);
        parts.push(merchant_key);
        parts.extend(self.payload());
        parts.extend(std::iter::repeat("").take(RESERVED_SLOTS));
        parts.push(salt);
        parts.join("|")
    }
}

/// Signs outgoing transactions and verifies incoming gateway callbacks with the merchant's key and salt.
#[derive(Clone, Debug)]
pub struct TransactionAuthenticator {
    merchant_key: Secret<String>,
    salt: Secret<String>,
}

impl TransactionAuthenticator {
    pub fn new(merchant_key: Secret<String>, salt: Secret<String>) -> Self {
        Self { merchant_key, salt }
    }

    /// The merchant key is not secret in the same way as the salt: it is sent to the gateway in the clear.
    pub fn merchant_key(&self) -> &str {
        self.merchant_key.reveal()
    }

    pub fn sign(&self, fields: &DigestFields<'_>) -> String {
        let sequence = fields.canonical_sequence(self.merchant_key.reveal(), self.salt.reveal());
        hex::encode(Sha512::digest(sequence.as_bytes()))
    }

    /// Recomputes the digest from `fields` and compares it to `digest` in constant time. The gateway has been seen to
    /// send upper-case hex, so case is normalised first.
    pub fn verify(&self, fields: &DigestFields<'_>, digest: &str) -> Result<(), DigestMismatch> {
        let expected = self.sign(fields);
        let received = digest.trim().to_ascii_lowercase();
        if bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
            trace!("🔐️ Digest verified for transaction {}", fields.txn_id());
            Ok(())
        } else {
            warn!("🔐️ Digest mismatch for transaction {}. The payload may have been tampered with.", fields.txn_id());
            Err(DigestMismatch { txn_id: fields.txn_id().to_string() })
        }
    }
}
