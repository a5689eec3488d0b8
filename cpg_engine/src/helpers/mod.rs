mod gateway_digest;
mod transaction_id;

pub use gateway_digest::{
    DigestFields,
    DigestMismatch,
    InitiationFields,
    TransactionAuthenticator,
    VerificationFields,
};
pub use transaction_id::new_transaction_id;
