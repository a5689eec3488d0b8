use actix_web::{
    error::ResponseError,
    http::{
        header::{ContentType, RETRY_AFTER},
        StatusCode,
    },
    HttpResponse,
};
use cpg_engine::CheckoutError;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    /// The message is shown to the customer verbatim.
    #[error("{0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    /// A request needed configuration that this deployment does not have, e.g. gateway credentials.
    #[error("{0}")]
    ConfigurationMissing(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    Forbidden(String),
    #[error("Too many requests. Please wait a moment before trying again.")]
    DuplicateRequest { retry_after: u64 },
    #[error("Cart is empty. Please add items to your cart before placing an order.")]
    EmptyCart,
    #[error("Shipping address not found. Please save your address first.")]
    AddressMissing,
    #[error("The order service is temporarily unavailable. Please try again shortly.")]
    UpstreamUnavailable,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::AddressMissing => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DuplicateRequest { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        builder.insert_header(ContentType::json());
        let body = match self {
            Self::DuplicateRequest { retry_after } => {
                builder.insert_header((RETRY_AFTER, retry_after.to_string()));
                serde_json::json!({ "error": self.to_string(), "retryAfter": retry_after })
            },
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        builder.body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Unauthorized. Please sign in to continue.")]
    MissingToken,
    #[error("Unauthorized. Your session is invalid or has expired.")]
    InvalidToken(String),
    #[error("Unauthorized. Please sign in to place an order.")]
    SignInRequired,
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::EmptyCart => Self::EmptyCart,
            CheckoutError::AddressMissing(_) => Self::AddressMissing,
            CheckoutError::PayerRequired => Self::AuthenticationError(AuthError::SignInRequired),
            CheckoutError::InvalidAmount(msg) => Self::InvalidRequestBody(format!("Invalid amount: {msg}")),
            CheckoutError::UnknownTransaction(_) => Self::Forbidden("Unauthorized".to_string()),
            CheckoutError::TransactionOwnedByAnotherUser(_) => Self::Forbidden("Unauthorized".to_string()),
            CheckoutError::UpstreamUnavailable(msg) => {
                error!("💻️ Storage did not respond in time. {msg}");
                Self::UpstreamUnavailable
            },
            CheckoutError::StorageConflict(msg) | CheckoutError::DatabaseError(msg) => {
                error!("💻️ Storage error. {msg}");
                Self::BackendError(msg)
            },
        }
    }
}
