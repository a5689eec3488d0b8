//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the account service with a `userId` claim. They arrive either in an
//! `Authorization: Bearer` header or in a `token` cookie. Handlers ask for an [`AuthenticatedUser`] when a signed-in
//! customer is required, or an [`OptionalUser`] when anonymous requests are allowed too.
use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let key = config.jwt_secret.as_ref().map(|s| DecodingKey::from_secret(s.reveal().as_bytes()));
        Self { key, validation: Validation::new(Algorithm::HS256) }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, ServerError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| ServerError::ConfigurationMissing("Authentication is not configured on server".into()))?;
        let data = decode::<JwtClaims>(token, key, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token has expired".to_string(),
                ErrorKind::InvalidToken => "token is malformed".to_string(),
                ErrorKind::InvalidSignature => "signature is invalid".to_string(),
                _ => e.to_string(),
            };
            debug!("💻️ Rejected access token: {reason}");
            ServerError::AuthenticationError(AuthError::InvalidToken(reason))
        })?;
        Ok(data.claims)
    }
}

/// The raw token from the Authorization header, falling back to the `token` cookie.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    from_header.or_else(|| req.cookie(TOKEN_COOKIE).map(|c| c.value().to_string()).filter(|t| !t.is_empty()))
}

fn authenticate(req: &HttpRequest) -> Result<Option<JwtClaims>, ServerError> {
    let Some(token) = extract_token(req) else {
        return Ok(None);
    };
    let verifier = req.app_data::<web::Data<TokenVerifier>>().ok_or_else(|| {
        error!("💻️ No token verifier has been registered with the application");
        ServerError::ConfigurationMissing("Authentication is not configured on server".into())
    })?;
    verifier.verify(&token).map(Some)
}

/// A customer with a valid access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = authenticate(req).and_then(|claims| {
            claims
                .map(|c| AuthenticatedUser(c.user_id))
                .ok_or(ServerError::AuthenticationError(AuthError::MissingToken))
        });
        ready(result)
    }
}

/// The signed-in customer, if there is one. A missing or unusable token yields an anonymous caller rather than an
/// error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionalUser(pub Option<i64>);

impl OptionalUser {
    pub fn id(&self) -> Option<i64> {
        self.0
    }
}

impl FromRequest for OptionalUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = match authenticate(req) {
            Ok(claims) => claims.map(|c| c.user_id),
            Err(e) => {
                debug!("💻️ Treating caller as anonymous. {e}");
                None
            },
        };
        ready(Ok(OptionalUser(user)))
    }
}
