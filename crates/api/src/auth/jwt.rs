//! Bearer-token validation for admin requests.
//!
//! Tokens are HS256 JWTs minted by the school's account service; this server
//! only verifies them and reads the actor out of the [`Claims`].

use jsonwebtoken::{decode, DecodingKey, Validation};
use kiosk_core::types::DbId;
use serde::{Deserialize, Serialize};

/// Role name allowed to review returns.
pub const ROLE_ADMIN: &str = "admin";

/// JWT claims carried by every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's internal database id.
    pub sub: DbId,
    /// Display name recorded in the review audit fields.
    pub name: String,
    pub role: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
}

/// Verification key material, loaded with the rest of
/// [`ServerConfig`](crate::config::ServerConfig) from `JWT_SECRET`.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the issuer.
    pub secret: String,
}

/// Validate and decode an access token (signature and expiry).
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}
