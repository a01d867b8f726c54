use axum::http::HeaderMap;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey,
                   Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppErr, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Admin tier; gates setVideo, invites and uploads.
    pub adm: bool,
    pub exp: i64,
}

pub fn sign(uid: &str, admin: bool, secret: &str) -> String {
    let c = Claims { sub: uid.into(), adm: admin, exp: Utc::now().timestamp() + 86_400 };
    encode(&Header::default(), &c, &EncodingKey::from_secret(secret.as_bytes()))
        .unwrap()
}

pub fn verify(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()),
                     &Validation::new(Algorithm::HS256))
        .map(|d| d.claims).ok()
}

pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Privilege check for admin-only endpoints: rejected before any mutation.
pub fn require_admin(headers: &HeaderMap, secret: &str) -> AppResult<Claims> {
    let token = bearer(headers).ok_or_else(|| AppErr::Unauthorized("missing token".into()))?;
    let claims = verify(token, secret).ok_or_else(|| AppErr::Unauthorized("bad token".into()))?;
    if !claims.adm {
        return Err(AppErr::Forbidden("admin only".into()));
    }
    Ok(claims)
}
