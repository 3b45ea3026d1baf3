//! HTTP Basic-auth verification and the middleware that turns a verified
//! username into the [`Actor`] the API stamps on change records.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hse_api::{Actor, ApiError};
use rand_core::OsRng;

use crate::UserConfig;

/// Hash `password` into an argon2 PHC string suitable for `password_hash`.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

/// Verify the `Authorization: Basic` header against `users` and return the
/// matching username.
pub fn verify_auth(headers: &HeaderMap, users: &[UserConfig]) -> Result<String, ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let user = users
    .iter()
    .find(|u| u.username == username)
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(user.username.clone())
}

/// Middleware: reject unauthenticated requests with 401, otherwise insert
/// the [`Actor`] extension and continue.
pub async fn require_auth(
  State(users): State<Arc<Vec<UserConfig>>>,
  mut req: Request,
  next: Next,
) -> Response {
  match verify_auth(req.headers(), &users) {
    Ok(username) => {
      req.extensions_mut().insert(Actor(username));
      next.run(req).await
    }
    Err(e) => {
      tracing::debug!(uri = %req.uri(), "rejected unauthenticated request");
      e.into_response()
    }
  }
}
