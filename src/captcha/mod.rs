//! Validates an opaque human-verification challenge token. Bypassed
//! entirely in non-production mode.

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod http;

use async_trait::async_trait;

pub use self::http::HttpCaptchaVerifier;

#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("captcha verifier unreachable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Posts `token` and the server-observed `client_ip` to the verifier
    /// and returns `Ok(true)` only on an explicit success verdict.
    /// `Ok(false)` means the token was checked and rejected (maps to
    /// `invalid_captcha`); `Err` means the verifier itself could not be
    /// reached (maps to `captcha_unavailable`, distinct from rejection).
    async fn verify(&self, token: &str, client_ip: &str) -> Result<bool, CaptchaError>;
}
