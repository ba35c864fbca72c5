//! Production `CaptchaVerifier`: an hCaptcha-compatible `siteverify` call.
//! In non-production mode, `verify` short-circuits to `Ok(true)` without a
//! remote call. Guaranteeing this flag cannot be set in a real production
//! deployment is an operator/deployment concern, not enforced here.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};

use super::{CaptchaError, CaptchaVerifier};

const DEFAULT_VERIFY_URL: &str = "https://hcaptcha.com/siteverify";
/// Spec §5 budget for the captcha round-trip.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(serde::Deserialize)]
struct VerifyResponse {
    success: bool,
}

pub struct HttpCaptchaVerifier {
    client: reqwest::Client,
    secret: Secret<String>,
    verify_url: String,
    production_mode: bool,
}

impl HttpCaptchaVerifier {
    pub fn new(secret: Secret<String>, production_mode: bool) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(VERIFY_TIMEOUT)
                .build()
                .expect("failed to build captcha HTTP client"),
            secret,
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            production_mode,
        }
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn with_verify_url(mut self, url: String) -> Self {
        self.verify_url = url;
        self
    }
}

#[async_trait]
impl CaptchaVerifier for HttpCaptchaVerifier {
    async fn verify(&self, token: &str, client_ip: &str) -> Result<bool, CaptchaError> {
        if !self.production_mode {
            return Ok(true);
        }

        if token.trim().is_empty() {
            return Ok(false);
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&[
                ("secret", self.secret.expose_secret().as_str()),
                ("response", token),
                ("remoteip", client_ip),
            ])
            .send()
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;

        Ok(body.success)
    }
}
