//! Scriptable `CaptchaVerifier` for tests — can stand in for "always ok",
//! "always invalid", or "network down" without a real provider.

use async_trait::async_trait;

use super::{CaptchaError, CaptchaVerifier};

#[derive(Clone, Copy)]
pub enum FakeCaptchaMode {
    AlwaysOk,
    AlwaysInvalid,
    Unavailable,
}

pub struct FakeCaptchaVerifier {
    mode: FakeCaptchaMode,
}

impl FakeCaptchaVerifier {
    pub fn new(mode: FakeCaptchaMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl CaptchaVerifier for FakeCaptchaVerifier {
    async fn verify(&self, _token: &str, _client_ip: &str) -> Result<bool, CaptchaError> {
        match self.mode {
            FakeCaptchaMode::AlwaysOk => Ok(true),
            FakeCaptchaMode::AlwaysInvalid => Ok(false),
            FakeCaptchaMode::Unavailable => {
                Err(CaptchaError::Unavailable("fake verifier down".into()))
            }
        }
    }
}
