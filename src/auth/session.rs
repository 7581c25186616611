use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{ Hmac, Mac };
use log::{ debug, warn };
use sha2::Sha256;

use super::{ find_cookie, Authenticator };
use crate::cli::Args;
use crate::models::chat::AuthenticatedUser;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `{user_id}.{issued_at}.{hex_hmac}` session cookies.
#[derive(Clone)]
pub struct SessionAuthenticator {
    secret: String,
    cookie_name: String,
    max_age_secs: i64,
}

impl SessionAuthenticator {
    pub fn new(secret: impl Into<String>, cookie_name: impl Into<String>, max_age_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: cookie_name.into(),
            max_age_secs,
        }
    }

    pub fn from_args(args: &Args) -> Self {
        if args.session_secret.trim().is_empty() {
            warn!("SESSION_SECRET is empty; every request will be rejected as unauthorized.");
        }
        Self::new(args.session_secret.clone(), args.session_cookie.clone(), args.session_max_age)
    }

    fn verify(&self, token: &str, now: i64) -> Option<AuthenticatedUser> {
        if self.secret.is_empty() {
            return None;
        }

        let mut parts = token.rsplitn(3, '.');
        let sig = parts.next()?;
        let issued_at = parts.next()?;
        let user_id = parts.next()?;
        if user_id.is_empty() {
            return None;
        }

        let sig_bytes = hex::decode(sig).ok()?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(user_id.as_bytes());
        mac.update(b".");
        mac.update(issued_at.as_bytes());
        if mac.verify_slice(&sig_bytes).is_err() {
            debug!("Bad session signature for {}", user_id);
            return None;
        }

        let issued_at_i: i64 = issued_at.parse().ok()?;
        let expired = now
            .checked_sub(issued_at_i)
            .map_or(true, |age| age > self.max_age_secs);
        if self.max_age_secs > 0 && expired {
            debug!("Session for {} expired", user_id);
            return None;
        }

        Some(AuthenticatedUser { id: user_id.to_string() })
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<AuthenticatedUser> {
        let token = find_cookie(headers, &self.cookie_name)?;
        self.verify(token, Utc::now().timestamp())
    }
}

/// Issues a session token accepted by [`SessionAuthenticator`].
pub fn sign_session(secret: &str, user_id: &str, issued_at: i64) -> String {
    let payload = format!("{}.{}", user_id, issued_at);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    format!("{}.{}", payload, hex::encode(mac.finalize().into_bytes()))
}
