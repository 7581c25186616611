mod session;

pub use session::{ sign_session, SessionAuthenticator };

use async_trait::async_trait;
use axum::http::HeaderMap;
use crate::models::chat::AuthenticatedUser;

/// Resolves the caller from request headers. `None` means unauthenticated.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<AuthenticatedUser>;
}

/// Looks up one cookie by name across every `Cookie` header.
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let mut kv = pair.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some(k), Some(v)) if k == name => Some(v),
                _ => None,
            }
        })
        .next()
}
