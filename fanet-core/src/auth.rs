//! Identity service client (§6): a bearer token is exchanged for a user
//! record over `reqwest`, with results cached in-process keyed by a
//! SHA-256 hash of the token so the raw token never sits in memory twice.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token")]
    Invalid,
    #[error("identity service is unavailable: {0}")]
    Transient(String),
}

struct CacheEntry {
    user: User,
    expires_at: f64,
}

pub struct AuthClient {
    endpoint: String,
    http: reqwest::Client,
    cache_ttl_s: f64,
    cache: Mutex<HashMap<[u8; 32], CacheEntry>>,
}

impl AuthClient {
    pub fn new(endpoint: String, cache_ttl_s: u64) -> Self {
        AuthClient {
            endpoint,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client builder with static config never fails"),
            cache_ttl_s: cache_ttl_s as f64,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn verify(&self, token: &str, now: f64) -> Result<User, AuthError> {
        let key = token_key(token);
        if let Some(entry) = self.cache.lock().unwrap().get(&key) {
            if entry.expires_at > now {
                return Ok(entry.user.clone());
            }
        }

        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Transient(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let user: User = response.json().await.map_err(|e| AuthError::Transient(e.to_string()))?;
                self.cache.lock().unwrap().insert(
                    key,
                    CacheEntry { user: user.clone(), expires_at: now + self.cache_ttl_s },
                );
                Ok(user)
            }
            401 => Err(AuthError::Invalid),
            status => Err(AuthError::Transient(format!("identity service returned {status}"))),
        }
    }
}

fn token_key(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_key_is_deterministic_and_distinct() {
        assert_eq!(token_key("abc"), token_key("abc"));
        assert_ne!(token_key("abc"), token_key("xyz"));
    }
}
