//! Revoked token cache using DashMap

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Token ids (`jti`) invalidated by logout, kept until the token would have
/// expired anyway.
pub struct RevokedTokens {
    data: Arc<DashMap<String, Instant>>,
}

impl RevokedTokens {
    pub fn new() -> Self {
        let revoked = Self {
            data: Arc::new(DashMap::new()),
        };

        // Start cleanup task
        revoked.start_cleanup_task();

        revoked
    }

    /// Revoke a token id for `ttl`
    pub fn revoke(&self, jti: String, ttl: Duration) {
        self.data.insert(jti, Instant::now() + ttl);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        let expired = match self.data.get(jti) {
            Some(expires_at) => Instant::now() > *expires_at,
            None => return false,
        };
        if expired {
            self.data.remove(jti);
        }
        !expired
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    fn start_cleanup_task(&self) {
        let data = self.data.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;

                let now = Instant::now();
                data.retain(|_, expires_at| *expires_at > now);
            }
        });
    }
}

impl Default for RevokedTokens {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revoke() {
        let revoked = RevokedTokens::new();

        revoked.revoke("jti-1".to_string(), Duration::from_secs(60));
        assert!(revoked.is_revoked("jti-1"));
        assert!(!revoked.is_revoked("jti-2"));
        assert_eq!(revoked.len(), 1);
    }

    #[tokio::test]
    async fn test_ttl() {
        let revoked = RevokedTokens::new();

        // Set with very short TTL
        revoked.revoke("jti-1".to_string(), Duration::from_millis(10));
        assert!(revoked.is_revoked("jti-1"));

        // Wait for expiration
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!revoked.is_revoked("jti-1"));
        assert_eq!(revoked.len(), 0);
    }
}
