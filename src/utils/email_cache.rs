use super::email_filter::normalize;
use crate::model::user::UserProfile;
use crate::store::{CollectionPath, DocumentStore, KeyRange, list_as};
use anyhow::{Result, anyhow};
use chrono::{Duration as ChronoDuration, Utc};
use moka::future::Cache;
use std::time::Duration;

/// true  => email is TAKEN
/// false => email is AVAILABLE (usually we store only taken)
pub struct EmailCache {
    cache: Cache<String, bool>,
}

impl EmailCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(500_000) // tune based on memory
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }

    pub async fn mark_taken(&self, email: &str) {
        self.cache.insert(normalize(email), true).await;
    }

    pub async fn is_taken(&self, email: &str) -> bool {
        self.cache.get(&normalize(email)).await.unwrap_or(false)
    }

    async fn batch_mark(&self, emails: &[String]) {
        let futures: Vec<_> = emails
            .iter()
            .map(|e| self.cache.insert(normalize(e), true))
            .collect();

        // Await all insertions concurrently
        futures::future::join_all(futures).await;
    }

    /// Load only RECENT accounts (logged in within `days`) into the cache.
    pub async fn warmup(
        &self,
        store: &dyn DocumentStore,
        days: i64,
        batch_size: usize,
    ) -> Result<()> {
        let since = Utc::now() - ChronoDuration::days(days);
        let profiles = list_as::<UserProfile>(store, &CollectionPath::users(), &KeyRange::all())
            .await
            .map_err(|e| anyhow!("profile listing failed: {}", e))?;

        let recent: Vec<String> = profiles
            .into_iter()
            .filter(|(_, p)| p.last_login_at.is_some_and(|t| t >= since))
            .filter(|(_, p)| !p.email.is_empty())
            .map(|(_, p)| p.email)
            .collect();

        for batch in recent.chunks(batch_size.max(1)) {
            self.batch_mark(batch).await;
        }

        log::info!(
            "Email cache warmup complete: {} recent accounts (last {} days)",
            recent.len(),
            days
        );

        Ok(())
    }
}

impl Default for EmailCache {
    fn default() -> Self {
        Self::new()
    }
}
