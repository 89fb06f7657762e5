use crate::store::{CollectionPath, DocumentStore, KeyRange};
use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
/// Tune these based on real account counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registered emails; answers "definitely not registered" without a store read.
pub struct EmailFilter {
    filter: RwLock<CuckooFilter<String>>,
}

impl EmailFilter {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }

    /// Check if an email might be registered (false positives possible)
    pub fn might_exist(&self, email: &str) -> bool {
        let email = normalize(email);
        self.filter
            .read()
            .expect("email filter poisoned")
            .contains(&email)
    }

    pub fn insert(&self, email: &str) {
        let email = normalize(email);
        self.filter
            .write()
            .expect("email filter poisoned")
            .add(&email);
    }

    /// Insert a batch of normalized emails
    fn insert_batch(&self, emails: &[String]) {
        let mut filter = self.filter.write().expect("email filter poisoned");

        for email in emails {
            filter.add(email);
        }
    }

    /// Warm up the filter from the credentials collection, in batches.
    pub async fn warmup(&self, store: &dyn DocumentStore, batch_size: usize) -> Result<()> {
        let docs = store
            .list(&CollectionPath::credentials(), &KeyRange::all())
            .await
            .map_err(|e| anyhow!("credential listing failed: {}", e))?;

        let total = docs.len();
        let emails: Vec<String> = docs.into_iter().map(|(id, _)| normalize(&id)).collect();
        for batch in emails.chunks(batch_size.max(1)) {
            self.insert_batch(batch);
        }

        log::info!("Email filter warmup complete: {} accounts", total);
        Ok(())
    }
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Precondition;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn inserted_emails_are_found_case_insensitively() {
        let filter = EmailFilter::new();
        assert!(!filter.might_exist("ann@example.com"));
        filter.insert("Ann@Example.com");
        assert!(filter.might_exist("ann@example.com"));
    }

    #[tokio::test]
    async fn warmup_loads_credentials() {
        let store = MemoryStore::new();
        for email in ["a@x.io", "b@x.io", "c@x.io"] {
            store
                .put(
                    &CollectionPath::credentials().doc(email),
                    json!({"uid": email, "passwordHash": "x"}),
                    Precondition::Absent,
                )
                .await
                .unwrap();
        }
        let filter = EmailFilter::new();
        filter.warmup(&store, 2).await.unwrap();
        assert!(filter.might_exist("b@x.io"));
        assert!(filter.might_exist("C@x.io"));
    }
}
