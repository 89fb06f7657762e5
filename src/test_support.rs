//! Shared fixtures for handler tests.

use crate::auth::jwt::generate_access_token;
use crate::config::{Config, test_config};
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::store::memory::MemoryStore;
use crate::store::{CollectionPath, Precondition, write};
use crate::utils::{email_cache::EmailCache, email_filter::EmailFilter};
use actix_web::web::Data;
use std::net::SocketAddr;
use std::sync::Arc;

/// Governor keys requests by peer IP, so every test request needs one.
pub fn peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40_000))
}

pub struct TestState {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub filter: Data<EmailFilter>,
    pub cache: Data<EmailCache>,
}

impl TestState {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            store: Arc::new(MemoryStore::new()),
            filter: Data::new(EmailFilter::new()),
            cache: Data::new(EmailCache::new()),
        }
    }

    /// Writes a profile and returns an access token for it.
    pub async fn seed_user(
        &self,
        uid: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> String {
        let profile = UserProfile {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            role,
            ..UserProfile::default()
        };
        write(
            self.store.as_ref(),
            &CollectionPath::users().doc(uid),
            &profile,
            Precondition::Any,
        )
        .await
        .unwrap();

        generate_access_token(
            uid,
            email,
            role,
            &self.config.jwt_secret,
            self.config.access_token_ttl,
        )
        .unwrap()
    }
}

/// Builds the full application over a [`TestState`], the way `main` does.
macro_rules! init_app {
    ($state:expr) => {{
        let state: &$crate::test_support::TestState = &$state;
        let store: std::sync::Arc<dyn $crate::store::DocumentStore> = state.store.clone();
        let config = state.config.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(state.config.clone()))
                .app_data(actix_web::web::Data::from(store))
                .app_data(state.filter.clone())
                .app_data(state.cache.clone())
                .configure(move |cfg| $crate::routes::configure(cfg, config)),
        )
        .await
    }};
}

pub(crate) use init_app;
