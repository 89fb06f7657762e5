use crate::utils::dates::WorkCalendar;
use anyhow::{Context, anyhow};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    MySql,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "mysql" => Ok(StoreBackend::MySql),
            other => Err(anyhow!("unknown STORE_BACKEND `{}`", other)),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub password_reset_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Accounts registered with these emails get the manager role.
    pub manager_emails: Vec<String>,
    /// Shift applied before taking the calendar date of an instant.
    pub attendance_utc_offset_minutes: i32,
    pub max_profile_photo_bytes: usize,
    pub log_dir: String,
}

fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value `{}`", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::Memory,
        };
        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::MySql && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set for the mysql backend"));
        }

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            store_backend,
            database_url,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: parsed_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parsed_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days
            password_reset_ttl: parsed_or("PASSWORD_RESET_TTL", 3_600)?, // 1 hour

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parsed_or("RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parsed_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            manager_emails: env::var("MANAGER_EMAILS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            attendance_utc_offset_minutes: parsed_or("ATTENDANCE_UTC_OFFSET_MINUTES", 0)?,
            max_profile_photo_bytes: parsed_or("MAX_PROFILE_PHOTO_BYTES", 1_000_000)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }

    pub fn calendar(&self) -> WorkCalendar {
        WorkCalendar::new(self.attendance_utc_offset_minutes)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".to_string(),
        store_backend: StoreBackend::Memory,
        database_url: None,
        jwt_secret: "test-secret".to_string(),
        access_token_ttl: 900,
        refresh_token_ttl: 3600,
        password_reset_ttl: 600,
        rate_login_per_min: 1000,
        rate_register_per_min: 1000,
        rate_refresh_per_min: 1000,
        rate_protected_per_min: 1000,
        api_prefix: "/api".to_string(),
        manager_emails: vec!["boss@worktrack.test".to_string()],
        attendance_utc_offset_minutes: 0,
        max_profile_photo_bytes: 1_000,
        log_dir: "logs".to_string(),
    }
}
