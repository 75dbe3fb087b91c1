use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub store_retry_max_attempts: u32,
    pub store_retry_base_delay_ms: u64,
    pub slot_write_batch_size: usize,
    pub default_slot_duration_minutes: u32,
    pub max_generation_days: u32,
    pub api_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            store_retry_max_attempts: 3,
            store_retry_base_delay_ms: 200,
            slot_write_batch_size: 100,
            default_slot_duration_minutes: 30,
            max_generation_days: 92,
            api_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            store_retry_max_attempts: parse_or("STORE_RETRY_MAX_ATTEMPTS", defaults.store_retry_max_attempts),
            store_retry_base_delay_ms: parse_or("STORE_RETRY_BASE_DELAY_MS", defaults.store_retry_base_delay_ms),
            slot_write_batch_size: parse_or("SLOT_WRITE_BATCH_SIZE", defaults.slot_write_batch_size),
            default_slot_duration_minutes: parse_or(
                "DEFAULT_SLOT_DURATION_MINUTES",
                defaults.default_slot_duration_minutes,
            ),
            max_generation_days: parse_or("MAX_GENERATION_DAYS", defaults.max_generation_days),
            api_port: parse_or("API_PORT", defaults.api_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Delay before the first retry of a transient store error; doubles per attempt.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.store_retry_base_delay_ms)
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.store_retry_max_attempts, 3);
        assert_eq!(config.slot_write_batch_size, 100);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(200));
        assert!(!config.is_configured());
    }

    #[test]
    fn unparsable_value_falls_back_to_default() {
        env::set_var("SLOT_WRITE_BATCH_SIZE_TEST_ONLY", "lots");
        assert_eq!(parse_or("SLOT_WRITE_BATCH_SIZE_TEST_ONLY", 7usize), 7);
        env::remove_var("SLOT_WRITE_BATCH_SIZE_TEST_ONLY");
    }
}
