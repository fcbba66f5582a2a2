use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub notify_api_url: String,
    pub notify_api_key: String,
    pub working_hours_start: String,
    pub working_hours_end: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
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
            notify_api_url: env::var("NOTIFY_API_URL")
                .unwrap_or_else(|_| {
                    warn!("NOTIFY_API_URL not set, using empty value");
                    String::new()
                }),
            notify_api_key: env::var("NOTIFY_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("NOTIFY_API_KEY not set, using empty value");
                    String::new()
                }),
            working_hours_start: env::var("WORKING_HOURS_START")
                .unwrap_or_else(|_| "9:00 AM".to_string()),
            working_hours_end: env::var("WORKING_HOURS_END")
                .unwrap_or_else(|_| "9:00 PM".to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }

    pub fn is_notification_configured(&self) -> bool {
        !self.notify_api_url.is_empty()
            && !self.notify_api_key.is_empty()
    }
}
