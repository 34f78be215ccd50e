use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Table holding license keys (configurable to match the hosted store)
    pub license_keys_table: String,
    /// Table holding the append-only key history
    pub key_history_table: String,
    /// Email relay webhook; None disables outbound email entirely
    pub email_webhook_url: Option<String>,
    pub from_email: String,
    /// Shared admin session token; None rejects all requests outside dev mode
    pub admin_token: Option<String>,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("KEYHAUS_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "keyhaus.db".to_string()),
            license_keys_table: env::var("LICENSE_KEYS_TABLE")
                .unwrap_or_else(|_| "license_keys".to_string()),
            key_history_table: env::var("KEY_HISTORY_TABLE")
                .unwrap_or_else(|_| "key_history".to_string()),
            email_webhook_url: env::var("EMAIL_WEBHOOK_URL").ok(),
            from_email: env::var("FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@example.com".to_string()),
            admin_token: env::var("ADMIN_TOKEN").ok(),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
