use std::env;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Push gateway endpoint. When unset, notifications are only logged.
    pub push_gateway_url: Option<url::Url>,
    pub push_api_key: String,
    pub push_icon_url: String,
    pub broker_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./huddle.db".into()),
            push_gateway_url: env::var("PUSH_GATEWAY_URL").ok().and_then(|raw| {
                url::Url::parse(&raw)
                    .map_err(|e| tracing::warn!("Ignoring invalid PUSH_GATEWAY_URL {}: {}", raw, e))
                    .ok()
            }),
            push_api_key: env::var("PUSH_API_KEY").unwrap_or_default(),
            push_icon_url: env::var("PUSH_ICON_URL").unwrap_or_default(),
            broker_buffer_size: env::var("BROKER_BUFFER_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(1024),
        }
    }
}
