use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the notification REST resource, e.g.
    /// `https://api.studio.example/api/v1`.
    pub api_base_url: String,
    /// WebSocket endpoint for the push channel.
    pub ws_url: String,
    /// External identity provider base URL.
    pub idp_url: String,
    pub idp_realm: String,
    pub idp_client_id: String,
    /// Tenant scope attached to every REST call.
    pub tenant_id: String,
    /// Base delay for the reconnect backoff, in milliseconds.
    /// Delay for attempt n is `base * 2^n`. Default: 1000.
    pub reconnect_base_delay_ms: u64,
    /// Automatic reconnect attempts before requiring an explicit
    /// `connect()`. Default: 5.
    pub max_reconnect_attempts: u32,
    /// How long after a push to run the reconciliation fetch. Default: 1000.
    pub reconcile_delay_ms: u64,
    /// Default page size for list fetches. Default: 10.
    pub page_size: u32,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let api_base_url = std::env::var("STUDIO_API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8080/api/v1".into());

    // Derive the push endpoint from the API host when not set explicitly.
    let ws_url = std::env::var("STUDIO_WS_URL").unwrap_or_else(|_| {
        api_base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
            .trim_end_matches('/')
            .to_string()
            + "/ws/notifications"
    });

    Ok(Config {
        api_base_url,
        ws_url,
        idp_url: std::env::var("STUDIO_IDP_URL")
            .unwrap_or_else(|_| "http://localhost:8180".into()),
        idp_realm: std::env::var("STUDIO_IDP_REALM").unwrap_or_else(|_| "studio".into()),
        idp_client_id: std::env::var("STUDIO_IDP_CLIENT_ID")
            .unwrap_or_else(|_| "studio-admin".into()),
        tenant_id: std::env::var("STUDIO_TENANT_ID").unwrap_or_else(|_| "default".into()),
        reconnect_base_delay_ms: std::env::var("STUDIO_RECONNECT_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000),
        max_reconnect_attempts: std::env::var("STUDIO_MAX_RECONNECT_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5),
        reconcile_delay_ms: std::env::var("STUDIO_RECONCILE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000),
        page_size: std::env::var("STUDIO_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10),
    })
}
