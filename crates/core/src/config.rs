use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `REWARDS_KIOSK__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default = "default_seed_demo_data")]
    pub seed_demo_data: bool,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub kiosk: KioskConfig,
    #[serde(default)]
    pub loyalty: LoyaltyConfig,
    #[serde(default)]
    pub campaigns: CampaignConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "kiosk-node-01".to_string()
}
fn default_seed_demo_data() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            seed_demo_data: default_seed_demo_data(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            kiosk: KioskConfig::default(),
            loyalty: LoyaltyConfig::default(),
            campaigns: CampaignConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

// ─── Kiosk Config ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct KioskConfig {
    /// Any state falls back to the welcome screen after this much inactivity.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Countdown on the success screen before it returns to welcome.
    #[serde(default = "default_success_display_secs")]
    pub success_display_secs: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Idle sessions untouched for this long are dropped by the sweeper.
    #[serde(default = "default_session_retention_secs")]
    pub session_retention_secs: u64,
    /// Largest amount the keypad accepts in a single check-in.
    #[serde(default = "default_max_points_per_checkin")]
    pub max_points_per_checkin: u32,
}

fn default_idle_timeout_secs() -> u64 { 30 }
fn default_success_display_secs() -> u64 { 15 }
fn default_sweep_interval_ms() -> u64 { 1000 }
fn default_session_retention_secs() -> u64 { 600 }
fn default_max_points_per_checkin() -> u32 { 999 }

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            success_display_secs: default_success_display_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
            session_retention_secs: default_session_retention_secs(),
            max_points_per_checkin: default_max_points_per_checkin(),
        }
    }
}

// ─── Loyalty Config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LoyaltyConfig {
    /// Re-check the stored balance inside the redemption transaction instead
    /// of trusting the balance the kiosk read.
    #[serde(default)]
    pub server_authoritative_redemption: bool,
    #[serde(default = "default_max_points_per_checkin")]
    pub max_points_per_checkin: u32,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            server_authoritative_redemption: false,
            max_points_per_checkin: default_max_points_per_checkin(),
        }
    }
}

// ─── Campaign Config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    /// Simulated time spent in SENDING before a campaign completes.
    #[serde(default = "default_delivery_delay_ms")]
    pub delivery_delay_ms: u64,
    #[serde(default = "default_delivery_rate")]
    pub delivery_rate: f64,
}

fn default_delivery_delay_ms() -> u64 { 2000 }
fn default_delivery_rate() -> f64 { 0.95 }

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            delivery_delay_ms: default_delivery_delay_ms(),
            delivery_rate: default_delivery_rate(),
        }
    }
}

// ─── Auth Config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

fn default_admin_username() -> String { "admin".to_string() }
fn default_admin_password() -> String { "admin".to_string() }
fn default_token_ttl_hours() -> i64 { 24 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment
    /// variables. Environment wins over the file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("REWARDS_KIOSK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// The loyalty engine and the kiosk keypad share one ceiling.
    pub fn normalized(mut self) -> Self {
        self.loyalty.max_points_per_checkin = self.kiosk.max_points_per_checkin;
        // A zero period would stall the sweeper's interval.
        self.kiosk.sweep_interval_ms = self.kiosk.sweep_interval_ms.max(1);
        self
    }
}
