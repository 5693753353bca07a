use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub firebase: FirebaseConfig,
    pub schema: RecordSchema,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default = "default_app_port")]
    pub app_port: u16,
    /// Injected by Cloud Run; wins over `APP_PORT` when present
    #[serde(default)]
    pub port: Option<u16>,
    /// `json` switches the log output to JSON lines
    #[serde(default)]
    pub log_format: Option<String>,
}

impl AppConfig {
    pub fn listen_port(&self) -> u16 {
        self.port.unwrap_or(self.app_port)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    pub firebase_project_id: String,
    /// Path to the service account JSON
    #[serde(default)]
    pub google_application_credentials: Option<String>,
    /// Bearer token used instead of a service account (emulators)
    #[serde(default)]
    pub auth_static_token: Option<String>,
    #[serde(default)]
    pub fcm_base_url: Option<String>,
    #[serde(default)]
    pub firestore_base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Collection and field names of the watched records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSchema {
    #[serde(default = "default_orders_collection")]
    pub orders_collection: String,
    #[serde(default = "default_users_collection")]
    pub users_collection: String,
    #[serde(default = "default_arrival_field")]
    pub arrival_field: String,
    #[serde(default = "default_customer_field")]
    pub customer_field: String,
    #[serde(default = "default_token_field")]
    pub token_field: String,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            orders_collection: default_orders_collection(),
            users_collection: default_users_collection(),
            arrival_field: default_arrival_field(),
            customer_field: default_customer_field(),
            token_field: default_token_field(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_arrival_channel_id")]
    pub arrival_channel_id: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            arrival_channel_id: default_arrival_channel_id(),
        }
    }
}

fn default_app_env() -> String {
    "development".to_string()
}

fn default_app_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_orders_collection() -> String {
    "Orders".to_string()
}

fn default_users_collection() -> String {
    "Users".to_string()
}

fn default_arrival_field() -> String {
    "arrivedAt".to_string()
}

fn default_customer_field() -> String {
    "customerId".to_string()
}

fn default_token_field() -> String {
    "fcmToken".to_string()
}

fn default_arrival_channel_id() -> String {
    "driver_arrival_channel".to_string()
}

impl Config {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        Ok(Config {
            app: envy::from_iter(vars.clone())?,
            firebase: envy::from_iter(vars.clone())?,
            schema: envy::from_iter(vars.clone())?,
            notification: envy::from_iter(vars)?,
        })
    }
}
