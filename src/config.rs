//! Configuration loader and validator for the admin console client.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::query::FilterSpec;
use crate::session::{CurrencyFormat, CurrentUser, Role, SessionContext};

static RESOURCE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_-]*(/[a-z0-9_-]+)*$").expect("valid resource path pattern")
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Invalid configuration for resource '{name}': {reason}")]
    InvalidResource { name: String, reason: &'static str },
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub api: Api,
    pub session: Session,
    pub resources: BTreeMap<String, Resource>,
}

/// App-level settings shared by every list view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub page_size: u32,
    pub search_debounce_ms: u64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    pub token: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Identity of the operator using the console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
}

/// One collection endpoint exposed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub path: String,
    #[serde(default)]
    pub required_role: Option<Role>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub money_columns: Vec<String>,
    /// Filter name -> values the endpoint accepts.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
}

impl Config {
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Build the context injected into clients and view-models.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            user: CurrentUser {
                id: self.session.user_id.clone(),
                name: self.session.user_name.clone(),
                role: self.session.role,
            },
            tenant_id: self
                .api
                .tenant_id
                .clone()
                .filter(|t| !t.trim().is_empty()),
            currency: CurrencyFormat {
                code: self.app.currency.code.clone(),
                symbol: self.app.currency.symbol.clone(),
                decimals: self.app.currency.decimals,
            },
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.app.search_debounce_ms)
    }
}

impl Api {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

impl Resource {
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new(self.filters.clone())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.page_size == 0 {
        return Err(ConfigError::Invalid("app.page_size must be > 0"));
    }
    if cfg.app.search_debounce_ms == 0 {
        return Err(ConfigError::Invalid("app.search_debounce_ms must be > 0"));
    }
    if cfg.app.currency.code.trim().is_empty() {
        return Err(ConfigError::Invalid("app.currency.code must be non-empty"));
    }

    if cfg.api.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.api.base_url).is_err() {
        return Err(ConfigError::Invalid("api.base_url must be an absolute URL"));
    }
    if cfg.api.token.trim().is_empty() {
        return Err(ConfigError::Invalid("api.token must be non-empty"));
    }

    if cfg.session.user_id.trim().is_empty() {
        return Err(ConfigError::Invalid("session.user_id must be non-empty"));
    }

    if cfg.resources.is_empty() {
        return Err(ConfigError::Invalid("resources must declare at least one collection"));
    }
    for (name, res) in &cfg.resources {
        if !RESOURCE_PATH.is_match(&res.path) {
            return Err(ConfigError::InvalidResource {
                name: name.clone(),
                reason: "path must be a relative lowercase path like `tenants` or `pos/shifts`",
            });
        }
        if res.filters.values().any(|values| values.is_empty()) {
            return Err(ConfigError::InvalidResource {
                name: name.clone(),
                reason: "filters must list at least one accepted value",
            });
        }
        if res.money_columns.iter().any(|c| !res.columns.contains(c)) {
            return Err(ConfigError::InvalidResource {
                name: name.clone(),
                reason: "money_columns must be a subset of columns",
            });
        }
    }

    Ok(())
}

/// Returns a complete example configuration.
pub fn example() -> &'static str {
    r#"app:
  page_size: 20
  search_debounce_ms: 500
  currency:
    code: "USD"
    symbol: "$"
    decimals: 2

api:
  base_url: "https://api.example.com/api/v1/"
  token: "YOUR_API_TOKEN"
  tenant_id: "TENANT_ID"
  timeout_secs: 30

session:
  user_id: "1"
  user_name: "admin"
  role: "super_admin"

resources:
  tenants:
    path: "tenants"
    required_role: "super_admin"
    columns: ["name", "slug", "status"]
    filters:
      status: ["active", "inactive"]
      plan: ["free", "pro", "enterprise"]
  customers:
    path: "crm/customers"
    columns: ["name", "email", "phone"]
    filters:
      status: ["active", "inactive"]
      type: ["individual", "company"]
  products:
    path: "inventory/products"
    columns: ["name", "sku", "price", "stock"]
    money_columns: ["price"]
    filters:
      status: ["active", "inactive"]
"#
}
