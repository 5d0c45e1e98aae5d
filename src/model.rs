use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a remote entity. Backends send either numbers or strings;
/// both are normalised to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Uint(u64),
            Str(String),
        }
        let id = match Raw::deserialize(deserializer)? {
            Raw::Int(v) => v.to_string(),
            Raw::Uint(v) => v.to_string(),
            Raw::Str(v) => v,
        };
        if id.trim().is_empty() {
            return Err(serde::de::Error::custom("entity id must be non-empty"));
        }
        Ok(Self(id))
    }
}

/// A record served by a collection endpoint.
pub trait Entity: DeserializeOwned + Serialize + Clone + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> &EntityId;

    /// Contribution to the active/inactive aggregates. `None` for entity
    /// types that have no such notion.
    fn is_active(&self) -> Option<bool> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(alias = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(alias = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settings: Option<Map<String, Value>>,
}

impl Entity for Tenant {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn is_active(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "type", default)]
    pub customer_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Entity for Customer {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn is_active(&self) -> Option<bool> {
        self.status.as_deref().and_then(status_is_active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(alias = "isActive", default = "default_true")]
    pub is_active: bool,
}

impl Entity for Product {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn is_active(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

/// Any collection row, kept as its JSON fields. Used when the console is
/// pointed at a resource without a dedicated type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Render one field for tabular display; missing fields render empty.
    pub fn display_field(&self, name: &str) -> String {
        if name == "id" {
            return self.id.to_string();
        }
        match self.fields.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn number_field(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Entity for Record {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn is_active(&self) -> Option<bool> {
        for key in ["is_active", "isActive", "active"] {
            if let Some(Value::Bool(b)) = self.fields.get(key) {
                return Some(*b);
            }
        }
        match self.fields.get("status") {
            Some(Value::String(s)) => status_is_active(s),
            _ => None,
        }
    }
}

fn status_is_active(status: &str) -> Option<bool> {
    match status.to_ascii_lowercase().as_str() {
        "active" => Some(true),
        "inactive" | "suspended" | "disabled" => Some(false),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}
