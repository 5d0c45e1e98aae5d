//! Session context handed to clients and view-models explicitly instead of
//! being looked up from ambient state.
use serde::{Deserialize, Serialize};

use crate::error::CollectionError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Role::SuperAdmin => 3,
            Role::Admin => 2,
            Role::Staff => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl CurrentUser {
    /// Roles are ordered: a super admin satisfies every requirement.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.rank() >= required.rank()
    }
}

/// Formats monetary amounts for display, e.g. `$1,234.50`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyFormat {
    pub code: String,
    pub symbol: String,
    pub decimals: u8,
}

impl CurrencyFormat {
    pub fn format(&self, amount: f64) -> String {
        let fixed = format!("{:.*}", self.decimals as usize, amount.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (fixed.as_str(), None),
        };

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        // "-0.00" reads as noise, only sign amounts that survive rounding.
        let negative = amount < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&self.symbol);
        out.push_str(&grouped);
        if let Some(frac) = frac_part {
            out.push('.');
            out.push_str(frac);
        }
        out
    }
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            code: "USD".into(),
            symbol: "$".into(),
            decimals: 2,
        }
    }
}

/// Everything a screen used to read from global auth/tenant/currency state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user: CurrentUser,
    pub tenant_id: Option<String>,
    pub currency: CurrencyFormat,
}

impl SessionContext {
    pub fn ensure_role(&self, required: Option<Role>) -> Result<(), CollectionError> {
        match required {
            Some(role) if !self.user.has_role(role) => Err(CollectionError::Forbidden(format!(
                "{} role required, signed in as {}",
                role.as_str(),
                self.user.role.as_str()
            ))),
            _ => Ok(()),
        }
    }
}
