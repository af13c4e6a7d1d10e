use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A registered storefront customer.
///
/// Fields the session does not interpret are kept in `extra` so a persisted
/// record round-trips without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub version: u64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub shipping_address_ids: Vec<String>,
    #[serde(default)]
    pub billing_address_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_shipping_address_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_billing_address_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn default_shipping_address(&self) -> Option<&Address> {
        let id = self.default_shipping_address_id.as_deref()?;
        self.addresses.iter().find(|a| a.id.as_deref() == Some(id))
    }

    pub fn default_billing_address(&self) -> Option<&Address> {
        let id = self.default_billing_address_id.as_deref()?;
        self.addresses.iter().find(|a| a.id.as_deref() == Some(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub street_name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    pub country: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Monetary amount in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub cent_amount: i64,
    pub currency_code: String,
    #[serde(default = "default_fraction_digits")]
    pub fraction_digits: u32,
}

fn default_fraction_digits() -> u32 {
    2
}

/// The customer's (or guest's) active cart.
///
/// Opaque to the session beyond identification; line items and discount
/// details stay as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    pub version: u64,
    #[serde(default)]
    pub line_items: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Money>,
    #[serde(default)]
    pub discount_codes: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }
}

/// Login credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
