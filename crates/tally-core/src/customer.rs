//! Customer input normalization.
//!
//! Names, phones and addresses are trimmed; emails are trimmed and
//! lower-cased; blank optionals become `None`. Repositories only ever see
//! the normalized form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationResult;
use crate::types::Customer;
use crate::validation::{normalize_optional, validate_customer_name};

/// Fields accepted when creating a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl NewCustomer {
    pub fn named(name: impl Into<String>) -> Self {
        NewCustomer {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Validates and normalizes the input.
    pub fn normalize(self) -> ValidationResult<NewCustomer> {
        Ok(NewCustomer {
            name: validate_customer_name(&self.name)?,
            phone: normalize_optional(self.phone.as_deref()),
            email: normalize_email(self.email.as_deref()),
            address: normalize_optional(self.address.as_deref()),
            notes: normalize_optional(self.notes.as_deref()),
        })
    }

    /// Builds a fresh record with zero totals. Expects normalized input.
    pub fn into_customer(self, now: DateTime<Utc>) -> Customer {
        Customer {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            phone: self.phone,
            email: self.email,
            address: self.address,
            notes: self.notes,
            total_purchases: 0,
            total_spent_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial edit of a customer's contact details.
///
/// Running totals are not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    pub name: Option<String>,
    /// `Some("")` clears the field; same for the other optionals.
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl CustomerUpdate {
    /// Applies the edit to `customer` in place.
    pub fn apply_to(self, customer: &mut Customer, now: DateTime<Utc>) -> ValidationResult<()> {
        if let Some(name) = self.name.as_deref() {
            customer.name = validate_customer_name(name)?;
        }
        if let Some(phone) = self.phone.as_deref() {
            customer.phone = normalize_optional(Some(phone));
        }
        if let Some(email) = self.email.as_deref() {
            customer.email = normalize_email(Some(email));
        }
        if let Some(address) = self.address.as_deref() {
            customer.address = normalize_optional(Some(address));
        }
        if let Some(notes) = self.notes.as_deref() {
            customer.notes = normalize_optional(Some(notes));
        }
        customer.updated_at = now;
        Ok(())
    }
}

fn normalize_email(email: Option<&str>) -> Option<String> {
    normalize_optional(email).map(|e| e.to_lowercase())
}
