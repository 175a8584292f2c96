//! Shipping address attached to an order.

use serde::{Deserialize, Serialize};

/// Errors produced when validating a [`ShippingAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A required field is missing or blank.
    #[error("shipping address {0} is required")]
    Missing(&'static str),
}

/// Where an order ships to. All four fields are required.
///
/// Deserialization accepts missing fields (they default to empty) so that a
/// partial address reaches [`ShippingAddress::validated`] and is reported as
/// a named missing field instead of a generic parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Country.
    pub country: String,
}

impl ShippingAddress {
    /// Trim every field and ensure none is blank.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Missing` naming the first blank field.
    pub fn validated(self) -> Result<Self, AddressError> {
        let address = required("address", self.address)?;
        let city = required("city", self.city)?;
        let postal_code = required("postal_code", self.postal_code)?;
        let country = required("country", self.country)?;

        Ok(Self {
            address,
            city,
            postal_code,
            country,
        })
    }
}

fn required(field: &'static str, value: String) -> Result<String, AddressError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AddressError::Missing(field));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn full() -> ShippingAddress {
        ShippingAddress {
            address: " 1 Lego Lane ".to_string(),
            city: "Billund".to_string(),
            postal_code: "7190".to_string(),
            country: "DK".to_string(),
        }
    }

    #[test]
    fn test_full_address_is_trimmed() {
        let address = full().validated().unwrap();
        assert_eq!(address.address, "1 Lego Lane");
    }

    #[test]
    fn test_blank_field_is_named() {
        let mut address = full();
        address.postal_code = "   ".to_string();
        assert_eq!(
            address.validated(),
            Err(AddressError::Missing("postal_code"))
        );
    }

    #[test]
    fn test_partial_json_reports_missing_field() {
        let address: ShippingAddress =
            serde_json::from_str(r#"{"address":"1 Lego Lane","city":"Billund"}"#).unwrap();
        assert_eq!(
            address.validated(),
            Err(AddressError::Missing("postal_code"))
        );
    }
}
