//! Type-checked accessors on [`PropertyMap`], for code that consumes a
//! property bag with an expected schema (provider inputs, engine settings).
//!
//! These are the one place in the model that reports errors instead of
//! panicking: an absent-but-required key or a key of the wrong kind is bad
//! external data, and callers compose the returned errors into validation
//! reports. A missing optional key is not an error; neither is an explicit
//! null, which is treated as absent throughout.

use thiserror::Error;

use crate::property::{Computed, Output, PropertyKey, PropertyMap, PropertyValue};
use crate::tokens::Urn;

/// A recoverable validation error from the typed accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// A property marked required is absent (or null). Distinguished from a
    /// type mismatch so callers can decide to substitute a default.
    #[error("required property '{key}' is missing")]
    RequiredMissing { key: PropertyKey },

    #[error("property '{key}' is not {expected} ({actual})")]
    WrongType {
        key: PropertyKey,
        expected: &'static str,
        actual: String,
    },

    #[error("property '{key}' array element {index} is not {expected} ({actual})")]
    WrongElementType {
        key: PropertyKey,
        index: usize,
        expected: &'static str,
        actual: String,
    },
}

impl PropertyError {
    /// True for the required-property-missing case.
    pub fn is_required_missing(&self) -> bool {
        matches!(self, PropertyError::RequiredMissing { .. })
    }

    fn wrong_type(key: &str, expected: &'static str, actual: &PropertyValue) -> Self {
        PropertyError::WrongType {
            key: PropertyKey::new(key),
            expected,
            actual: actual.type_label(),
        }
    }

    fn wrong_element_type(
        key: &str,
        index: usize,
        expected: &'static str,
        actual: &PropertyValue,
    ) -> Self {
        PropertyError::WrongElementType {
            key: PropertyKey::new(key),
            index,
            expected,
            actual: actual.type_label(),
        }
    }
}

/// Unwraps the result of a `required = true` lookup, which never comes back
/// empty without an error.
fn req<T>(looked_up: Result<Option<T>, PropertyError>) -> Result<T, PropertyError> {
    looked_up.map(|v| v.expect("required lookup returned neither value nor error"))
}

impl PropertyMap {
    fn present(&self, key: &str, required: bool) -> Result<Option<&PropertyValue>, PropertyError> {
        match self.get(key) {
            Some(v) if !v.is_null() => Ok(Some(v)),
            _ if required => Err(PropertyError::RequiredMissing {
                key: PropertyKey::new(key),
            }),
            _ => Ok(None),
        }
    }

    /// Reads `key` as a bool; `required` controls whether absence is an error.
    pub fn bool_or_err(&self, key: &str, required: bool) -> Result<Option<bool>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_bool() => Ok(Some(v.bool_value())),
            Some(v) => Err(PropertyError::wrong_type(key, "a bool", v)),
        }
    }

    /// Reads `key` as a number; `required` controls whether absence is an error.
    pub fn number_or_err(&self, key: &str, required: bool) -> Result<Option<f64>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_number() => Ok(Some(v.number_value())),
            Some(v) => Err(PropertyError::wrong_type(key, "a number", v)),
        }
    }

    /// Reads `key` as a string; `required` controls whether absence is an error.
    pub fn string_or_err(&self, key: &str, required: bool) -> Result<Option<String>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_string() => Ok(Some(v.string_value().to_string())),
            Some(v) => Err(PropertyError::wrong_type(key, "a string", v)),
        }
    }

    /// Reads `key` as an array; `required` controls whether absence is an error.
    pub fn array_or_err(
        &self,
        key: &str,
        required: bool,
    ) -> Result<Option<Vec<PropertyValue>>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_array() => Ok(Some(v.array_value().to_vec())),
            Some(v) => Err(PropertyError::wrong_type(key, "an array", v)),
        }
    }

    /// Reads `key` as an array of objects, validating every element.
    pub fn object_array_or_err(
        &self,
        key: &str,
        required: bool,
    ) -> Result<Option<Vec<PropertyMap>>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_array() => {
                let mut objects = Vec::new();
                for (index, elem) in v.array_value().iter().enumerate() {
                    if elem.is_object() {
                        objects.push(elem.object_value().clone());
                    } else {
                        return Err(PropertyError::wrong_element_type(key, index, "an object", elem));
                    }
                }
                Ok(Some(objects))
            }
            Some(v) => Err(PropertyError::wrong_type(key, "an array", v)),
        }
    }

    /// Reads `key` as an array of strings, validating every element.
    pub fn string_array_or_err(
        &self,
        key: &str,
        required: bool,
    ) -> Result<Option<Vec<String>>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_array() => {
                let mut strings = Vec::new();
                for (index, elem) in v.array_value().iter().enumerate() {
                    if elem.is_string() {
                        strings.push(elem.string_value().to_string());
                    } else {
                        return Err(PropertyError::wrong_element_type(key, index, "a string", elem));
                    }
                }
                Ok(Some(strings))
            }
            Some(v) => Err(PropertyError::wrong_type(key, "an array", v)),
        }
    }

    /// Reads `key` as an object; `required` controls whether absence is an error.
    pub fn object_or_err(
        &self,
        key: &str,
        required: bool,
    ) -> Result<Option<PropertyMap>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_object() => Ok(Some(v.object_value().clone())),
            Some(v) => Err(PropertyError::wrong_type(key, "an object", v)),
        }
    }

    /// Reads `key` as a resource reference; `required` controls whether
    /// absence is an error.
    pub fn resource_or_err(&self, key: &str, required: bool) -> Result<Option<Urn>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_resource() => Ok(Some(v.resource_value().clone())),
            Some(v) => Err(PropertyError::wrong_type(key, "a resource", v)),
        }
    }

    /// Reads `key` as a computed value; `required` controls whether absence
    /// is an error.
    pub fn computed_or_err(
        &self,
        key: &str,
        required: bool,
    ) -> Result<Option<Computed>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_computed() => Ok(Some(v.computed_value().clone())),
            Some(v) => Err(PropertyError::wrong_type(key, "a computed value", v)),
        }
    }

    /// Reads `key` as an output value; `required` controls whether absence
    /// is an error.
    pub fn output_or_err(
        &self,
        key: &str,
        required: bool,
    ) -> Result<Option<Output>, PropertyError> {
        match self.present(key, required)? {
            None => Ok(None),
            Some(v) if v.is_output() => Ok(Some(v.output_value().clone())),
            Some(v) => Err(PropertyError::wrong_type(key, "an output value", v)),
        }
    }

    pub fn req_bool(&self, key: &str) -> Result<bool, PropertyError> {
        req(self.bool_or_err(key, true))
    }

    pub fn req_number(&self, key: &str) -> Result<f64, PropertyError> {
        req(self.number_or_err(key, true))
    }

    pub fn req_string(&self, key: &str) -> Result<String, PropertyError> {
        req(self.string_or_err(key, true))
    }

    pub fn req_array(&self, key: &str) -> Result<Vec<PropertyValue>, PropertyError> {
        req(self.array_or_err(key, true))
    }

    pub fn req_object_array(&self, key: &str) -> Result<Vec<PropertyMap>, PropertyError> {
        req(self.object_array_or_err(key, true))
    }

    pub fn req_string_array(&self, key: &str) -> Result<Vec<String>, PropertyError> {
        req(self.string_array_or_err(key, true))
    }

    pub fn req_object(&self, key: &str) -> Result<PropertyMap, PropertyError> {
        req(self.object_or_err(key, true))
    }

    pub fn req_resource(&self, key: &str) -> Result<Urn, PropertyError> {
        req(self.resource_or_err(key, true))
    }

    pub fn req_computed(&self, key: &str) -> Result<Computed, PropertyError> {
        req(self.computed_or_err(key, true))
    }

    pub fn req_output(&self, key: &str) -> Result<Output, PropertyError> {
        req(self.output_or_err(key, true))
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>, PropertyError> {
        self.bool_or_err(key, false)
    }

    pub fn opt_number(&self, key: &str) -> Result<Option<f64>, PropertyError> {
        self.number_or_err(key, false)
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>, PropertyError> {
        self.string_or_err(key, false)
    }

    pub fn opt_array(&self, key: &str) -> Result<Option<Vec<PropertyValue>>, PropertyError> {
        self.array_or_err(key, false)
    }

    pub fn opt_object_array(&self, key: &str) -> Result<Option<Vec<PropertyMap>>, PropertyError> {
        self.object_array_or_err(key, false)
    }

    pub fn opt_string_array(&self, key: &str) -> Result<Option<Vec<String>>, PropertyError> {
        self.string_array_or_err(key, false)
    }

    pub fn opt_object(&self, key: &str) -> Result<Option<PropertyMap>, PropertyError> {
        self.object_or_err(key, false)
    }

    pub fn opt_resource(&self, key: &str) -> Result<Option<Urn>, PropertyError> {
        self.resource_or_err(key, false)
    }

    pub fn opt_computed(&self, key: &str) -> Result<Option<Computed>, PropertyError> {
        self.computed_or_err(key, false)
    }

    pub fn opt_output(&self, key: &str) -> Result<Option<Output>, PropertyError> {
        self.output_or_err(key, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::new(s)
    }

    fn sample() -> PropertyMap {
        [
            (key("enabled"), PropertyValue::from(true)),
            (key("count"), PropertyValue::from(2.0)),
            (key("name"), PropertyValue::from("hello")),
            (key("absent"), PropertyValue::Null),
            (
                key("listeners"),
                PropertyValue::Array(vec![
                    PropertyValue::Object(
                        [(key("port"), PropertyValue::from(80.0))].into_iter().collect(),
                    ),
                    PropertyValue::Object(
                        [(key("port"), PropertyValue::from(443.0))].into_iter().collect(),
                    ),
                ]),
            ),
            (
                key("zones"),
                PropertyValue::Array(vec![
                    PropertyValue::from("eu-1"),
                    PropertyValue::from("eu-2"),
                ]),
            ),
            (
                key("db"),
                PropertyValue::from(Urn::new("urn:gantry:prod::db")),
            ),
            (
                key("address"),
                PropertyValue::output(PropertyValue::from("")),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_req_string() {
        let m = sample();
        assert_eq!(m.req_string("name").unwrap(), "hello");

        let err = m.req_string("missing").unwrap_err();
        assert!(err.is_required_missing());
        assert_eq!(
            err,
            PropertyError::RequiredMissing {
                key: key("missing")
            }
        );

        let err = m.req_string("count").unwrap_err();
        assert!(!err.is_required_missing());
        assert_eq!(
            err.to_string(),
            "property 'count' is not a string (number)"
        );
    }

    #[test]
    fn test_null_counts_as_absent() {
        let m = sample();
        assert_eq!(m.opt_string("absent").unwrap(), None);
        assert!(m.req_string("absent").unwrap_err().is_required_missing());
    }

    #[test]
    fn test_scalar_accessors() {
        let m = sample();
        assert!(m.req_bool("enabled").unwrap());
        assert_eq!(m.req_number("count").unwrap(), 2.0);
        assert_eq!(m.opt_bool("missing").unwrap(), None);
        assert_eq!(m.opt_number("missing").unwrap(), None);
        assert!(m.opt_bool("count").is_err());
    }

    #[test]
    fn test_typed_arrays() {
        let m = sample();
        let listeners = m.req_object_array("listeners").unwrap();
        assert_eq!(listeners.len(), 2);
        assert_eq!(listeners[1].req_number("port").unwrap(), 443.0);
        assert_eq!(
            m.req_string_array("zones").unwrap(),
            vec!["eu-1".to_string(), "eu-2".to_string()]
        );
    }

    #[test]
    fn test_array_element_errors_carry_the_index() {
        let m: PropertyMap = [(
            key("zones"),
            PropertyValue::Array(vec![
                PropertyValue::from("eu-1"),
                PropertyValue::from(7.0),
            ]),
        )]
        .into_iter()
        .collect();
        assert_eq!(
            m.req_string_array("zones").unwrap_err(),
            PropertyError::WrongElementType {
                key: key("zones"),
                index: 1,
                expected: "a string",
                actual: "number".to_string(),
            }
        );
        assert!(m.req_object_array("zones").is_err());
    }

    #[test]
    fn test_resource_and_latent_accessors() {
        let m = sample();
        assert_eq!(
            m.req_resource("db").unwrap(),
            Urn::new("urn:gantry:prod::db")
        );
        let out = m.req_output("address").unwrap();
        assert_eq!(out.eventual(), &PropertyValue::from(""));
        assert_eq!(m.opt_computed("address").unwrap_err().to_string(),
            "property 'address' is not a computed value (output<string>)");
        assert_eq!(m.opt_computed("missing").unwrap(), None);
    }
}
