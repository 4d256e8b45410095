//! Type-tagged element payloads

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CollectionError, CollectionResult};

/// An element value as it crosses the RPC boundary.
///
/// The service stores payloads opaquely. The tag names the producer's
/// element type and is checked when a client decodes the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub type_name: String,
    pub value: JsonValue,
}

impl Payload {
    pub fn encode<T: Serialize>(item: &T) -> CollectionResult<Self> {
        Ok(Self {
            type_name: std::any::type_name::<T>().to_string(),
            value: serde_json::to_value(item)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> CollectionResult<T> {
        let expected = std::any::type_name::<T>();
        if self.type_name != expected {
            return Err(CollectionError::TypeMismatch {
                expected: expected.to_string(),
                actual: self.type_name.clone(),
            });
        }
        Ok(serde_json::from_value(self.value.clone())?)
    }

    /// Canonical text form used to index dictionary keys
    pub(crate) fn canonical(&self) -> String {
        format!("{}:{}", self.type_name, self.value)
    }
}

/// Result of a `try_*` operation: empty is an expected outcome, not an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalValue<T> {
    value: Option<T>,
}

impl<T> ConditionalValue<T> {
    pub fn some(value: T) -> Self {
        Self { value: Some(value) }
    }

    pub fn none() -> Self {
        Self { value: None }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_option(self) -> Option<T> {
        self.value
    }
}

impl<T: Default> ConditionalValue<T> {
    /// `(has_value, value)` with the zero value standing in when empty
    pub fn into_parts(self) -> (bool, T) {
        match self.value {
            Some(value) => (true, value),
            None => (false, T::default()),
        }
    }
}

impl<T> From<Option<T>> for ConditionalValue<T> {
    fn from(value: Option<T>) -> Self {
        Self { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_type_tag_checked() {
        let payload = Payload::encode(&42i32).unwrap();
        assert_eq!(payload.decode::<i32>().unwrap(), 42);

        let err = payload.decode::<String>().unwrap_err();
        assert!(matches!(err, CollectionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_conditional_zero_value() {
        let empty: ConditionalValue<i32> = ConditionalValue::none();
        assert!(!empty.has_value());
        assert_eq!(empty.into_parts(), (false, 0));

        let full = ConditionalValue::some("x".to_string());
        assert_eq!(full.value().map(String::as_str), Some("x"));
    }
}
