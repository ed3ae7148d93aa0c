//! Base implementation of records.
use crate::error::RecordError;
use std::collections::HashMap;

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value.
    Scalar(f32),

    /// A text value.
    String(String),
}

/// A container of key-value pairs.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, RecordError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(RecordError::RecordValueTypeError("Scalar".to_string())),
            None => Err(RecordError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string from the record.
    pub fn get_string(&self, k: &str) -> Result<String, RecordError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(RecordError::RecordValueTypeError("String".to_string())),
            None => Err(RecordError::RecordKeyError(k.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_overwrites() {
        let mut record = Record::from_scalar("vehicles", 12.0);
        record.insert("vehicles", RecordValue::Scalar(3.0));
        record.insert("reason", RecordValue::String("Drained".to_string()));

        assert_eq!(record.get_scalar("vehicles").unwrap(), 3.0);
        assert_eq!(record.get_string("reason").unwrap(), "Drained");
    }

    #[test]
    fn test_typed_getters_report_errors() {
        let record = Record::from_slice(&[
            ("step", RecordValue::Scalar(4.0)),
            ("reason", RecordValue::String("TimeBudget".to_string())),
        ]);

        assert_eq!(
            record.get_scalar("reason"),
            Err(RecordError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(
            record.get_string("step"),
            Err(RecordError::RecordValueTypeError("String".to_string()))
        );
        assert_eq!(
            record.get_scalar("missing"),
            Err(RecordError::RecordKeyError("missing".to_string()))
        );
    }
}
