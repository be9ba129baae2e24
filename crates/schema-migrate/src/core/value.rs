//! SQL value types for the executor seam.
//!
//! The engine only reads and writes the ledger's columns, so the value
//! model is deliberately small: integers, text, booleans and timestamps.

use chrono::{DateTime, Utc};

use crate::error::{MigrateError, Result};

/// A single database value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// Text/string data.
    Text(String),

    /// Timestamp in UTC.
    Timestamp(DateTime<Utc>),
}

/// One result row, decoded positionally.
pub type Row = Vec<SqlValue>;

impl SqlValue {
    /// Read the value as an i32, accepting wider integer encodings.
    pub fn as_i32(&self) -> Result<i32> {
        match self {
            SqlValue::I32(v) => Ok(*v),
            SqlValue::I64(v) => i32::try_from(*v)
                .map_err(|_| MigrateError::sql(format!("Integer out of i32 range: {}", v))),
            other => Err(type_mismatch("i32", other)),
        }
    }

    /// Read the value as an i64, accepting narrower integer encodings.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            SqlValue::I32(v) => Ok(i64::from(*v)),
            SqlValue::I64(v) => Ok(*v),
            other => Err(type_mismatch("i64", other)),
        }
    }

    /// Read the value as a bool. Integer 0/1 is accepted for backends
    /// that surface BIT columns as numbers.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::I32(0) | SqlValue::I64(0) => Ok(false),
            SqlValue::I32(1) | SqlValue::I64(1) => Ok(true),
            other => Err(type_mismatch("bool", other)),
        }
    }

    /// Read the value as text.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            SqlValue::Text(v) => Ok(v),
            other => Err(type_mismatch("text", other)),
        }
    }

    /// Read the value as a UTC timestamp.
    pub fn as_timestamp(&self) -> Result<DateTime<Utc>> {
        match self {
            SqlValue::Timestamp(v) => Ok(*v),
            other => Err(type_mismatch("timestamp", other)),
        }
    }

    /// Whether the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

fn type_mismatch(expected: &str, got: &SqlValue) -> MigrateError {
    MigrateError::sql(format!("Expected {} value, got {:?}", expected, got))
}
