//! Row to JSON conversion.
//!
//! Statements are run over each driver's text protocol, so every non-NULL
//! value can be read back as its textual form. Conversion is two-phase:
//! 1. `TypeCategory` classifies the column from its SQL type name, unless the
//!    session type map overrides it.
//! 2. The value is decoded once as its natural type and rendered as JSON.

use crate::models::{ColumnMetadata, DatabaseType, TypeMap, ValueKind};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    /// Kept as text to preserve precision
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
}

impl From<ValueKind> for TypeCategory {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Text => Self::Text,
            ValueKind::Integer => Self::Integer,
            ValueKind::Float => Self::Float,
            ValueKind::Boolean => Self::Boolean,
            ValueKind::Json => Self::Json,
            ValueKind::Binary => Self::Binary,
        }
    }
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    TypeCategory::Text
}

/// Classify a column, consulting the session type map first.
pub fn resolve_category(type_name: &str, db: DatabaseType, type_map: &TypeMap) -> TypeCategory {
    type_map
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(type_name))
        .map(|(_, kind)| TypeCategory::from(*kind))
        .unwrap_or_else(|| categorize_type(type_name, db))
}

// =============================================================================
// Value Rendering
// =============================================================================

/// Per-statement decoding settings.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions<'a> {
    pub type_map: &'a TypeMap,
    pub decode_binary: bool,
    pub max_field_size: Option<usize>,
}

/// Decode binary data to JSON value.
///
/// If `decode_binary` is true, attempts to decode as UTF-8 text first.
/// Falls back to base64 encoding if not valid UTF-8 or if `decode_binary` is false.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    if decode_binary {
        match std::str::from_utf8(bytes) {
            Ok(s) => JsonValue::String(s.to_string()),
            Err(_) => JsonValue::String(STANDARD.encode(bytes)),
        }
    } else {
        JsonValue::String(STANDARD.encode(bytes))
    }
}

/// Cut `text` to at most `limit` bytes without splitting a character.
pub fn truncate_field(mut text: String, limit: Option<usize>) -> String {
    if let Some(limit) = limit {
        if text.len() > limit {
            let mut end = limit;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
    }
    text
}

/// Render the textual form of a value according to its category.
pub fn render_text(text: String, category: TypeCategory, opts: &DecodeOptions<'_>) -> JsonValue {
    match category {
        TypeCategory::Integer => {
            let trimmed = text.trim();
            if let Ok(v) = trimmed.parse::<i64>() {
                JsonValue::from(v)
            } else if let Ok(v) = trimmed.parse::<u64>() {
                JsonValue::from(v)
            } else {
                JsonValue::String(text)
            }
        }
        TypeCategory::Float => match text.trim().parse::<f64>() {
            Ok(v) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::String(text)),
            Err(_) => JsonValue::String(text),
        },
        TypeCategory::Boolean => {
            let lowered = text.trim().to_lowercase();
            match lowered.as_str() {
                "t" | "true" | "1" | "y" | "yes" | "on" => JsonValue::Bool(true),
                "f" | "false" | "0" | "n" | "no" | "off" => JsonValue::Bool(false),
                _ => JsonValue::String(text),
            }
        }
        TypeCategory::Json => {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        }
        TypeCategory::Binary => {
            let bytes = truncate_field(text, opts.max_field_size).into_bytes();
            decode_binary_value(&bytes, opts.decode_binary)
        }
        TypeCategory::Decimal | TypeCategory::Text => {
            JsonValue::String(truncate_field(text, opts.max_field_size))
        }
    }
}

/// Decode one column of any driver's row.
fn decode_column<'r, R>(
    row: &'r R,
    idx: usize,
    category: TypeCategory,
    opts: &DecodeOptions<'_>,
) -> JsonValue
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database>,
    Vec<u8>: Decode<'r, R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    f64: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return JsonValue::Null,
        Ok(_) => {}
        Err(e) => {
            tracing::error!(column = idx, error = %e, "Failed to read column");
            return JsonValue::Null;
        }
    }

    match category {
        // Natively typed values first (SQLite stores them unconverted)
        TypeCategory::Integer => {
            if let Ok(v) = row.try_get::<i64, _>(idx) {
                return JsonValue::from(v);
            }
        }
        TypeCategory::Float => {
            if let Ok(v) = row.try_get::<f64, _>(idx) {
                if let Some(n) = serde_json::Number::from_f64(v) {
                    return JsonValue::Number(n);
                }
            }
        }
        TypeCategory::Binary => {
            if let Ok(mut bytes) = row.try_get_unchecked::<Vec<u8>, _>(idx) {
                if let Some(limit) = opts.max_field_size {
                    bytes.truncate(limit);
                }
                return decode_binary_value(&bytes, opts.decode_binary);
            }
        }
        _ => {}
    }

    match row.try_get_unchecked::<String, _>(idx) {
        Ok(text) => render_text(text, category, opts),
        Err(_) => match row.try_get_unchecked::<Vec<u8>, _>(idx) {
            Ok(bytes) => render_text(
                String::from_utf8_lossy(&bytes).into_owned(),
                category,
                opts,
            ),
            Err(e) => {
                tracing::error!(column = idx, error = %e, "Failed to decode column");
                JsonValue::Null
            }
        },
    }
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self, opts: &DecodeOptions<'_>) -> serde_json::Map<String, JsonValue>;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

macro_rules! impl_row_to_json {
    ($row:ty, $db:expr) => {
        impl RowToJson for $row {
            fn to_json_map(&self, opts: &DecodeOptions<'_>) -> serde_json::Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let category =
                            resolve_category(col.type_info().name(), $db, opts.type_map);
                        (
                            col.name().to_string(),
                            decode_column(self, idx, category, opts),
                        )
                    })
                    .collect()
            }

            fn column_metadata(&self) -> Vec<ColumnMetadata> {
                self.columns()
                    .iter()
                    .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, DatabaseType::MySQL);
impl_row_to_json!(PgRow, DatabaseType::PostgreSQL);
impl_row_to_json!(SqliteRow, DatabaseType::SQLite);
