//! JSON encoding of values and result sets for the REST API.
//!
//! INT64 travels as a decimal string, BYTES as base64, FLOAT64 as a number or
//! one of `"NaN"`, `"Infinity"`, `"-Infinity"`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::{ColumnInfo, QueryResult, Row, Value};
use crate::error::{Result, SpannerError};

/// A Spanner type descriptor as it appears in result metadata and `paramTypes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDesc {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_element_type: Option<Box<TypeDesc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub struct_type: Option<StructType>,
}

impl TypeDesc {
    fn scalar(code: &str) -> Self {
        Self {
            code: code.to_string(),
            array_element_type: None,
            struct_type: None,
        }
    }

    /// Renders the type as SQL would spell it, e.g. `ARRAY<INT64>`.
    pub fn display_name(&self) -> String {
        match (self.code.as_str(), &self.array_element_type) {
            ("ARRAY", Some(elem)) => format!("ARRAY<{}>", elem.display_name()),
            _ => self.code.clone(),
        }
    }
}

/// Field list of a STRUCT type (also used for result row types).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// One named, typed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: TypeDesc,
}

/// Result metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub row_type: Option<StructType>,
    #[serde(default)]
    pub transaction: Option<TransactionRef>,
}

/// Transaction returned inline with a result.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRef {
    pub id: String,
}

/// Row counts for DML results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetStats {
    #[serde(default)]
    pub row_count_exact: Option<String>,
    #[serde(default)]
    pub row_count_lower_bound: Option<String>,
}

/// Response body of `:executeSql`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub metadata: Option<ResultSetMetadata>,
    #[serde(default)]
    pub rows: Vec<Vec<Json>>,
    #[serde(default)]
    pub stats: Option<ResultSetStats>,
}

impl ResultSet {
    /// Returns the exact (or lower-bound) DML row count.
    pub fn row_count(&self) -> Result<i64> {
        let stats = self.stats.as_ref();
        let count = stats
            .and_then(|s| s.row_count_exact.as_deref())
            .or_else(|| stats.and_then(|s| s.row_count_lower_bound.as_deref()))
            .unwrap_or("0");
        count
            .parse()
            .map_err(|_| SpannerError::internal(format!("Invalid row count '{count}'")))
    }

    /// Decodes metadata and rows into a [`QueryResult`].
    pub fn into_query_result(self) -> Result<QueryResult> {
        let fields = self
            .metadata
            .and_then(|m| m.row_type)
            .map(|t| t.fields)
            .unwrap_or_default();

        let columns: Vec<ColumnInfo> = fields
            .iter()
            .map(|f| ColumnInfo::new(f.name.clone(), f.field_type.display_name()))
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|raw| decode_row(raw, &fields))
            .collect::<Result<Vec<Row>>>()?;

        Ok(QueryResult::with_data(columns, rows))
    }
}

fn decode_row(raw: &[Json], fields: &[Field]) -> Result<Row> {
    if raw.len() != fields.len() {
        return Err(SpannerError::internal(format!(
            "Row has {} values but metadata describes {} columns",
            raw.len(),
            fields.len()
        )));
    }
    raw.iter()
        .zip(fields)
        .map(|(value, field)| decode_value(value, &field.field_type))
        .collect()
}

/// Decodes one JSON value of the given type.
pub fn decode_value(json: &Json, ty: &TypeDesc) -> Result<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = || {
        SpannerError::internal(format!(
            "Cannot decode {json} as {}",
            ty.display_name()
        ))
    };

    match ty.code.as_str() {
        "BOOL" => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
        "INT64" | "ENUM" => json
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| json.as_i64())
            .map(Value::Int)
            .ok_or_else(mismatch),
        "FLOAT64" | "FLOAT32" => match json {
            Json::Number(n) => n.as_f64().map(Value::Float).ok_or_else(mismatch),
            Json::String(s) => match s.as_str() {
                "NaN" => Ok(Value::Float(f64::NAN)),
                "Infinity" => Ok(Value::Float(f64::INFINITY)),
                "-Infinity" => Ok(Value::Float(f64::NEG_INFINITY)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        "BYTES" | "PROTO" => {
            let encoded = json.as_str().ok_or_else(mismatch)?;
            STANDARD
                .decode(encoded)
                .map(Value::Bytes)
                .map_err(|e| SpannerError::internal(format!("Invalid base64 in BYTES value: {e}")))
        }
        "ARRAY" => {
            let elem = ty.array_element_type.as_deref().ok_or_else(mismatch)?;
            let items = json.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .map(|item| decode_value(item, elem))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "STRUCT" => {
            let fields = ty
                .struct_type
                .as_ref()
                .map(|s| s.fields.as_slice())
                .unwrap_or_default();
            let items = json.as_array().ok_or_else(mismatch)?;
            decode_row(items, fields).map(Value::Array)
        }
        // STRING, TIMESTAMP, DATE, NUMERIC, JSON and anything newer.
        _ => match json {
            Json::String(s) => Ok(Value::String(s.clone())),
            other => Ok(Value::String(other.to_string())),
        },
    }
}

/// Encodes one value for the request body.
pub fn encode_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::String(i.to_string()),
        Value::Float(f) if f.is_nan() => Json::String("NaN".to_string()),
        Value::Float(f) if f.is_infinite() && *f > 0.0 => Json::String("Infinity".to_string()),
        Value::Float(f) if f.is_infinite() => Json::String("-Infinity".to_string()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::String(STANDARD.encode(b)),
        Value::Array(items) => Json::Array(items.iter().map(encode_value).collect()),
    }
}

/// Returns the type descriptor of a parameter, or `None` when it cannot be
/// inferred (NULL, empty arrays); such parameters are sent untyped.
pub fn param_type(value: &Value) -> Option<TypeDesc> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(TypeDesc::scalar("BOOL")),
        Value::Int(_) => Some(TypeDesc::scalar("INT64")),
        Value::Float(_) => Some(TypeDesc::scalar("FLOAT64")),
        Value::String(_) => Some(TypeDesc::scalar("STRING")),
        Value::Bytes(_) => Some(TypeDesc::scalar("BYTES")),
        Value::Array(items) => {
            let elem = items.iter().find_map(param_type)?;
            Some(TypeDesc {
                code: "ARRAY".to_string(),
                array_element_type: Some(Box::new(elem)),
                struct_type: None,
            })
        }
    }
}

/// Builds the `params` and `paramTypes` objects of a request.
pub fn encode_params(params: &[(String, Value)]) -> (Map<String, Json>, Map<String, Json>) {
    let mut values = Map::new();
    let mut types = Map::new();
    for (name, value) in params {
        values.insert(name.clone(), encode_value(value));
        if let Some(ty) = param_type(value) {
            if let Ok(ty) = serde_json::to_value(ty) {
                types.insert(name.clone(), ty);
            }
        }
    }
    (values, types)
}
