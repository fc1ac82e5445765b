//! Conversions between PostgreSQL values and JSON
//!
//! Rows are decoded column by column according to the type PostgreSQL
//! reports for each column. Positional JSON parameters are bound against the
//! parameter types PostgreSQL infers when the statement is prepared, so an
//! agent can pass `[1, "ada"]` without knowing the column types.

use std::error::Error;
use std::str::FromStr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use thiserror::Error;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, Kind, ToSql, Type};
use uuid::Uuid;

use crate::envelope::Row;

// ============================================================================
// Row Decoding
// ============================================================================

/// Accepts any column type without decoding it; only NULL-ness survives
struct Opaque;

impl<'a> FromSql<'a> for Opaque {
    fn from_sql(_: &Type, _: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Opaque)
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Decode a result row into a column-name → value mapping
pub fn row_to_json(row: &tokio_postgres::Row) -> Result<Row, tokio_postgres::Error> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn column_value(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> Result<Value, tokio_postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| float_value(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(float_value),
        Type::NUMERIC => row
            .try_get::<_, Option<NumericText>>(idx)?
            .map(|v| Value::String(v.0)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::String)
        }
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?,
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map(|v| Value::String(v.to_string())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| Value::String(v.to_rfc3339())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| Value::String(v.to_string())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|v| Value::String(v.to_string())),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map(|v| Value::String(bytea_hex(&v))),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => row
            .try_get::<_, Option<Vec<Option<String>>>>(idx)?
            .map(|v| Value::Array(v.into_iter().map(|s| s.map_or(Value::Null, Value::String)).collect())),
        Type::INT4_ARRAY => row
            .try_get::<_, Option<Vec<Option<i32>>>>(idx)?
            .map(|v| Value::Array(v.into_iter().map(|n| n.map_or(Value::Null, Value::from)).collect())),
        Type::INT8_ARRAY => row
            .try_get::<_, Option<Vec<Option<i64>>>>(idx)?
            .map(|v| Value::Array(v.into_iter().map(|n| n.map_or(Value::Null, Value::from)).collect())),
        _ if matches!(ty.kind(), Kind::Enum(_)) => {
            row.try_get::<_, Option<EnumLabel>>(idx)?.map(|v| Value::String(v.0))
        }
        _ => row
            .try_get::<_, Option<Opaque>>(idx)?
            .map(|_| Value::String(format!("<unsupported type {}>", ty.name()))),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Enum values travel as their UTF-8 label
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

/// A numeric value rendered exactly as text
///
/// Decoded straight from the binary wire format, so precision beyond what a
/// fixed-width decimal can hold and the special values `NaN`, `Infinity` and
/// `-Infinity` all survive.
struct NumericText(String);

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        numeric_to_string(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

fn read_u16(raw: &[u8], at: usize) -> Result<u16, Box<dyn Error + Sync + Send>> {
    raw.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated numeric value".into())
}

/// Render a binary numeric: header of ndigits, weight, sign and display
/// scale, followed by ndigits base-10000 digits, most significant first.
/// The first digit is worth 10000^weight.
fn numeric_to_string(raw: &[u8]) -> Result<String, Box<dyn Error + Sync + Send>> {
    let ndigits = read_u16(raw, 0)? as usize;
    let weight = read_u16(raw, 2)? as i16 as i32;
    let sign = read_u16(raw, 4)?;
    let dscale = read_u16(raw, 6)? as usize;

    if raw.len() != 8 + 2 * ndigits {
        return Err("numeric length does not match its digit count".into());
    }
    let digits = (0..ndigits)
        .map(|i| read_u16(raw, 8 + 2 * i))
        .collect::<Result<Vec<_>, _>>()?;

    let negative = match sign {
        NUMERIC_POS => false,
        NUMERIC_NEG => true,
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid numeric sign 0x{:04x}", other).into()),
    };

    // digit i is worth 10000^(weight - i); missing positions are zero
    let digit_at = |power: i32| -> u16 {
        let i = weight - power;
        if i < 0 {
            0
        } else {
            digits.get(i as usize).copied().unwrap_or(0)
        }
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit_at(weight).to_string());
        for power in (0..weight).rev() {
            out.push_str(&format!("{:04}", digit_at(power)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut power = -1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit_at(power)));
            power -= 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(v.to_string()))
}

/// Render bytes in PostgreSQL's hex output format (`\x0aff`)
fn bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

// ============================================================================
// Parameter Binding
// ============================================================================

/// A JSON parameter converted to the type PostgreSQL expects
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(Decimal),
    Text(String),
    Json(Value),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
}

impl ToSql for SqlParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlParam::Null => Ok(IsNull::Yes),
            SqlParam::Bool(v) => v.to_sql(ty, out),
            SqlParam::Int2(v) => v.to_sql(ty, out),
            SqlParam::Int4(v) => v.to_sql(ty, out),
            SqlParam::Int8(v) => v.to_sql(ty, out),
            SqlParam::Float4(v) => v.to_sql(ty, out),
            SqlParam::Float8(v) => v.to_sql(ty, out),
            SqlParam::Numeric(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => {
                // enum labels and text types share the raw UTF-8 encoding
                out.extend_from_slice(v.as_bytes());
                Ok(IsNull::No)
            }
            SqlParam::Json(v) => v.to_sql(ty, out),
            SqlParam::Uuid(v) => v.to_sql(ty, out),
            SqlParam::Timestamp(v) => v.to_sql(ty, out),
            SqlParam::TimestampTz(v) => v.to_sql(ty, out),
            SqlParam::Date(v) => v.to_sql(ty, out),
        }
    }

    // the variant was picked from the statement's parameter type in bind_params
    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Parameters that cannot be bound to a prepared statement
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("statement expects {expected} parameters, got {got}")]
    Count { expected: usize, got: usize },

    #[error("parameter ${index} ({ty}): {reason}")]
    Value {
        index: usize,
        ty: String,
        reason: String,
    },
}

/// Convert positional JSON values to the statement's parameter types
pub fn bind_params(types: &[Type], values: &[Value]) -> Result<Vec<SqlParam>, ParamError> {
    if types.len() != values.len() {
        return Err(ParamError::Count {
            expected: types.len(),
            got: values.len(),
        });
    }

    types
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (ty, value))| {
            to_param(value, ty).map_err(|reason| ParamError::Value {
                index: i + 1,
                ty: ty.name().to_string(),
                reason,
            })
        })
        .collect()
}

/// Borrow bound parameters in the form the driver takes
pub fn as_sql_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn to_param(value: &Value, ty: &Type) -> Result<SqlParam, String> {
    if value.is_null() {
        return Ok(SqlParam::Null);
    }

    match *ty {
        Type::BOOL => match value {
            Value::Bool(b) => Ok(SqlParam::Bool(*b)),
            Value::String(s) => parse_bool(s).map(SqlParam::Bool),
            other => Err(format!("expected a boolean, got {}", other)),
        },
        Type::INT2 => {
            let v = as_i64(value)?;
            i16::try_from(v)
                .map(SqlParam::Int2)
                .map_err(|_| format!("{} is out of range for smallint", v))
        }
        Type::INT4 => {
            let v = as_i64(value)?;
            i32::try_from(v)
                .map(SqlParam::Int4)
                .map_err(|_| format!("{} is out of range for integer", v))
        }
        Type::INT8 => as_i64(value).map(SqlParam::Int8),
        Type::FLOAT4 => as_f64(value).map(|v| SqlParam::Float4(v as f32)),
        Type::FLOAT8 => as_f64(value).map(SqlParam::Float8),
        Type::NUMERIC => {
            let text = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.trim().to_string(),
                other => return Err(format!("expected a number, got {}", other)),
            };
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(SqlParam::Numeric)
                .map_err(|e| format!("invalid numeric {:?}: {}", text, e))
        }
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Ok(SqlParam::Text(as_text(value)))
        }
        Type::JSON | Type::JSONB => Ok(SqlParam::Json(value.clone())),
        Type::UUID => Uuid::parse_str(as_str(value)?)
            .map(SqlParam::Uuid)
            .map_err(|e| format!("invalid uuid: {}", e)),
        Type::TIMESTAMP => parse_timestamp(as_str(value)?).map(SqlParam::Timestamp),
        Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(as_str(value)?)
            .map(|d| SqlParam::TimestampTz(d.with_timezone(&Utc)))
            .map_err(|e| format!("invalid RFC 3339 timestamp: {}", e)),
        Type::DATE => NaiveDate::parse_from_str(as_str(value)?, "%Y-%m-%d")
            .map(SqlParam::Date)
            .map_err(|e| format!("invalid date: {}", e)),
        _ if matches!(ty.kind(), Kind::Enum(_)) => Ok(SqlParam::Text(as_text(value))),
        _ => Err("unsupported parameter type".to_string()),
    }
}

fn as_i64(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("expected an integer, got {}", n)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("expected an integer, got {:?}", s)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn as_f64(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("expected a number, got {}", n)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("expected a number, got {:?}", s)),
        other => Err(format!("expected a number, got {}", other)),
    }
}

fn as_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {}", value))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        _ => Err(format!("expected a boolean, got {:?}", s)),
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("invalid timestamp {:?}: {}", s, e))
}

// ============================================================================
// Identifiers
// ============================================================================

/// Quote an SQL identifier, doubling any embedded double quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
