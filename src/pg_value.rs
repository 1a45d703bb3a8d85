//! Rendering of PostgreSQL result values as display text.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgRow, PgValueFormat, PgValueRef};
use sqlx::types::ipnet::IpNet;
use sqlx::types::JsonValue;
use sqlx::{Column, Row, TypeInfo, ValueRef};

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

pub fn render_row(row: &PgRow) -> crate::output::ResultRow {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), render_value(row, column.ordinal())))
        .collect()
}

pub fn render_value(row: &PgRow, index: usize) -> String {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(err) => return format!("<{err}>"),
    };
    if raw.is_null() {
        return "NULL".to_string();
    }
    if raw.format() == PgValueFormat::Text {
        if let Ok(text) = raw.as_str() {
            return text.to_string();
        }
    }

    let type_name = raw.type_info().name().to_string();

    if let Some(text) = decode_known(row, index) {
        return text;
    }

    match type_name.as_str() {
        "NUMERIC" => raw
            .as_bytes()
            .ok()
            .and_then(numeric_to_string)
            .unwrap_or_else(|| fallback(&type_name, &raw)),
        "UUID" => raw
            .as_bytes()
            .ok()
            .and_then(uuid_to_string)
            .unwrap_or_else(|| fallback(&type_name, &raw)),
        _ => fallback(&type_name, &raw),
    }
}

fn decode_known(row: &PgRow, index: usize) -> Option<String> {
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Some(v);
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<i16, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<f32, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<DateTime<Utc>, _>(index) {
        return Some(v.to_rfc3339());
    }
    if let Ok(v) = row.try_get::<NaiveDateTime, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<NaiveDate, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<NaiveTime, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<JsonValue, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<IpNet, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Some(hex(&v));
    }
    None
}

/// Keeps the raw bytes visible for types with no decoder.
fn fallback(type_name: &str, raw: &PgValueRef<'_>) -> String {
    match raw.as_bytes() {
        Ok(bytes) => format!("<{type_name} {}>", hex(bytes)),
        Err(_) => format!("<{type_name}>"),
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Decodes the binary `NUMERIC` wire format: ndigits, weight, sign and
/// display scale headers followed by base-10000 digits, most significant first.
pub fn numeric_to_string(bytes: &[u8]) -> Option<String> {
    let header = |at: usize| -> Option<u16> {
        Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
    };

    let ndigits = header(0)? as usize;
    let weight = header(2)? as i16 as i32;
    let sign = header(4)?;
    let dscale = header(6)? as usize;

    match sign {
        NUMERIC_NAN => return Some("NaN".to_string()),
        NUMERIC_PINF => return Some("Infinity".to_string()),
        NUMERIC_NINF => return Some("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| header(8 + i * 2))
        .collect::<Option<Vec<u16>>>()?;
    let digit = |idx: i32| -> u16 {
        usize::try_from(idx)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        let _ = write!(out, "{}", digit(0));
        for idx in 1..=weight {
            let _ = write!(out, "{:04}", digit(idx));
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut idx = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(idx));
            idx += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Some(out)
}

pub fn uuid_to_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 16 {
        return None;
    }
    let mut out = String::with_capacity(36);
    for (i, b) in bytes.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        let _ = write!(out, "{b:02x}");
    }
    Some(out)
}
