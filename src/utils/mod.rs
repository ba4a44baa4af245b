use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", value)
}

/// Accepts both `1234.56` and `1234,56`; thousands separators are dropped when
/// both separators are present. Non-finite results (`NaN`, `inf`, overflow) are rejected.
pub fn parse_decimal(value: &str) -> Result<f64> {
    let trimmed = value.trim();
    let cleaned = if trimmed.contains('.') && trimmed.contains(',') {
        if trimmed.rfind(',') > trimmed.rfind('.') {
            trimmed.replace('.', "").replace(',', ".")
        } else {
            trimmed.replace(',', "")
        }
    } else {
        trimmed.replace(',', ".")
    };
    let parsed = cleaned
        .parse::<f64>()
        .map_err(|e| anyhow!("Parse decimal: {}", e))?;
    if !parsed.is_finite() {
        return Err(anyhow!("Parse decimal: {} is not a finite number", trimmed));
    }
    Ok(parsed)
}

pub fn normalize_date(value: Option<String>) -> Option<String> {
    let raw = value?.trim().to_string();
    if raw.is_empty() {
        return None;
    }

    let formats = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in formats.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(&raw, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    Some(raw)
}

pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Returns the base64 body of a data URI, or the input untouched when it has no prefix.
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => payload,
    }
}
