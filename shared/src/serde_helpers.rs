//! Lenient serde helpers for vendor JSON
//!
//! 远端平台的字段类型不稳定：同一字段可能是字符串、数字、布尔值或 null。
//! 这里统一做宽松解析，解析失败时回落到默认值而不是整单报错。

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// 厂商 JSON 中可能出现的标量
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Deserialize a flag that may arrive as bool, 0/1, "0"/"1", "true"/"false" or null
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(match value {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Int(i)) => i != 0,
        Some(Scalar::Float(f)) => f != 0.0,
        Some(Scalar::Str(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        None => false,
    })
}

/// Deserialize a value that may be a string or a number into its string form (null → "")
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(match value {
        Some(Scalar::Str(s)) => s,
        Some(Scalar::Int(i)) => i.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

/// Deserialize a monetary amount from a string ("1 234,50"), number or null (→ 0)
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(match value {
        Some(Scalar::Int(i)) => Decimal::from(i),
        Some(Scalar::Float(f)) => Decimal::from_f64(f).unwrap_or_default(),
        Some(Scalar::Str(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            Decimal::from_str(&cleaned).unwrap_or_default()
        }
        Some(Scalar::Bool(_)) | None => Decimal::ZERO,
    })
}
