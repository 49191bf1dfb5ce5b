//! Lenient numeric decoding for API and subgraph payloads
//!
//! Subgraphs encode BigDecimal as strings, REST APIs use plain numbers, and some
//! mix both.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

/// Accept `1.5`, `"1.5"` or `null`
pub fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Numeric>::deserialize(deserializer)?;
    Ok(match value {
        Some(Numeric::Number(n)) => Some(n),
        Some(Numeric::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    }
    .filter(|n| n.is_finite()))
}
