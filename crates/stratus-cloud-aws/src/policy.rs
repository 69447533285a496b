//! IAM-style policy documents
//!
//! Services hand back policies reformatted: keys reordered, whitespace
//! dropped, a lone string where a one-element list was sent (and the other
//! way round). [`policies_equivalent`] compares documents modulo those
//! differences so a refresh does not report a change that is only formatting.

use serde_json::Value;
use stratus_cloud::{CloudError, Result};

/// Parse a policy and re-serialize it in compact form
pub fn normalize_json(policy: &str) -> Result<String> {
    let value: Value = serde_json::from_str(policy)?;
    Ok(serde_json::to_string(&value)?)
}

/// Check that the text is a JSON object
pub fn validate_policy(policy: &str) -> Result<()> {
    match serde_json::from_str::<Value>(policy)? {
        Value::Object(_) => Ok(()),
        _ => Err(CloudError::InvalidConfig(
            "policy must be a JSON object".to_string(),
        )),
    }
}

/// True when both documents say the same thing
///
/// Unparseable input is never equivalent to anything.
pub fn policies_equivalent(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => canonical(a) == canonical(b),
        _ => false,
    }
}

fn canonical(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(canonical).collect();
            if items.len() == 1 {
                return items.remove(0);
            }
            // Statement, Action and Resource lists are unordered
            items.sort_by_cached_key(|v| v.to_string());
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, canonical(v))).collect()),
        other => other,
    }
}
