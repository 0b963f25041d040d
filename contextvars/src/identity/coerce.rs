//! Write-time conversion of dynamic values to a variable's declared type.

use crate::errors::TypeCoercionError;
use serde::de::DeserializeOwned;

/// Converts `value` into `T`, failing rather than truncating.
///
/// Floats with an exact integral value are accepted by integer types; any
/// other mismatch is a `TypeCoercionError`.
pub(crate) fn coerce_value<T: DeserializeOwned>(
    variable: &str,
    value: serde_json::Value,
) -> Result<T, TypeCoercionError> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(converted) => Ok(converted),
        Err(err) => {
            if let Some(integral) = exact_integer(&value) {
                if let Ok(converted) = serde_json::from_value::<T>(integral) {
                    return Ok(converted);
                }
            }
            Err(TypeCoercionError::new(
                variable,
                std::any::type_name::<T>(),
                value,
                err.to_string(),
            ))
        }
    }
}

#[allow(
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn exact_integer(value: &serde_json::Value) -> Option<serde_json::Value> {
    if !value.is_f64() {
        return None;
    }
    let float = value.as_f64()?;
    if !float.is_finite() || float.trunc() != float {
        return None;
    }
    if float >= i64::MIN as f64 && float < i64::MAX as f64 {
        return Some(serde_json::json!(float as i64));
    }
    if float >= 0.0 && float < u64::MAX as f64 {
        return Some(serde_json::json!(float as u64));
    }
    None
}
