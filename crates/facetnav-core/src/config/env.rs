use crate::error::{NavError, Result};

/// Trimmed value of `name`; unset and blank read the same.
pub(super) fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `name` as a size of at least `min`, or `default` when unset.
pub(super) fn env_size(name: &str, default: usize, min: usize) -> Result<usize> {
    let Some(raw) = env_value(name) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(value) if value >= min => Ok(value),
        _ => Err(NavError::Validation(format!(
            "invalid {name}: expected an integer >= {min}, got `{raw}`"
        ))),
    }
}
