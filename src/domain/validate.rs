//! Field-level format checks shared by the entity validators.

use url::Url;

use super::error::DomainError;

/// Reject absent or whitespace-only required text.
pub fn required(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::missing(field));
    }
    Ok(())
}

/// A patch may leave a required field untouched, but must not blank it.
pub fn required_if_present(field: &'static str, value: Option<&str>) -> Result<(), DomainError> {
    match value {
        Some(value) => required(field, value),
        None => Ok(()),
    }
}

/// Accept absolute `http`/`https` URLs with a host.
pub fn web_url(field: &'static str, value: &str) -> Result<(), DomainError> {
    let parsed = Url::parse(value.trim())
        .map_err(|err| DomainError::malformed(field, format!("not a valid URL: {err}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DomainError::malformed(
            field,
            format!("unsupported scheme `{}`", parsed.scheme()),
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(DomainError::malformed(field, "URL has no host"));
    }
    Ok(())
}

/// Empty optional URLs are treated as absent.
pub fn optional_web_url(field: &'static str, value: Option<&str>) -> Result<(), DomainError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => web_url(field, value),
        _ => Ok(()),
    }
}

pub fn optional_email(field: &'static str, value: Option<&str>) -> Result<(), DomainError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(());
    };

    let Some((local, domain)) = value.split_once('@') else {
        return Err(DomainError::malformed(field, "missing `@`"));
    };
    if local.is_empty() || domain.contains('@') || value.contains(char::is_whitespace) {
        return Err(DomainError::malformed(field, "not a valid e-mail address"));
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(DomainError::malformed(field, "e-mail domain is incomplete"));
    }
    Ok(())
}

/// Bound free text so oversized payloads fail before reaching storage.
pub fn max_chars(field: &'static str, value: Option<&str>, limit: usize) -> Result<(), DomainError> {
    match value {
        Some(value) if value.chars().count() > limit => Err(DomainError::malformed(
            field,
            format!("longer than {limit} characters"),
        )),
        _ => Ok(()),
    }
}
