use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Unauthorized(String),
    #[error("{no_access} ({0})", no_access = crate::access::NO_ACCESS)]
    Forbidden(String),
    #[error("{detail} (HTTP {status})")]
    Backend { status: u16, detail: String },
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} must be one of: {allowed}")]
    NotAllowed { field: &'static str, allowed: String },
    #[error("{0}")]
    Rule(String),
}

impl ValidationError {
    pub fn not_allowed(field: &'static str, allowed: &[&str]) -> Self {
        ValidationError::NotAllowed {
            field,
            allowed: allowed.join(", "),
        }
    }
}

/// Extracts the message from a `{"detail": string | array}` error body.
///
/// Array entries are either plain strings or validation objects carrying a
/// `msg` field; both are joined with `, `.
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(text) => Some(text.clone()),
                    Value::Object(fields) => fields
                        .get("msg")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_detail_is_returned_verbatim() {
        let body = r#"{"detail": "Incorrect email or password"}"#;
        assert_eq!(error_detail(body).as_deref(), Some("Incorrect email or password"));
    }

    #[test]
    fn array_detail_is_joined() {
        let body = r#"{"detail": [
            {"loc": ["body", "email"], "msg": "field required", "type": "value_error.missing"},
            "password too short"
        ]}"#;
        assert_eq!(
            error_detail(body).as_deref(),
            Some("field required, password too short")
        );
    }

    #[test]
    fn missing_detail_yields_none() {
        assert_eq!(error_detail("<html>bad gateway</html>"), None);
        assert_eq!(error_detail(r#"{"message": "nope"}"#), None);
    }
}
