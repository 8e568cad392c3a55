use serde::{Deserialize, Serialize};

/// Error document returned by the service on non-success responses.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

/// A single entry of the `errors` list on a 422 response.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct FieldError {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(message) = &self.message {
            return write!(f, "{message}");
        }
        let field = self.field.as_deref().unwrap_or("?");
        let code = self.code.as_deref().unwrap_or("invalid");
        match &self.resource {
            Some(resource) => write!(f, "{resource}.{field}: {code}"),
            None => write!(f, "{field}: {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_validation_failure_document() {
        let body = r#"{
            "message": "Validation Failed",
            "errors": [{"resource": "PublicKey", "code": "custom", "field": "key", "message": "key is already in use"}],
            "documentation_url": "https://docs.github.com/rest/deploy-keys"
        }"#;
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message, "Validation Failed");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].to_string(), "key is already in use");
    }

    #[test]
    fn field_error_without_message_uses_code() {
        let err = FieldError {
            resource: Some("PublicKey".into()),
            field: Some("title".into()),
            code: Some("missing_field".into()),
            message: None,
        };
        assert_eq!(err.to_string(), "PublicKey.title: missing_field");
    }
}
