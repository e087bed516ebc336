use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A field-level GraphQL error, in the shape it is serialized into a response.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<GraphQLErrorPathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    pub fn from_message_and_code(message: impl Into<String>, code: &str) -> Self {
        GraphQLError {
            message: message.into(),
            path: None,
            extensions: Some(serde_json::json!({ "code": code })),
        }
    }

    pub fn with_path(mut self, path: Vec<GraphQLErrorPathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError {
            message,
            path: None,
            extensions: None,
        }
    }
}

impl From<&str> for GraphQLError {
    fn from(message: &str) -> Self {
        message.to_string().into()
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum GraphQLErrorPathSegment {
    String(String),
    Index(usize),
}

impl From<&str> for GraphQLErrorPathSegment {
    fn from(value: &str) -> Self {
        GraphQLErrorPathSegment::String(value.to_string())
    }
}

impl From<usize> for GraphQLErrorPathSegment {
    fn from(value: usize) -> Self {
        GraphQLErrorPathSegment::Index(value)
    }
}

/// Kinds of authorization failures that surface as messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyErrorKind {
    /// The predicate denied access to a field or type.
    PolicyCheckFailed,
    /// Replacement mode was used on a field that is not `String`.
    ReplacementNotSupported,
    /// The configured replacement value is not a string.
    InvalidReplacementValue,
}

/// Formats the message for a policy failure on `name` (a field name, or a type
/// name for reference resolvers).
pub fn policy_error_message(kind: PolicyErrorKind, name: &str) -> String {
    match kind {
        PolicyErrorKind::PolicyCheckFailed => format!("Failed auth policy check on {}", name),
        PolicyErrorKind::ReplacementNotSupported => format!(
            "Replacement can only be applied to String fields, '{}' is not a String field",
            name
        ),
        PolicyErrorKind::InvalidReplacementValue => format!(
            "Replacement value for '{}' must be a string or a function producing a string",
            name
        ),
    }
}

/// Errors raised while registering a policy set. These are fatal to the host.
#[derive(Debug, thiserror::Error)]
pub enum AuthzConfigError {
    #[error("applyPolicy must be provided")]
    MissingApplyPolicy,
    #[error("authDirective must be provided when mode is 'directive'")]
    MissingAuthDirective,
    #[error("authDirective cannot be used together with mode 'external'")]
    DirectiveWithExternalMode,
    #[error("policy must be provided when mode is 'external'")]
    MissingExternalPolicy,
    #[error("Invalid external policy: {0}")]
    InvalidExternalPolicy(String),
    #[error("outputPolicyErrors.valueOverride must be provided when outputPolicyErrors.enabled is false")]
    MissingValueOverride,
    #[error("outputPolicyErrors.valueOverride must be a string or a function")]
    InvalidValueOverride,
}
