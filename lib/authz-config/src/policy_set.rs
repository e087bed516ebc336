use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One independently registered set of authorization policies.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct PolicySetConfig {
    /// Name of the directive to extract policies from, e.g. `auth` for `@auth(...)`.
    ///
    /// Mutually exclusive with `mode: external`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_directive: Option<String>,

    /// Where policies come from.
    #[serde(default)]
    pub mode: PolicyMode,

    /// The policy table used in `external` mode.
    ///
    /// Keys are type names, values are objects mapping field names to a policy.
    /// The type-level policy lives under the reserved `__typePolicy` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,

    /// Hide types and fields the caller cannot pass policy for from introspection.
    #[serde(default)]
    pub filter_schema: bool,

    #[serde(default)]
    pub output_policy_errors: OutputPolicyErrorsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    #[default]
    Directive,
    External,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputPolicyErrorsConfig {
    /// When disabled, denied fields resolve to `value_override` instead of an error.
    #[serde(default = "default_output_policy_errors_enabled")]
    pub enabled: bool,

    /// Replacement value for denied fields. Only string values are supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_override: Option<Value>,
}

fn default_output_policy_errors_enabled() -> bool {
    true
}

impl Default for OutputPolicyErrorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_output_policy_errors_enabled(),
            value_override: None,
        }
    }
}
