//! Parameter declarations and template substitution

use crate::core::error::DefinitionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A declared parameter: a named string value with an optional default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,

    /// Default value, used when no binding is given
    #[serde(default)]
    pub default: Option<String>,

    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(&self) -> bool {
        self.default.is_none()
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9][A-Za-z0-9_./-]*)\s*\}\}")
            .expect("placeholder regex is valid")
    })
}

/// Names of all `{{ name }}` placeholders referenced by a template.
pub fn placeholder_names(template: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Substitute `{{ name }}` placeholders with values.
///
/// Unknown placeholders are left intact; definition-time validation
/// guarantees none remain by the time a step executes.
pub fn render(template: &str, values: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex::Captures| {
            match values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolve a set of parameter declarations against concrete bindings.
///
/// Defaults fill unbound parameters; a required parameter without a binding
/// is an `UnboundParameter` error, and a binding that names no declared
/// parameter is an `UnknownParameter` error.
pub fn resolve(
    specs: &[ParamSpec],
    bindings: &HashMap<String, String>,
    scope: &str,
) -> Result<HashMap<String, String>, DefinitionError> {
    for key in bindings.keys() {
        if !specs.iter().any(|s| &s.name == key) {
            return Err(DefinitionError::UnknownParameter {
                scope: scope.to_string(),
                param: key.clone(),
            });
        }
    }

    let mut values = HashMap::new();
    for spec in specs {
        match bindings.get(&spec.name).or(spec.default.as_ref()) {
            Some(value) => {
                values.insert(spec.name.clone(), value.clone());
            }
            None => {
                return Err(DefinitionError::UnboundParameter {
                    scope: scope.to_string(),
                    param: spec.name.clone(),
                });
            }
        }
    }
    Ok(values)
}
