use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("resource name '{0}' is empty")]
    Empty(String),
    #[error("resource name '{name}' does not match {pattern}")]
    Pattern { name: String, pattern: &'static str },
    #[error("resource name '{name}' ends with '{last}', expected id '{id}'")]
    IdMismatch {
        name: String,
        last: String,
        id: String,
    },
}

const MODEL_PATTERN: &str = "namespaces/{namespace}/models/{model}";
const VERSION_PATTERN: &str = "namespaces/{namespace}/models/{model}/versions/{version}";

/// A single path segment: non-empty and slash-free.
fn is_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains('/')
}

/// Canonical model name: `namespaces/{namespace}/models/{model_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelName {
    pub namespace: String,
    pub model_id: String,
}

impl ModelName {
    pub fn new(namespace: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            model_id: model_id.into(),
        }
    }

    pub fn parse(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty(name.to_string()));
        }
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            ["namespaces", ns, "models", id] if is_segment(ns) && is_segment(id) => {
                Ok(Self::new(*ns, *id))
            }
            _ => Err(NameError::Pattern {
                name: name.to_string(),
                pattern: MODEL_PATTERN,
            }),
        }
    }

    /// The `namespaces/{namespace}` prefix used in REST paths.
    pub fn parent(&self) -> String {
        format!("namespaces/{}", self.namespace)
    }

    pub fn version(&self, version_id: impl Into<String>) -> VersionName {
        VersionName {
            model: self.clone(),
            version_id: version_id.into(),
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "namespaces/{}/models/{}", self.namespace, self.model_id)
    }
}

impl FromStr for ModelName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical version name: `namespaces/{namespace}/models/{model_id}/versions/{version_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionName {
    pub model: ModelName,
    pub version_id: String,
}

impl VersionName {
    pub fn parse(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty(name.to_string()));
        }
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            ["namespaces", ns, "models", id, "versions", v]
                if is_segment(ns) && is_segment(id) && is_segment(v) =>
            {
                Ok(Self {
                    model: ModelName::new(*ns, *id),
                    version_id: v.to_string(),
                })
            }
            _ => Err(NameError::Pattern {
                name: name.to_string(),
                pattern: VERSION_PATTERN,
            }),
        }
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/versions/{}", self.model, self.version_id)
    }
}

/// Checks that `name` is a canonical model name whose trailing segment is `id`.
pub fn check_canonical_name(name: &str, id: &str) -> Result<ModelName, NameError> {
    let parsed = ModelName::parse(name)?;
    if parsed.model_id != id {
        return Err(NameError::IdMismatch {
            name: name.to_string(),
            last: parsed.model_id,
            id: id.to_string(),
        });
    }
    Ok(parsed)
}

/// Same invariant for versions: `name` ends with `/versions/{id}`.
pub fn check_canonical_version_name(name: &str, id: &str) -> Result<VersionName, NameError> {
    let parsed = VersionName::parse(name)?;
    if parsed.version_id != id {
        return Err(NameError::IdMismatch {
            name: name.to_string(),
            last: parsed.version_id,
            id: id.to_string(),
        });
    }
    Ok(parsed)
}

/// Model id from pre-namespace names (`models/{id}`, `users/{u}/models/{id}`).
pub fn legacy_model_id(name: &str) -> Option<&str> {
    let parts: Vec<&str> = name.split('/').collect();
    match parts.as_slice() {
        ["models", id] if is_segment(id) => Some(*id),
        ["users" | "organizations", owner, "models", id] if is_segment(owner) && is_segment(id) => {
            Some(*id)
        }
        _ => None,
    }
}

/// Trailing segment of any resource name.
pub fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
