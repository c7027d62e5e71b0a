use thiserror::Error;

/// Boxed error returned by external collaborators (completion backends).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single schema violation, addressed by a dotted path such as
/// `questions[2].reasoning`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

pub(crate) fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum LaddrrError {
    #[error("not initialized: run 'laddrr init'")]
    NotInitialized,

    #[error("invalid input for {flow}: {}", join_violations(.violations))]
    InvalidInput {
        flow: String,
        violations: Vec<Violation>,
    },

    #[error("generation failed for {flow}: {reason}")]
    GenerationFailed { flow: String, reason: String },

    #[error("completion service unavailable for {flow}: {source}")]
    Transport {
        flow: String,
        #[source]
        source: BoxError,
    },

    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("record not found in '{key}': {id}")]
    NotFound { key: String, id: String },

    #[error("invalid store key '{0}': must be lowercase alphanumeric with '_' or '-'")]
    InvalidKey(String),

    #[error("survey is closed: {0}")]
    SurveyClosed(String),

    #[error("unsupported collection version {found} for '{key}'")]
    UnsupportedVersion { key: String, found: u64 },

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LaddrrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_lists_every_violation() {
        let err = LaddrrError::InvalidInput {
            flow: "rewriteText".into(),
            violations: vec![
                Violation {
                    path: "textToRewrite".into(),
                    reason: "must not be empty".into(),
                },
                Violation {
                    path: "extra".into(),
                    reason: "unknown field".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("rewriteText"));
        assert!(msg.contains("textToRewrite: must not be empty"));
        assert!(msg.contains("extra: unknown field"));
    }

    #[test]
    fn transport_keeps_underlying_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = LaddrrError::Transport {
            flow: "rewriteText".into(),
            source: Box::new(cause),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "refused");
    }
}
