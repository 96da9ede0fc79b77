use thiserror::Error;

use crate::resolver::ResolveError;

/// Error codes for assembly failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssembleErrorCode {
    /// ASM1001: A sub-questionnaire could not be resolved
    ResolutionFailed = 1001,
    /// ASM1002: Sub-questionnaires reference each other in a cycle
    CycleDetected = 1002,
    /// ASM1003: Operation input is not a usable Questionnaire
    InvalidParameters = 1003,
    /// ASM1004: JSON (de)serialization failed
    Serialization = 1004,
    /// ASM1005: File system access failed
    Io = 1005,
}

impl std::fmt::Display for AssembleErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ASM{:04}", *self as u32)
    }
}

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Failed to resolve sub-questionnaire {canonical}: {source}")]
    ResolutionFailed {
        canonical: String,
        #[source]
        source: ResolveError,
    },

    #[error("Sub-questionnaire cycle detected at {canonical}: {}", .chain.join(" -> "))]
    CycleDetected { canonical: String, chain: Vec<String> },

    #[error("Invalid $assemble input: {message}")]
    InvalidParameters { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssembleError>;

impl AssembleError {
    pub fn resolution_failed<S: Into<String>>(canonical: S, source: ResolveError) -> Self {
        Self::ResolutionFailed {
            canonical: canonical.into(),
            source,
        }
    }

    pub fn cycle_detected<S: Into<String>>(canonical: S, chain: Vec<String>) -> Self {
        Self::CycleDetected {
            canonical: canonical.into(),
            chain,
        }
    }

    pub fn invalid_parameters<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    pub fn code(&self) -> AssembleErrorCode {
        match self {
            AssembleError::ResolutionFailed { .. } => AssembleErrorCode::ResolutionFailed,
            AssembleError::CycleDetected { .. } => AssembleErrorCode::CycleDetected,
            AssembleError::InvalidParameters { .. } => AssembleErrorCode::InvalidParameters,
            AssembleError::Serialization(_) => AssembleErrorCode::Serialization,
            AssembleError::Io(_) => AssembleErrorCode::Io,
        }
    }

    /// The canonical this error is about, if any.
    pub fn canonical(&self) -> Option<&str> {
        match self {
            AssembleError::ResolutionFailed { canonical, .. }
            | AssembleError::CycleDetected { canonical, .. } => Some(canonical),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failed_names_canonical() {
        let err = AssembleError::resolution_failed(
            "mod://missing",
            ResolveError::NotFound {
                canonical: "mod://missing".to_string(),
            },
        );
        assert_eq!(err.code(), AssembleErrorCode::ResolutionFailed);
        assert_eq!(format!("{}", err.code()), "ASM1001");
        assert_eq!(err.canonical(), Some("mod://missing"));
        assert!(err.to_string().contains("mod://missing"));
    }

    #[test]
    fn test_cycle_message() {
        let err = AssembleError::cycle_detected(
            "mod://a",
            vec!["mod://root".into(), "mod://a".into(), "mod://b".into(), "mod://a".into()],
        );
        assert_eq!(
            err.to_string(),
            "Sub-questionnaire cycle detected at mod://a: mod://root -> mod://a -> mod://b -> mod://a"
        );
        assert_eq!(format!("{}", err.code()), "ASM1002");
    }
}
