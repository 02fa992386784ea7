//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid chart name: {name:?} must be a single path segment")]
    InvalidName { name: String },

    #[error("{} already exists and is not a directory", path.display())]
    DestinationConflict { path: PathBuf },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    MalformedSchema {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Chart validation: {message}")]
    Validation { message: String },

    #[error("saving {chart}: {source}")]
    Dependency {
        chart: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Failed to serialize YAML: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl CoreError {
    /// Attach a path to an IO error
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Wrap a failure raised while writing a nested dependency
    pub(crate) fn in_dependency(chart: impl Into<String>, source: CoreError) -> Self {
        Self::Dependency {
            chart: chart.into(),
            source: Box::new(source),
        }
    }

    /// The error that started the chain, with every `Dependency` layer removed
    pub fn root_cause(&self) -> &CoreError {
        let mut current = self;
        while let CoreError::Dependency { source, .. } = current {
            current = source;
        }
        current
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_dependency_chain() {
        let inner = CoreError::InvalidName {
            name: "../evil".to_string(),
        };
        let err = CoreError::in_dependency(
            "app/charts/db",
            CoreError::in_dependency("app/charts/db/charts/cache", inner),
        );

        assert!(matches!(err.root_cause(), CoreError::InvalidName { name } if name == "../evil"));
        assert_eq!(
            err.to_string(),
            "saving app/charts/db: saving app/charts/db/charts/cache: Invalid chart name: \"../evil\" must be a single path segment"
        );
    }

    #[test]
    fn test_root_cause_of_plain_error_is_itself() {
        let err = CoreError::validation("chart.metadata.name is required");
        assert!(matches!(err.root_cause(), CoreError::Validation { .. }));
    }
}
