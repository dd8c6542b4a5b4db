use std::{io, path::PathBuf};

/// Everything that can stop a planning pass. None of these are retried: a
/// failed pass never yields a partial plan.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("failed to load schema: {0}")]
    Schema(String),
    #[error("invalid operation: {0}")]
    Operation(String),
    #[error("no service is registered to resolve field \"{field_name}\" on type \"{type_name}\"")]
    UnresolvedFieldLocation {
        type_name: String,
        field_name: String,
    },
    #[error("fragment \"{0}\" spreads itself")]
    FragmentCycle(String),
}

impl PlanningError {
    pub(crate) fn operation(message: impl Into<String>) -> Self {
        PlanningError::Operation(message.into())
    }

    pub(crate) fn unresolved(type_name: &str, field_name: &str) -> Self {
        PlanningError::UnresolvedFieldLocation {
            type_name: type_name.to_string(),
            field_name: field_name.to_string(),
        }
    }
}

pub type PlanningResult<T> = Result<T, PlanningError>;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("failed to parse schema for service {service}: {message}")]
    ServiceSchema { service: String, message: String },
    #[error("no services have been registered")]
    NoServices,
    #[error(transparent)]
    Planning(#[from] PlanningError),
}
