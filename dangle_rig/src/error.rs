use dangle_scene::{ConstraintKind, SceneError};
use thiserror::Error;

use crate::chain::BranchedChainError;

pub type RigResult<T> = Result<T, RigError>;

/// A selected chain that cannot be rigged. The chain is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(transparent)]
    Branched(#[from] BranchedChainError),
    #[error("chain `{chain}` has {len} joint(s), need at least 2")]
    TooShort { chain: String, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RigError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Something expected after a host call is missing. Stages depending on
    /// it are skipped for that chain; nothing is rolled back.
    #[error("`{chain}`: could not resolve {what}")]
    Resolution { chain: String, what: String },

    #[error("{kind} on `{node}` rejected: {source}")]
    Constraint {
        node: String,
        kind: ConstraintKind,
        #[source]
        source: SceneError,
    },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl RigError {
    pub fn resolution(chain: impl Into<String>, what: impl Into<String>) -> Self {
        Self::Resolution {
            chain: chain.into(),
            what: what.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
