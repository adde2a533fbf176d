//! ECS data-path errors.
//!
//! Contract violations (wrong pool, full pool, missing manager) panic. Only
//! failures caused by external data, such as malformed JSON from a scene file,
//! are reported through [`EcsError`].

use crate::entity::EntityIndex;
use crate::mask::ComponentKind;

/// Errors raised while moving component data in or out of the ECS.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A component value could not be decoded from JSON.
    #[error("failed to decode {kind} component for {entity}: {source}")]
    Decode {
        /// Component kind being decoded.
        kind: ComponentKind,
        /// Target entity.
        entity: EntityIndex,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A component value could not be encoded to JSON.
    #[error("failed to encode {kind} component for {entity}: {source}")]
    Encode {
        /// Component kind being encoded.
        kind: ComponentKind,
        /// Source entity.
        entity: EntityIndex,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// An archetype default could not be decoded.
    #[error("invalid default for {kind} in archetype '{archetype}': {source}")]
    ArchetypeDefault {
        /// Archetype name.
        archetype: String,
        /// Component kind.
        kind: ComponentKind,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A JSON document referenced a component kind that does not exist.
    #[error("unknown component kind '{0}'")]
    UnknownComponent(String),

    /// Data referenced a component kind that has no registered manager.
    #[error("no manager registered for {0} components")]
    MissingManager(ComponentKind),

    /// A JSON document did not have the expected shape.
    #[error("malformed {what}: {message}")]
    Malformed {
        /// What was being read (e.g. `"archetype"`).
        what: &'static str,
        /// Human-readable description.
        message: String,
    },
}

impl EcsError {
    /// Shorthand for [`EcsError::Malformed`].
    pub(crate) fn malformed(what: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            message: message.into(),
        }
    }
}
