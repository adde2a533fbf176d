//! Scene-level errors.

use engine_component::EcsError;

use crate::chunk::ChunkIndex;

/// Errors raised while loading or saving scene data.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// The chunk document could not be decoded or encoded.
    #[error("invalid chunk document: {0}")]
    ChunkJson(#[from] serde_json::Error),

    /// A chunk referenced another chunk that does not exist.
    #[error("chunk {chunk} references unknown {target}")]
    UnknownChunk { chunk: ChunkIndex, target: ChunkIndex },
}
