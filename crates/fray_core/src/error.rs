use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a scene and its assets.
#[derive(Error, Debug)]
pub enum SceneError {
    /// Malformed scene text: unknown class, bad value, unresolvable
    /// reference, or a missing required property. Carries the source line.
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    /// A referenced asset (texture, mesh, cubemap folder) was not found
    /// next to the scene file.
    #[error("asset not found: {0}")]
    AssetNotFound(PathBuf),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type SceneResult<T> = Result<T, SceneError>;
