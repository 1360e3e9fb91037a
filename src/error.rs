use std::path::PathBuf;

use thiserror::Error;

/// Conditions that stop a batch before any texture is converted
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("maketx not set or not found: '{0}'. Pass --maketx <PATH> or put maketx on PATH")]
    ConverterNotFound(PathBuf),

    #[error("OCIO file not found: {0}")]
    ColorConfigNotFound(PathBuf),

    #[error("No OCIO specified and ${0} is not set.")]
    ColorConfigUnset(&'static str),

    #[error("${var} points to non-existent file: {path}")]
    ColorConfigMissing { var: &'static str, path: PathBuf },

    #[error("Texture folder does not exist or is not a directory: {0}")]
    RootNotFound(PathBuf),

    #[error("Failed to list files: {0}")]
    Enumeration(#[from] walkdir::Error),

    #[error("No valid textures in folder (check extensions or filter).")]
    NoTextures,

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, BatchError>;
