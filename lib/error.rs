//! Error types shared across the crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or out-of-domain parameters, or an unsupported chain shape.
    #[error("configuration error: {0}")]
    Config(String),

    /// An initial state whose length doesn't match the composite space.
    #[error("dimension mismatch: expected state of length {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The solver failed to produce a finite solution.
    #[error("integration error: {0}")]
    Integration(String),

    #[error("error parsing configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn integration<S: Into<String>>(msg: S) -> Self {
        Self::Integration(msg.into())
    }
}
