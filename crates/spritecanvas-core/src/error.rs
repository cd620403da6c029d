//! Error types for canvas setup and backend resource acquisition.
//!
//! Only runtime conditions are reported through these types. Calling a
//! mutation on an invalid canvas, or addressing a tile or sprite slot out of
//! range, is a caller bug and panics instead.

use std::fmt;

/// Failure reported by a [`RenderBackend`](crate::backend::RenderBackend)
/// while creating a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend has not been initialized (no device / surface yet).
    NotReady,
    /// A handle passed to the backend does not name a live resource.
    UnknownHandle(&'static str, u32),
    /// Backend-specific failure, with a human readable reason.
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotReady => write!(f, "render backend is not ready"),
            BackendError::UnknownHandle(kind, id) => write!(f, "unknown {kind} handle {id}"),
            BackendError::Other(reason) => write!(f, "render backend error: {reason}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Error type returned by [`TileCanvas::setup`](crate::canvas::TileCanvas::setup)
/// and by sheet construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
    /// A configuration value is zero or exceeds its fixed maximum.
    InvalidConfig {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },
    /// `setup` was called on a canvas that is already valid.
    AlreadyValid,
    /// Sheet pixel data does not match the declared image size.
    InvalidImage {
        width: u32,
        height: u32,
        len: usize,
    },
    /// Sprite size is zero or does not fit the sheet image.
    InvalidSpriteSize { width: u32, height: u32 },
    /// The rendering backend failed to create a resource.
    Backend(BackendError),
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasError::InvalidConfig {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "invalid canvas config: {field} = {value} (allowed {min}..={max})")
            }
            CanvasError::AlreadyValid => write!(f, "canvas is already set up"),
            CanvasError::InvalidImage { width, height, len } => write!(
                f,
                "sheet image of {width}x{height} needs {} bytes, got {len}",
                (*width as usize) * (*height as usize) * 4
            ),
            CanvasError::InvalidSpriteSize { width, height } => {
                write!(f, "invalid sprite size {width}x{height}")
            }
            CanvasError::Backend(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CanvasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CanvasError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for CanvasError {
    fn from(e: BackendError) -> Self {
        CanvasError::Backend(e)
    }
}
