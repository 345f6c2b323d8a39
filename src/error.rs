//! Renderer error types

use thiserror::Error;

use crate::backend::{DeviceError, TextureFormat};
use crate::scene::SceneObjectId;

/// Errors surfaced by the renderer.
///
/// Configuration errors and resource exhaustion are fatal. Per-object data
/// problems and missing shader variants never show up here: the object is
/// skipped or the effect is passed through.
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("compositor node type `{0}` is not registered")]
    UnregisteredNodeType(&'static str),
    #[error("compositor node type `{0}` is registered twice")]
    DuplicateNodeType(&'static str),
    #[error("compositor node dependency cycle through `{0}`")]
    CyclicNodeDependency(&'static str),
    #[error("node `{node}` requested `{resource}` but no input produced it")]
    MissingResource {
        node: &'static str,
        resource: &'static str,
    },
    #[error("render target format {0:?} is not supported by the device")]
    UnsupportedTargetFormat(TextureFormat),
    #[error("compositor has not been resolved")]
    CompositorNotResolved,
    #[error("renderer is not initialized")]
    NotInitialized,
    #[error("renderer is already initialized")]
    AlreadyInitialized,
    #[error("renderer has been destroyed")]
    Destroyed,
    #[error("view of camera {0:?} rendered outside begin_frame/end_frame")]
    ViewNotInFrame(SceneObjectId),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

pub type RendererResult<T> = Result<T, RendererError>;
