//! Asset loading for the renderer.
//!
//! This crate turns files on disk into geometry the render layer can
//! upload:
//! - OBJ model loading with triangulated, single-index meshes
//! - Normal generation for models that ship without them
//! - A built-in cube for running with no model file at all

pub mod error;
pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use model::{Mesh, Model};
