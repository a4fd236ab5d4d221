//! Scene components.
//!
//! This crate provides the camera used to view rendered geometry.

pub mod camera;

pub use camera::{Camera, Perspective};
