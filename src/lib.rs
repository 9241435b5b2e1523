//! Window lifecycle and spatial-interaction core for a desktop shell.
//!
//! The crate owns windows as rectangles with a lifecycle state and an opaque
//! content slot. Hosted applications plug in through [`app::HostedApplication`];
//! the shell drives everything through [`engine::WindowManagerContext`].

pub mod actor;
pub mod app;
pub mod capsule;
pub mod common;
pub mod engine;
pub mod interaction;
pub mod model;
pub mod persistence;
pub mod sys;
