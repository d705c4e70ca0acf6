//! debrig-lib: Core types and logic for debrig
//!
//! This crate provides the building blocks of a debrig package build:
//! - `Stage`: the fixed, ordered phases of a package build
//! - `Preset`: adapters supplying stage implementations for a build technology
//! - `Pipeline`: walks the stages, resolving each through overrides and presets
//! - `BuildDriver`: sandboxes (host or container) that build commands run in
//! - `orchestrate`: sandboxed `dpkg-buildpackage` runs with a debug shell on failure

pub mod build;
pub mod config;
pub mod consts;
pub mod driver;
pub mod orchestrate;
pub mod package;
pub mod pipeline;
pub mod platform;
pub mod preset;
pub mod process;
pub mod stage;
