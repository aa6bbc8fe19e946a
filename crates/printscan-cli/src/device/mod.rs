//! Device discovery layer.
//!
//! The discovery engine is provided by printscan-core; this module adapts it to
//! one-shot and watch-mode CLI use.

pub mod discovery;
