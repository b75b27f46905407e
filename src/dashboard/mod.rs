//! Dashboard UI Module
//!
//! The occupancy monitor window, plus the theme and components it shares
//! with the slot editor.

pub mod app;
pub mod components;
pub mod theme;

pub use app::{run_dashboard, MonitorApp, VideoChoice};
