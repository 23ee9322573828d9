//! # Core Module
//!
//! Shared configuration for the viewport kernel.

pub mod config;

pub use config::{
    CacheSettings, CameraSettings, Config, ConfigError, DebugDumpSettings, OverlaySettings,
    StrategySettings, ViewportConfig, ViewportSettings,
};
