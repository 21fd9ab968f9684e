//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and loading (Config, TwitchConfig, FleetSection, ...)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup checks

mod defaults;
mod types;
pub mod validation;

pub use types::{
    BanchoConfig, BotConfig, Config, ConfigError, DatabaseConfig, FleetSection, LogConfig,
    MembershipSection, MetricsConfig, OsuSection, TwitchConfig,
};
pub use validation::{ValidationError, validate};
