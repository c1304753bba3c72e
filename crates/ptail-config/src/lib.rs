//! ptail log setup configuration.
//!
//! This crate provides:
//! - The color token grammar (`green`, `grey_on_white`, ...)
//! - Typed rules for the ordered `pattern -> {color, format, label}` YAML file
//! - Loading with "missing file means empty setup" semantics
//! - Semantic validation (patterns compile, formats carry named groups)

pub mod color;
pub mod log_setup;
pub mod validate;

pub use color::{ColorError, ColorName, ColorToken};
pub use log_setup::{
    LogRule, LogRuleSpec, LogSetup, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, DEFAULT_LINE_FORMAT,
};
pub use validate::{ConfigError, ConfigResult};
