// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Process configuration for the shim, sourced from the environment.

use std::env;
use std::path::PathBuf;
use std::sync::RwLock;

use log::warn;
use once_cell::sync::Lazy;
use thiserror::Error;

pub const DEFAULT_MAX_KERNELS: usize = 1024;
pub const DEFAULT_MAX_ARG_BYTES: usize = 4096;

/// What the C entry points do when the core reports an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log and terminate the process with status 1.
    #[default]
    Fatal,
    /// Log and hand a HIP status code back to the caller.
    Recoverable,
}

impl ErrorPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fatal" | "exit" => Some(Self::Fatal),
            "recoverable" | "return" => Some(Self::Recoverable),
            _ => None,
        }
    }
}

/// Runtime configurable shim settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimConfig {
    /// Verbose diagnostics (`HIP_DEBUG`).
    pub debug: bool,
    pub error_policy: ErrorPolicy,
    pub device_ordinal: i32,
    /// Ceiling on registered kernels per fat binary.
    pub max_kernels: usize,
    /// Ceiling on the staged argument bytes of one launch.
    pub max_arg_bytes: usize,
    /// Pass the configured stream to the launch instead of the default stream.
    pub honor_stream: bool,
    /// Explicit HIP runtime library; `None` searches the usual sonames.
    pub library: Option<PathBuf>,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            debug: debug_enabled(env::var("HIP_DEBUG").ok().as_deref()),
            error_policy: env::var("HIPBYPTR_ERROR_POLICY")
                .ok()
                .and_then(|v| {
                    let policy = ErrorPolicy::parse(&v);
                    if policy.is_none() {
                        warn!("unknown HIPBYPTR_ERROR_POLICY {v:?}, using fatal");
                    }
                    policy
                })
                .unwrap_or_default(),
            device_ordinal: env_number("HIPBYPTR_DEVICE", 0),
            max_kernels: env_number("HIPBYPTR_MAX_KERNELS", DEFAULT_MAX_KERNELS),
            max_arg_bytes: env_number("HIPBYPTR_MAX_ARG_BYTES", DEFAULT_MAX_ARG_BYTES),
            honor_stream: debug_enabled(env::var("HIPBYPTR_HONOR_STREAM").ok().as_deref()),
            library: env::var("HIPBYPTR_HIP_LIBRARY").ok().map(PathBuf::from),
        }
    }
}

/// A toggle is on for any value other than unset or `"0"`.
pub fn debug_enabled(value: Option<&str>) -> bool {
    !matches!(value, None | Some("0"))
}

fn env_number<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring invalid {key} value {value:?}");
            default
        }),
        Err(_) => default,
    }
}

static CONFIG: Lazy<RwLock<ShimConfig>> = Lazy::new(|| RwLock::new(ShimConfig::default()));

/// Errors produced by config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("shim config lock poisoned")]
    LockPoisoned,
}

/// Replace the global configuration.
pub fn set_config(cfg: ShimConfig) -> Result<(), ConfigError> {
    let mut guard = CONFIG.write().map_err(|_| ConfigError::LockPoisoned)?;
    *guard = cfg;
    Ok(())
}

/// Get a clone of the current configuration.
pub fn get_config() -> Result<ShimConfig, ConfigError> {
    CONFIG
        .read()
        .map_err(|_| ConfigError::LockPoisoned)
        .map(|g| g.clone())
}
