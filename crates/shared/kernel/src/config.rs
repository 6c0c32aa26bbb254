use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "ALIQ";

/// Custom error type for config loading.
#[aliq_derive::aliq_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads a configuration by layering a file with environment overrides.
///
/// 1. **Base File**: the given path (TOML, JSON or YAML, detected by extension). The file is
///    required when a path is given; without one, only defaults and the environment apply.
/// 2. **Environment Overrides**: variables prefixed with `ALIQ__`. Nested keys are separated by
///    double underscores (`ALIQ__ROBOT__AIR_GAP_SAFE_OFFSET_MM` maps to `robot.air_gap_safe_offset_mm`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file is missing or unreadable, or if the merged
/// values do not match `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = Config::builder();

    if let Some(path) = path.as_ref().map(AsRef::as_ref) {
        info!("Loading config from {}", path.display());
        builder = builder.add_source(File::from(path).required(true));
    } else {
        debug!("No config file given, using defaults and {ENV_PREFIX}__ overrides");
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .convert_case(config::Case::Snake)
                .try_parsing(true),
        )
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
