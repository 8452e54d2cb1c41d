use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "server";
const ENV_PREFIX: &str = "LARP";

#[larp_derive::larp_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads `T` from a config file overlaid with `LARP__*` environment variables.
///
/// The file extension may be omitted (`server` finds `server.toml`,
/// `server.yaml`, ...). Nested keys use a double underscore in the
/// environment: `LARP__RULES__RULESET_DIR=/srv/rules` sets `rules.ruleset_dir`.
///
/// # Errors
/// Fails when the file is missing or the merged values do not fit `T`.
///
/// ```rust
/// use larp_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct Tiny {
///     port: u16,
/// }
///
/// let cfg: Tiny = load_config(Some("does/not/exist")).unwrap_or_default();
/// assert_eq!(cfg.port, 0);
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), |p| p.as_ref().to_path_buf());
    info!(path = %path.display(), "loading configuration");

    Config::builder()
        .add_source(File::from(path.as_path()).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake),
        )
        .build()
        .context(format!("reading {}", path.display()))?
        .try_deserialize::<T>()
        .context("deserializing configuration")
}
