//! Binding configuration.
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Environment variable naming a YAML configuration file.
pub const CONFIG_ENV: &str = "PYINA_CONFIG";

/// Environment variable overriding the null communicator policy.
pub const NULL_COMM_ENV: &str = "PYINA_NULL_COMM";

/// What to do when an operation is handed a null communicator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NullCommPolicy {
    /// Do nothing and return none.
    #[default]
    Ignore,

    /// Fail with [`Error::NullCommunicator`].
    Reject,
}

impl FromStr for NullCommPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<NullCommPolicy> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(NullCommPolicy::Ignore),
            "reject" => Ok(NullCommPolicy::Reject),
            other => Err(Error::Config(format!("unknown null communicator policy {:?}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Policy for null communicators.
    pub null_comm: NullCommPolicy,

    /// Validate destination and source ranks against the communicator size
    /// before calling into the transport.
    pub check_ranks: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            null_comm: NullCommPolicy::Ignore,
            check_ranks: true,
        }
    }
}

impl Config {
    pub fn from_yaml_str(s: &str) -> Result<Config> {
        serde_yaml::from_str(s).map_err(|err| Error::Config(err.to_string()))
    }

    /// Load a configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let fp = std::fs::File::open(path)
            .map_err(|err| Error::Config(format!("failed to open {}: {}", path.display(), err)))?;
        serde_yaml::from_reader(fp).map_err(|err| Error::Config(err.to_string()))
    }

    /// Load the configuration named by `PYINA_CONFIG` (defaults otherwise)
    /// and apply `PYINA_NULL_COMM`.
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Config::from_yaml_file(path)?,
            None => Config::default(),
        };
        if let Some(policy) = lookup(NULL_COMM_ENV) {
            config.null_comm = policy.parse()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_ignore_null_communicators() {
        let config = Config::default();
        assert_eq!(config.null_comm, NullCommPolicy::Ignore);
        assert!(config.check_ranks);
    }

    #[test]
    fn yaml_fields_are_optional() {
        let config = Config::from_yaml_str("null_comm: reject\n").unwrap();
        assert_eq!(config.null_comm, NullCommPolicy::Reject);
        assert!(config.check_ranks);

        let config = Config::from_yaml_str("check_ranks: false\n").unwrap();
        assert_eq!(config.null_comm, NullCommPolicy::Ignore);
        assert!(!config.check_ranks);
    }

    #[test]
    fn unknown_keys_are_errors() {
        assert!(matches!(
            Config::from_yaml_str("nul_comm: reject\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("Reject".parse::<NullCommPolicy>().unwrap(), NullCommPolicy::Reject);
        assert_eq!(" ignore ".parse::<NullCommPolicy>().unwrap(), NullCommPolicy::Ignore);
        assert!("abort".parse::<NullCommPolicy>().is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let path = std::env::temp_dir().join(format!("pyina-config-{}.yaml", std::process::id()));
        let mut fp = std::fs::File::create(&path).unwrap();
        writeln!(fp, "null_comm: reject\ncheck_ranks: false").unwrap();
        drop(fp);

        let file = path.to_string_lossy().into_owned();
        let config = Config::from_lookup(|name| match name {
            CONFIG_ENV => Some(file.clone()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.null_comm, NullCommPolicy::Reject);
        assert!(!config.check_ranks);

        let config = Config::from_lookup(|name| match name {
            CONFIG_ENV => Some(file.clone()),
            NULL_COMM_ENV => Some("ignore".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.null_comm, NullCommPolicy::Ignore);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Config::from_lookup(|name| match name {
            CONFIG_ENV => Some("/nonexistent/pyina.yaml".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
