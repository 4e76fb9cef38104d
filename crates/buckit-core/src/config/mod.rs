//! Common configuration types and YAML loading.

mod vars;

pub use vars::{InterpolationResult, interpolate, interpolate_with};

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{ConfigError, EnvInterpolationSnafu, ReadFileSnafu, YamlParseSnafu};

/// Default metrics address.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Metrics configuration for Prometheus endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    DEFAULT_METRICS_ADDR.to_string()
}

#[derive(Parser, Debug)]
#[command(version, about = "Fetch uploaded payloads and persist them into object storage")]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "BUCKIT_CONFIG")]
    pub config: PathBuf,
}

/// Interpolate environment variables in YAML text and deserialize it.
pub fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, ConfigError> {
    let result = interpolate(contents);
    if !result.is_ok() {
        return EnvInterpolationSnafu {
            message: result.errors.join("\n"),
        }
        .fail();
    }

    serde_yaml::from_str(&result.text).context(YamlParseSnafu)
}

/// Read a YAML file, interpolate it and deserialize it.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    parse_yaml(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default)]
        metrics: MetricsConfig,
        name: String,
    }

    #[test]
    fn test_metrics_default_address() {
        let sample: Sample = parse_yaml("name: x").unwrap();
        assert_eq!(sample.metrics.address, "0.0.0.0:9090");
    }

    #[test]
    fn test_load_yaml_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: buckit\nmetrics:\n  address: 127.0.0.1:9100").unwrap();

        let sample: Sample = load_yaml(file.path()).unwrap();
        assert_eq!(sample.name, "buckit");
        assert_eq!(sample.metrics.address, "127.0.0.1:9100");
    }

    #[test]
    fn test_load_yaml_missing_file() {
        let err = load_yaml::<Sample>(Path::new("/nonexistent/buckit.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_unknown_metrics_field_rejected() {
        let err = parse_yaml::<Sample>("name: x\nmetrics:\n  port: 1").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse { .. }));
    }
}
