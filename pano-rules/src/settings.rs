use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const EMBEDDED: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/settings/defaults.toml"
));

/// Run settings that are not part of a single invocation's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default = "fallback_settings")]
pub struct Settings {
    /// Directory for output files when no explicit output path is given.
    pub output_dir: PathBuf,
    /// Minimum zone count from template vsys definitions before the catalog
    /// builder rescans the whole tree for zones.
    pub zone_fallback_threshold: usize,
    #[serde(rename = "predefined_service")]
    pub predefined_services: Vec<PredefinedService>,
    pub predefined_applications: Vec<String>,
}

/// Vendor built-in service injected into the `Shared` scope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PredefinedService {
    pub name: String,
    pub protocol: String,
    #[serde(default)]
    pub ports: Vec<String>,
}

/// Errors returned when loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl Default for Settings {
    fn default() -> Self {
        default_settings()
    }
}

/// Load settings from a TOML file. Top-level keys missing from the file keep
/// their embedded values.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_settings(&raw, path.display().to_string())
}

/// Settings embedded at build time from `settings/defaults.toml`.
pub fn default_settings() -> Settings {
    parse_settings(EMBEDDED, "embedded settings".to_string())
        .unwrap_or_else(|_| fallback_settings())
}

/// Resolve settings for a run: the given file if it loads, embedded defaults
/// otherwise. The second value names the source.
pub fn resolve_settings(path: Option<&Path>) -> (Settings, String) {
    let Some(path) = path else {
        return (default_settings(), "embedded".to_string());
    };
    match load_settings(path) {
        Ok(settings) => (settings, format!("file:{}", path.display())),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to load settings; using embedded defaults"
            );
            (default_settings(), "embedded".to_string())
        }
    }
}

/// Parse `raw` as overrides on top of the embedded table.
fn parse_settings(raw: &str, path: String) -> Result<Settings, SettingsError> {
    let mut table: toml::Table = EMBEDDED.parse().unwrap_or_default();
    let overrides: toml::Table = raw.parse().map_err(|source| SettingsError::Parse {
        path: path.clone(),
        source,
    })?;
    table.extend(overrides);
    toml::Value::Table(table)
        .try_into()
        .map_err(|source| SettingsError::Parse { path, source })
}

fn fallback_settings() -> Settings {
    Settings {
        output_dir: PathBuf::from("work/output"),
        zone_fallback_threshold: 1,
        predefined_services: vec![
            PredefinedService {
                name: "service-http".to_string(),
                protocol: "tcp".to_string(),
                ports: vec!["80".to_string(), "8080".to_string()],
            },
            PredefinedService {
                name: "service-https".to_string(),
                protocol: "tcp".to_string(),
                ports: vec!["443".to_string()],
            },
        ],
        predefined_applications: ["dns", "ping", "ssh", "ssl", "web-browsing"]
            .into_iter()
            .map(ToOwned::to_owned)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{default_settings, load_settings, resolve_settings, Settings, SettingsError};

    #[test]
    fn embedded_defaults_parse() {
        let settings = default_settings();
        assert_eq!(settings.zone_fallback_threshold, 1);
        assert!(settings
            .predefined_services
            .iter()
            .any(|s| s.name == "service-https" && s.ports == vec!["443"]));
        assert!(settings.predefined_applications.iter().any(|a| a == "ssl"));
        assert_eq!(settings.predefined_applications.len(), 14);
        assert_eq!(Settings::default(), settings);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "zone_fallback_threshold = 7\n").expect("write");

        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.zone_fallback_threshold, 7);
        assert_eq!(settings.output_dir, std::path::PathBuf::from("work/output"));
        assert_eq!(
            settings.predefined_applications,
            default_settings().predefined_applications
        );
        assert!(settings.predefined_applications.iter().any(|a| a == "ms-rdp"));
        assert_eq!(settings.predefined_services, default_settings().predefined_services);
    }

    #[test]
    fn file_keys_replace_embedded_lists() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "predefined_applications = [\"custom-app\"]\n").expect("write");

        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.predefined_applications, vec!["custom-app"]);
        assert_eq!(settings.zone_fallback_threshold, 1);
    }

    #[test]
    fn invalid_file_is_parse_error_and_falls_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "zone_fallback_threshold = \"many\"").expect("write");

        assert!(matches!(
            load_settings(&path),
            Err(SettingsError::Parse { .. })
        ));
        let (settings, source) = resolve_settings(Some(&path));
        assert_eq!(source, "embedded");
        assert_eq!(settings, default_settings());
    }
}
