//! Analyzer configuration.
//!
//! Configuration is optional: an absent file or an absent section
//! simply disables the rule that consumes it.

use camino::Utf8Path;
use serde::Deserialize;
use thiserror::Error;

/// Filenames probed when no explicit config path is given.
const CONFIG_CANDIDATES: &[&str] = &["flowlint.yml", "flowlint.yaml", ".github/flowlint.yml"];

/// A configuration loading error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading the file.
    #[error("I/O error reading {path}")]
    Io {
        /// The offending path.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration syntax.
    #[error("invalid configuration syntax in {path}")]
    Syntax {
        /// The offending path.
        path: String,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// The `action-list` section: shell-wildcard patterns over `uses:`
/// references.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionList {
    /// Actions that are allowed; when non-empty, anything not matching
    /// is reported.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Actions that are always reported.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl ActionList {
    /// Whether both lists are empty.
    pub fn is_empty(&self) -> bool {
        self.whitelist.is_empty() && self.blacklist.is_empty()
    }
}

/// The `self-hosted-runner` section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelfHostedRunner {
    /// Labels of self-hosted runners known to the repository.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// The analyzer's configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Allow/deny patterns for actions.
    #[serde(default)]
    pub action_list: Option<ActionList>,
    /// Known self-hosted runner labels.
    #[serde(default)]
    pub self_hosted_runner: Option<SelfHostedRunner>,
    /// Names of configuration variables usable via the `vars` context.
    #[serde(default)]
    pub config_variables: Option<Vec<String>>,
}

impl Config {
    /// Loads configuration from an explicit path.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;

        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Syntax {
            path: path.to_string(),
            source,
        })
    }

    /// Probes `dir` for a configuration file, returning the default
    /// (everything disabled) when none is found.
    pub fn discover(dir: &Utf8Path) -> Result<Self, ConfigError> {
        for candidate in CONFIG_CANDIDATES {
            let path = dir.join(candidate);
            if path.is_file() {
                tracing::debug!("loading configuration from {path}");
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }
}

/// Matches `value` against a shell-wildcard pattern, where `*` matches
/// any (possibly empty) character sequence. Everything else is literal.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');
    let mut first = true;
    for part in pattern.split('*') {
        if !first {
            regex.push_str(".*");
        }
        first = false;
        regex.push_str(&regex::escape(part));
    }
    regex.push('$');

    regex::Regex::new(&regex).is_ok_and(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("actions/*", "actions/checkout@v4"));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("actions/checkout@*", "actions/checkout@v4"));
        assert!(!wildcard_match("actions/*", "docker://alpine"));
        // `*` is the only metacharacter; regex syntax is literal.
        assert!(wildcard_match("a.b", "a.b"));
        assert!(!wildcard_match("a.b", "axb"));
    }

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str(
            "action-list:\n  whitelist:\n    - actions/*\n  blacklist:\n    - evil/*\nself-hosted-runner:\n  labels:\n    - big-linux\nconfig-variables:\n  - DEPLOY_ENV\n",
        )
        .unwrap();

        assert_eq!(config.action_list.as_ref().unwrap().whitelist.len(), 1);
        assert_eq!(
            config.self_hosted_runner.as_ref().unwrap().labels,
            vec!["big-linux"]
        );
        assert_eq!(
            config.config_variables.as_deref(),
            Some(&["DEPLOY_ENV".to_string()][..])
        );
    }

    #[test]
    fn test_empty_config() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert!(config.action_list.is_none());
        assert!(config.self_hosted_runner.is_none());
        assert!(config.config_variables.is_none());
    }
}
