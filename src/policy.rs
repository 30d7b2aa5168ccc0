use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Name of the policy file looked up in a project root.
pub const POLICY_FILE_NAME: &str = ".linkgate.toml";

/// Table that, when present, holds the policy instead of the document root.
const SECTION_KEY: &str = "link_processing";

/// Structured-log settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Emit each processed link as one JSON string instead of tracing fields.
    pub json: bool,
}

/// Security policy applied to every link. Read-only during a request;
/// replaced wholesale through `LinkProcessor::set_policy`.
///
/// Missing keys take the defaults below. Unknown keys are ignored.
/// External domains are fail-closed: with no allow-list every host is denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Version string reported in structured logs; falls back to the environment.
    pub build_version: Option<String>,
    /// Require the target to be readable by this process.
    pub check_acl: bool,
    /// Require path targets to exist.
    #[serde(alias = "relative_paths")]
    pub check_exists: bool,
    /// Structured-log settings.
    pub logging: LoggingSettings,
    /// Protocol, domain, and pattern rules.
    pub security: SecurityRules,
    /// Path shape rules named after the platform that motivated them.
    pub windows_specific: PathRules,
}

/// Path shape rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathRules {
    /// Allowed drive prefixes such as `C:`. Empty means any drive.
    pub drive_letters: Vec<String>,
    /// Maximum number of segments below the root. `None` or 0 means no limit.
    pub max_path_depth: Option<usize>,
}

/// Protocol, domain, and pattern rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityRules {
    /// Hosts external web links may point at. Absent or empty denies all.
    pub allowed_domains: Option<Vec<String>>,
    /// Schemes allowed for URLs. Empty means any scheme.
    pub allowed_protocols: Vec<String>,
    /// Substrings that deny a path outright, matched before normalization.
    pub forbidden_patterns: Vec<String>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        return Self {
            build_version: None,
            check_acl: false,
            check_exists: true,
            logging: LoggingSettings::default(),
            security: SecurityRules::default(),
            windows_specific: PathRules::default(),
        };
    }
}

impl SecurityPolicy {
    /// Parse a policy document. Keys may sit at the root or under a
    /// `[link_processing]` table; the table wins when both exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or a key has the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let mut document: toml::Table = toml::from_str(content)?;
        let policy = match document.remove(SECTION_KEY) {
            Some(section) => section.try_into()?,
            None => toml::Value::Table(document).try_into()?,
        };
        return Ok(policy);
    }

    /// Load `.linkgate.toml` from `root`.
    /// Returns the defaults if the file doesn't exist, and an error if the
    /// file exists but is malformed. Never silently falls back to defaults
    /// when the user wrote a policy file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(POLICY_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no policy file, using defaults");
                return Ok(Self::default());
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::from_toml_str(&content);
    }

    /// Load a policy from an explicitly named file, which must exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if the file is missing,
    /// `Error::Io` for other read failures, or `Error::TomlDe` if malformed.
    pub fn load_file(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound {
                    path: path.to_path_buf(),
                });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::from_toml_str(&content);
    }

    /// The effective depth limit; 0 is treated as unset.
    pub fn max_path_depth(&self) -> Option<usize> {
        return self.windows_specific.max_path_depth.filter(|depth| return *depth > 0);
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fail_closed() {
        let policy = SecurityPolicy::default();
        assert!(policy.check_exists);
        assert!(!policy.check_acl);
        assert_eq!(policy.security.allowed_domains, None);
        assert_eq!(policy.max_path_depth(), None);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(SecurityPolicy::from_toml_str("").unwrap(), SecurityPolicy::default());
    }

    #[test]
    fn parses_all_recognized_keys() {
        let policy = SecurityPolicy::from_toml_str(
            r#"
            check_exists = false
            check_acl = true
            unknown_key = "ignored"

            [security]
            allowed_protocols = ["https", "mailto"]
            allowed_domains = ["example.com"]
            forbidden_patterns = ["..", "secrets"]

            [windows_specific]
            max_path_depth = 8
            drive_letters = ["C:", "D:"]

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert!(!policy.check_exists);
        assert!(policy.check_acl);
        assert_eq!(policy.security.allowed_protocols, vec!["https", "mailto"]);
        assert_eq!(policy.security.allowed_domains, Some(vec!["example.com".to_string()]));
        assert_eq!(policy.security.forbidden_patterns, vec!["..", "secrets"]);
        assert_eq!(policy.max_path_depth(), Some(8));
        assert_eq!(policy.windows_specific.drive_letters, vec!["C:", "D:"]);
        assert!(policy.logging.json);
    }

    #[test]
    fn section_table_wins_over_root() {
        let policy = SecurityPolicy::from_toml_str(
            r"
            check_exists = true

            [link_processing]
            check_exists = false
            ",
        )
        .unwrap();
        assert!(!policy.check_exists);
    }

    #[test]
    fn legacy_relative_paths_key() {
        let policy = SecurityPolicy::from_toml_str("relative_paths = false").unwrap();
        assert!(!policy.check_exists);
    }

    #[test]
    fn zero_depth_means_unlimited() {
        let policy = SecurityPolicy::from_toml_str("[windows_specific]\nmax_path_depth = 0").unwrap();
        assert_eq!(policy.max_path_depth(), None);
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(SecurityPolicy::from_toml_str("check_exists = \"yes\"").is_err());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(SecurityPolicy::load(dir.path()).unwrap(), SecurityPolicy::default());
    }

    #[test]
    fn load_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(POLICY_FILE_NAME), "check_exists = [").unwrap();
        assert!(SecurityPolicy::load(dir.path()).is_err());
    }

    #[test]
    fn explicit_missing_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SecurityPolicy::load_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }
}
