//! Configuration file handling.
//!
//! The config format is flat `key = value` lines. Three kinds of keys are
//! recognized: `followers = a,b,c` (the persisted follower baseline),
//! `<api>_key` / `<api>_secret` (the application credentials), and
//! `<user>_key` / `<user>_secret` (per-account access credentials).
//! Unrecognized lines are preserved verbatim across rewrites.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use secrecy::SecretString;
use tracing::debug;

use crate::error::ConfigError;

/// Key name under which the application credentials are stored.
const API_SLOT: &str = "<api>";

/// A key/secret credential pair.
#[derive(Clone)]
pub struct Credentials {
    pub key: SecretString,
    pub secret: SecretString,
}

/// Parsed configuration plus the path it came from (rewrites go back to the
/// same file).
pub struct Config {
    path: PathBuf,
    /// Follower baseline as read from the file. Sorted for stable rewrites.
    pub followers: BTreeSet<String>,
    api_key: Option<SecretString>,
    api_secret: Option<SecretString>,
    user_keys: HashMap<String, SecretString>,
    user_secrets: HashMap<String, SecretString>,
}

static FOLLOWERS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^followers\s*=\s*(.+)$").unwrap());
static KEY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^#\s]+)_key\s*=\s*(.+)$").unwrap());
static SECRET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^#\s]+)_secret\s*=\s*(.+)$").unwrap());

impl Config {
    /// Read and parse the config file.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let body = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Self::parse(path, &body))
    }

    fn parse(path: PathBuf, body: &str) -> Self {
        let mut cfg = Self {
            path,
            followers: BTreeSet::new(),
            api_key: None,
            api_secret: None,
            user_keys: HashMap::new(),
            user_secrets: HashMap::new(),
        };

        for line in body.lines().map(str::trim) {
            if let Some(caps) = FOLLOWERS_LINE.captures(line) {
                cfg.followers = caps[1]
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                continue;
            }
            if let Some(caps) = KEY_LINE.captures(line) {
                let (slot, value) = (caps[1].to_string(), SecretString::from(caps[2].to_string()));
                if slot == API_SLOT {
                    cfg.api_key = Some(value);
                } else {
                    cfg.user_keys.insert(slot, value);
                }
                continue;
            }
            if let Some(caps) = SECRET_LINE.captures(line) {
                let (slot, value) = (caps[1].to_string(), SecretString::from(caps[2].to_string()));
                if slot == API_SLOT {
                    cfg.api_secret = Some(value);
                } else {
                    cfg.user_secrets.insert(slot, value);
                }
            }
        }

        debug!(
            followers = cfg.followers.len(),
            users = cfg.user_keys.len(),
            "parsed configuration"
        );
        cfg
    }

    /// Check that application credentials are present.
    pub fn verify(&self) -> Result<Credentials, ConfigError> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Ok(Credentials {
                key: key.clone(),
                secret: secret.clone(),
            }),
            _ => Err(ConfigError::MissingApiCredentials {
                path: self.path.clone(),
            }),
        }
    }

    /// Access credentials for the given account.
    pub fn user_credentials(&self, user: &str) -> Result<Credentials, ConfigError> {
        match (self.user_keys.get(user), self.user_secrets.get(user)) {
            (Some(key), Some(secret)) => Ok(Credentials {
                key: key.clone(),
                secret: secret.clone(),
            }),
            _ => Err(ConfigError::MissingUserCredentials {
                user: user.to_string(),
                path: self.path.clone(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the `followers =` line with a new baseline, atomically.
    ///
    /// The rest of the file is carried over byte for byte. The new content
    /// goes to a temp file next to the original and is renamed into place,
    /// so a crash mid-write never leaves a truncated config behind.
    pub fn update_followers(&mut self, followers: &BTreeSet<String>) -> Result<(), ConfigError> {
        let body = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        let joined = followers.iter().cloned().collect::<Vec<_>>().join(",");
        let mut out = String::with_capacity(body.len());
        let mut replaced = false;
        for line in body.lines() {
            if FOLLOWERS_LINE.is_match(line.trim()) {
                out.push_str(&format!("followers = {joined}\n"));
                replaced = true;
            } else {
                out.push_str(line);
                out.push('\n');
            }
        }
        if !replaced {
            out.push_str(&format!("followers = {joined}\n"));
        }

        let tmp = self.path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            fs::write(&tmp, &out)?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|source| ConfigError::Rewrite {
            path: self.path.clone(),
            source,
        })?;

        self.followers = followers.clone();
        debug!(followers = self.followers.len(), "rewrote follower baseline");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = "\
# natter configuration
<api>_key = appkey123
<api>_secret = appsecret456
natter_key = userkey
natter_secret = usersecret
followers = carol,alice,bob
";

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("natter.conf");
        fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn parses_all_three_key_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(write_sample(&dir)).unwrap();
        let api = cfg.verify().unwrap();
        assert_eq!(api.key.expose_secret(), "appkey123");
        assert_eq!(api.secret.expose_secret(), "appsecret456");
        let user = cfg.user_credentials("natter").unwrap();
        assert_eq!(user.key.expose_secret(), "userkey");
        let names: Vec<_> = cfg.followers.iter().cloned().collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn missing_api_credentials_fail_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("natter.conf");
        fs::write(&path, "followers = alice\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert!(matches!(
            cfg.verify(),
            Err(ConfigError::MissingApiCredentials { .. })
        ));
    }

    #[test]
    fn missing_user_credentials_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(write_sample(&dir)).unwrap();
        assert!(matches!(
            cfg.user_credentials("somebodyelse"),
            Err(ConfigError::MissingUserCredentials { .. })
        ));
    }

    #[test]
    fn update_followers_preserves_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir);
        let mut cfg = Config::load(&path).unwrap();
        let new: BTreeSet<String> = ["dave".to_string(), "alice".to_string()].into();
        cfg.update_followers(&new).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains("followers = alice,dave"));
        assert!(body.contains("# natter configuration"));
        assert!(body.contains("<api>_key = appkey123"));
        // No temp file left behind.
        assert!(!path.with_extension("tmp").exists());

        let reread = Config::load(&path).unwrap();
        assert_eq!(reread.followers, new);
    }

    #[test]
    fn comment_lines_do_not_become_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("natter.conf");
        fs::write(&path, "# bob_key = hunter2\n<api>_key = k\n<api>_secret = s\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert!(cfg.user_credentials("bob").is_err());
        assert!(cfg.verify().is_ok());
    }
}
