//! Configuration file handling for splitsync.
//!
//! The configuration file is stored at `$SPLITSYNC_HOME/config.json` and contains
//! settings for the application including the ledger server URL, backup settings, the
//! API token file path, and the delete status policy.

use crate::backup::Backup;
use crate::db::Db;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "splitsync";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const SECRETS: &str = ".secrets";
const BACKUPS: &str = ".backups";
const TOKEN_FILE: &str = "token";
const CONFIG_JSON: &str = "config.json";
const SPLITSYNC_SQLITE: &str = "splitsync.sqlite";

/// The `Config` object represents the configuration of the app. You instantiate it by
/// providing the path to `$SPLITSYNC_HOME` and from there it loads
/// `$SPLITSYNC_HOME/config.json`. It provides paths to other items that are either
/// configurable or are expected in a certain location within the data directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the data directory, its subdirectories and:
    /// - Creates an initial `config.json` file using `server_url` along with default settings
    /// - Copies `token_file` into its default location in the data dir.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory, e.g.
    ///   `$HOME/splitsync`
    /// - `token_file` - A file holding the pre-acquired API token for the ledger server.
    ///   Token acquisition is outside this program; the file is copied to the default
    ///   secrets location in the data directory.
    /// - `server_url` - The base URL of the ledger server, e.g. `https://ledger.example.com`
    ///
    /// # Errors
    /// - Returns an error if any file operations fail or the URL is invalid.
    pub async fn create(
        dir: impl Into<PathBuf>,
        token_file: &Path,
        server_url: &str,
    ) -> Result<Self> {
        // Validate the server URL before touching the filesystem
        let _ = Url::parse(server_url)
            .with_context(|| format!("Invalid ledger server URL '{server_url}'"))?;

        // Create the directory if it does not exist
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the splitsync home directory")?;

        // Canonicalize the directory path
        let root = utils::canonicalize(&maybe_relative).await?;

        // Create the subdirectories
        let backups_dir = root.join(BACKUPS);
        utils::make_dir(&backups_dir).await?;
        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        // Copy the API token file to its default location in the data dir
        let token_destination = secrets_dir.join(TOKEN_FILE);
        utils::copy(token_file, token_destination).await?;
        let config_path = root.join(CONFIG_JSON);

        // Create and save an initial ConfigFile in the data directory
        let config_file = ConfigFile {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            server_url: server_url.to_string(),
            backup_copies: BACKUP_COPIES,
            token_path: None,
            delete_policy: DeletePolicy::default(),
        };
        config_file.save(&config_path).await?;

        // Initialize the SQLite database
        let db_path = root.join(SPLITSYNC_SQLITE);
        let db = Db::init(&db_path)
            .await
            .context("Unable to create SQLite DB")?;

        // Return a new `Config` object that represents a data directory ready to use
        Ok(Self {
            root,
            backups: backups_dir,
            secrets: secrets_dir,
            config_path,
            config_file,
            db,
            sqlite_path: db_path,
        })
    }

    /// This will
    /// - validate that the `splitsync_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the backups and secrets directories exist
    /// - return the loaded configuration object
    pub async fn load(splitsync_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = splitsync_home.into();
        let root = utils::canonicalize(&maybe_relative).await?;

        // Validate that the home directory exists.
        let _ = utils::read_dir(&root)
            .await
            .context("Splitsync home is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let _ = Url::parse(&config_file.server_url).with_context(|| {
            format!(
                "Invalid ledger server URL '{}' in config file",
                config_file.server_url
            )
        })?;

        // Load the SQLite database
        let db_path = root.join(SPLITSYNC_SQLITE);
        let db = Db::load(&db_path)
            .await
            .context("Unable to load SQLite DB")?;

        let config = Self {
            root: root.clone(),
            backups: root.join(BACKUPS),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
            db,
            sqlite_path: db_path,
        };
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn server_url(&self) -> &str {
        &self.config_file.server_url
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    pub(crate) fn delete_policy(&self) -> DeletePolicy {
        self.config_file.delete_policy.clone()
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the
    /// relative path against the data directory.
    pub fn token_path(&self) -> PathBuf {
        let p = self.config_file.token_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "splitsync",
///   "config_version": 1,
///   "server_url": "https://ledger.example.com",
///   "backup_copies": 5,
///   "token_path": ".secrets/token",
///   "delete_policy": {
///     "treat_as_success": [204, 404, 500],
///     "retain_local": [401]
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "splitsync"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the ledger server
    server_url: String,

    /// Number of backup copies to keep
    backup_copies: u32,

    /// Path to the API token file (optional, relative to config.json or absolute)
    /// Defaults to $SPLITSYNC_HOME/.secrets/token if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,

    /// How delete status codes map onto local state. These mappings work around
    /// server-version-specific behavior, so they are configuration rather than code.
    #[serde(default)]
    delete_policy: DeletePolicy,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            server_url: String::new(),
            backup_copies: BACKUP_COPIES,
            token_path: None,
            delete_policy: DeletePolicy::default(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        // Validate app_name
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// Gets the token path.
    ///
    /// If the path is relative, it should be interpreted as relative to the config.json
    /// file. If None, defaults to $SPLITSYNC_HOME/.secrets/token
    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_FILE))
    }
}

/// Maps the ledger server's delete status codes onto local state.
///
/// `treat_as_success` statuses delete the local copy and report success; 404 means the
/// record is already gone remotely, and some server versions answer 500 on an otherwise
/// successful delete. `retain_local` statuses leave the local copy untouched, because an
/// ambiguous auth state must not destroy data. Any other status (or no response at all)
/// deletes the local copy without claiming success.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub(crate) struct DeletePolicy {
    #[serde(default = "default_success_statuses")]
    pub(crate) treat_as_success: Vec<u16>,
    #[serde(default = "default_retain_statuses")]
    pub(crate) retain_local: Vec<u16>,
}

fn default_success_statuses() -> Vec<u16> {
    vec![204, 404, 500]
}

fn default_retain_statuses() -> Vec<u16> {
    vec![401]
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self {
            treat_as_success: default_success_statuses(),
            retain_local: default_retain_statuses(),
        }
    }
}

impl DeletePolicy {
    pub(crate) fn is_success(&self, status: u16) -> bool {
        self.treat_as_success.contains(&status)
    }

    pub(crate) fn retains_local(&self, status: u16) -> bool {
        self.retain_local.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("splitsync_home");
        let token_source_file = dir.path().join("x.txt");
        let token_content = "12345";
        let server_url = "https://ledger.example.com";
        utils::write(&token_source_file, token_content)
            .await
            .unwrap();

        // Run the function under test:
        let config = Config::create(&home_dir, &token_source_file, server_url)
            .await
            .unwrap();

        // Check some values on the config object
        assert_eq!(server_url, config.server_url());

        // Check for some files in the directory
        let found_token_content = utils::read(&config.token_path()).await.unwrap();
        assert_eq!(token_content, found_token_content);

        assert!(config.backups().is_dir());
        assert!(config.secrets().is_dir());
        assert!(config.sqlite_path().is_file());
    }

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("splitsync_home");
        let token_file = dir.path().join("token.txt");
        utils::write(&token_file, "secret").await.unwrap();
        let url = "https://ledger.example.com";
        Config::create(&home_dir, &token_file, url).await.unwrap();

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.server_url(), url);
        assert_eq!(loaded.backup_copies(), 5);
        assert_eq!(loaded.delete_policy(), DeletePolicy::default());
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        let token_file = dir.path().join("token.txt");
        utils::write(&token_file, "secret").await.unwrap();
        let result = Config::create(dir.path().join("home"), &token_file, "not a url").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = ConfigFile {
            server_url: "https://ledger.example.com".to_string(),
            backup_copies: 7,
            token_path: Some(PathBuf::from(".secrets/my_token")),
            ..ConfigFile::default()
        };

        // Save the config
        original_config.save(&config_path).await.unwrap();

        // Load it back
        let loaded_config = ConfigFile::load(&config_path).await.unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "splitsync",
            "config_version": 1,
            "server_url": "https://ledger.example.com",
            "backup_copies": 3
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();

        assert_eq!(config.server_url, "https://ledger.example.com");
        assert_eq!(config.backup_copies, 3);
        assert_eq!(
            config.token_path(),
            PathBuf::from(SECRETS).join(TOKEN_FILE)
        );
        // Absent policy falls back to the defaults.
        assert_eq!(config.delete_policy, DeletePolicy::default());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "server_url": "https://ledger.example.com",
            "backup_copies": 5
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_custom_delete_policy() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "splitsync",
            "config_version": 1,
            "server_url": "https://ledger.example.com",
            "backup_copies": 5,
            "delete_policy": {
                "treat_as_success": [204],
                "retain_local": [401, 403]
            }
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert!(config.delete_policy.is_success(204));
        assert!(!config.delete_policy.is_success(500));
        assert!(config.delete_policy.retains_local(403));
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let config = ConfigFile::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("token_path"));
    }
}
