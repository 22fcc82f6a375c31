use crate::error::{Error, Result};
use lettre::address::{Address, AddressError};
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "send-gmail";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_CREDENTIAL_FILE_NAME: &str = "credentials.json";
pub const TOKEN_CACHE_FILE_NAME: &str = "token.json";

/// Settings persisted between runs.
///
/// The JSON key names are kept stable so existing config files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "credfile")]
    pub credential_file: PathBuf,
    #[serde(rename = "pickfile")]
    pub token_cache: PathBuf,
    /// Display form, e.g. `Jane Doe <jane@example.com>`.
    #[serde(rename = "fromAdd")]
    pub from_address: String,
}

// Resolve the per-user config root from APPDATA, XDG_CONFIG_HOME, then HOME/.config
pub fn config_root_from<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

    non_empty("APPDATA")
        .map(PathBuf::from)
        .or_else(|| non_empty("XDG_CONFIG_HOME").map(PathBuf::from))
        .or_else(|| non_empty("HOME").map(|home| Path::new(&home).join(".config")))
}

/// Owns the config directory and the `config.json` inside it.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_env() -> Result<Self> {
        let root = config_root_from(|key| std::env::var(key).ok())
            .ok_or(Error::ConfigDirUnavailable)?;
        Ok(Self::new(root.join(APP_DIR_NAME)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn default_credential_file(&self) -> PathBuf {
        self.dir.join(DEFAULT_CREDENTIAL_FILE_NAME)
    }

    /// Load the configuration, running first-time setup against `input` and
    /// `output` when no config file exists yet.
    pub fn load<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) -> Result<Configuration> {
        std::fs::create_dir_all(&self.dir)?;
        let config_file = self.config_file();

        if config_file.exists() {
            tracing::debug!(path = %config_file.display(), "Loading config file");
            return self.read(&config_file);
        }

        tracing::info!(path = %config_file.display(), "No config file, running first-time setup");
        let config = self.setup(input, output)?;
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(&config_file, json)?;
        Ok(config)
    }

    fn read(&self, config_file: &Path) -> Result<Configuration> {
        let contents = std::fs::read_to_string(config_file).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => Error::ConfigCorrupt {
                path: config_file.to_path_buf(),
                reason: e.to_string(),
            },
            _ => Error::Io(e),
        })?;
        serde_json::from_str(&contents).map_err(|e| Error::ConfigCorrupt {
            path: config_file.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn setup<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) -> Result<Configuration> {
        let default_credfile = self.default_credential_file();
        writeln!(
            output,
            "No config file found. Let's create it now!

First, you need to create an OAuth2 credential from Google
and download the JSON.

(1) Go to the Gmail API page https://console.cloud.google.com/apis/library/gmail.googleapis.com
    Log in and enable this API.
(2) Set up the OAuth consent screen
    https://console.cloud.google.com/apis/credentials/consent
(3) Go to APIs/Credentials https://console.cloud.google.com/apis/credentials
    Click Create Credentials -> OAuth client ID -> Desktop app. Pick any name you like.
    Once created, click \"Download JSON\" and save the file to a safe place.
    We recommend saving it to {}
",
            default_credfile.display()
        )?;

        let answer = prompt(
            input,
            output,
            &format!(
                "Filename of OAuth json (blank for {}): ",
                default_credfile.display()
            ),
        )?;
        let credential_file = if answer.is_empty() {
            default_credfile
        } else {
            PathBuf::from(answer)
        };
        if !credential_file.exists() {
            return Err(Error::CredentialFileNotFound(credential_file));
        }

        let from_email = prompt(
            input,
            output,
            "Email address sending from (should match your credential): ",
        )?;
        let email: Address = from_email.parse().map_err(|e: AddressError| Error::InvalidAddress {
            address: from_email.clone(),
            reason: e.to_string(),
        })?;
        let from_name = prompt(input, output, "Name to display as sending from: ")?;

        // Let lettre quote names such as "Doe, Jane" so the address parses again
        let name = Some(from_name).filter(|name| !name.is_empty());
        let from_address = Mailbox::new(name, email).to_string();

        Ok(Configuration {
            credential_file,
            token_cache: self.dir.join(TOKEN_CACHE_FILE_NAME),
            from_address,
        })
    }
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
