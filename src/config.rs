//! Configuration and site catalog
//!
//! Loads the client configuration from `config.toml` with RAX_FXP_*
//! environment overrides. The catalog holds the site and section records
//! a front end works with; the protocol engine itself only ever receives
//! addresses and credentials as call parameters.

use std::fmt;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize, Serializer};

use crate::client::{ChannelOptions, Credentials, EncryptionMode, SiteAddress};

fn default_port() -> u16 {
    21
}

// Site records cross the UI boundary; the stored password must not
// travel with them.
fn redact_password<S: Serializer>(_password: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("***")
}

/// One stored site.
///
/// Serializing a record always redacts the password; `Debug` masks it
/// too. The real secret is only handed out as [`Credentials`] for a
/// channel connect.
#[derive(Clone, Deserialize, Serialize)]
pub struct SiteRecord {
    #[serde(default)]
    pub id: u32,
    pub name: String,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    pub username: String,
    #[serde(serialize_with = "redact_password")]
    pub password: String,
}

impl SiteRecord {
    pub fn address(&self) -> SiteAddress {
        SiteAddress::new(self.hostname.clone(), self.port)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    pub fn encryption(&self) -> EncryptionMode {
        if self.tls {
            EncryptionMode::ExplicitTls
        } else {
            EncryptionMode::Plain
        }
    }
}

impl fmt::Debug for SiteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One stored section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SectionRecord {
    #[serde(default)]
    pub id: u32,
    pub name: String,
}

/// In-memory catalog of sites and sections.
///
/// Backed by the TOML config; persistent storage lives outside this
/// crate, behind the same list/add surface.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    sites: Vec<SiteRecord>,
    #[serde(default)]
    sections: Vec<SectionRecord>,
}

impl Catalog {
    pub fn sites(&self) -> &[SiteRecord] {
        &self.sites
    }

    pub fn sections(&self) -> &[SectionRecord] {
        &self.sections
    }

    pub fn find_site(&self, name: &str) -> Option<&SiteRecord> {
        self.sites.iter().find(|s| s.name == name)
    }

    /// Add a site, assigning the next free id. Returns the id.
    pub fn add_site(&mut self, mut site: SiteRecord) -> u32 {
        site.id = self.next_id(self.sites.iter().map(|s| s.id));
        let id = site.id;
        self.sites.push(site);
        id
    }

    /// Add a section by name, assigning the next free id. Returns the id.
    pub fn add_section(&mut self, name: impl Into<String>) -> u32 {
        let id = self.next_id(self.sections.iter().map(|s| s.id));
        self.sections.push(SectionRecord {
            id,
            name: name.into(),
        });
        id
    }

    fn next_id(&self, ids: impl Iterator<Item = u32>) -> u32 {
        ids.max().map_or(1, |max| max + 1)
    }
}

fn default_connect_secs() -> u64 {
    30
}

fn default_read_secs() -> u64 {
    60
}

fn default_tls_secs() -> u64 {
    30
}

fn default_accept_invalid_certs() -> bool {
    true
}

/// Channel deadlines and certificate policy, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,
    #[serde(default = "default_tls_secs")]
    pub tls_secs: u64,
    /// Accept self-signed certificates. Defaults to true; see
    /// [`crate::client::tls::build_tls_connector`].
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            read_secs: default_read_secs(),
            tls_secs: default_tls_secs(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

impl TimeoutConfig {
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            connect_timeout: Duration::from_secs(self.connect_secs),
            read_timeout: Duration::from_secs(self.read_secs),
            tls_timeout: Duration::from_secs(self.tls_secs),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub catalog: Catalog,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl ClientConfig {
    /// Load from config.toml (when present) with RAX_FXP_* environment
    /// overrides.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("RAX_FXP").separator("_"))
            .build()?;
        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        for site in self.catalog.sites() {
            if site.name.is_empty() {
                return Err(config::ConfigError::Message(
                    "site names cannot be empty".into(),
                ));
            }
            if site.hostname.is_empty() {
                return Err(config::ConfigError::Message(format!(
                    "site '{}' has an empty hostname",
                    site.name
                )));
            }
            if site.port == 0 {
                return Err(config::ConfigError::Message(format!(
                    "site '{}' has port 0",
                    site.name
                )));
            }
        }
        if self.timeouts.connect_secs == 0
            || self.timeouts.read_secs == 0
            || self.timeouts.tls_secs == 0
        {
            return Err(config::ConfigError::Message(
                "timeouts must be greater than 0 seconds".into(),
            ));
        }
        Ok(())
    }
}
