use std::collections::HashSet;
use std::env;
use std::path::Path;

use directories::ProjectDirs;

use crate::error::{MessengerError, MessengerResult};
use crate::party::PartyId;

/// Environment variable selecting the RSA key strength
pub const ENV_KEY_STRENGTH: &str = "MESSENGER_KEY_STRENGTH";
/// Environment variable holding the comma-separated party roster
pub const ENV_PARTIES: &str = "MESSENGER_PARTIES";
/// Environment variable holding the tracing filter
pub const ENV_LOG: &str = "MESSENGER_LOG";

/// RSA modulus sizes available for party key pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeyStrength {
    Standard = 0, // 2048-bit modulus
    Strong = 1,   // 3072-bit modulus
    Maximum = 2,  // 4096-bit modulus
}

impl KeyStrength {
    /// Parse key strength from a name, number or bit count
    pub fn from_str(s: &str) -> Result<Self, String> {
        let s_lower = s.trim().to_lowercase();
        if let Ok(level @ 0..=2) = s_lower.parse::<u8>() {
            return Ok(KeyStrength::from(level));
        }

        match s_lower.as_str() {
            "standard" | "2048" => Ok(KeyStrength::Standard),
            "strong" | "3072" => Ok(KeyStrength::Strong),
            "max" | "maximum" | "4096" => Ok(KeyStrength::Maximum),
            _ => Err(format!(
                "Invalid key strength: {}. Use 0-2, standard/strong/max or 2048/3072/4096",
                s
            )),
        }
    }

    /// Get display name for output
    pub fn display_name(&self) -> &'static str {
        match self {
            KeyStrength::Standard => "RSA-2048",
            KeyStrength::Strong => "RSA-3072",
            KeyStrength::Maximum => "RSA-4096",
        }
    }

    /// Get description of key strength
    pub fn description(&self) -> &'static str {
        match self {
            KeyStrength::Standard => "Standard - fast key generation, 112-bit security",
            KeyStrength::Strong => "Strong - 128-bit security",
            KeyStrength::Maximum => "Maximum - slow key generation, widest margin",
        }
    }

    /// Modulus size in bits
    pub fn modulus_bits(&self) -> usize {
        match self {
            KeyStrength::Standard => 2048,
            KeyStrength::Strong => 3072,
            KeyStrength::Maximum => 4096,
        }
    }
}

impl From<u8> for KeyStrength {
    fn from(value: u8) -> Self {
        match value {
            1 => KeyStrength::Strong,
            2 => KeyStrength::Maximum,
            _ => KeyStrength::Standard, // Default
        }
    }
}

impl std::fmt::Display for KeyStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub key_strength: KeyStrength,
    pub parties: Vec<String>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key_strength: KeyStrength::Standard,
            parties: vec!["Alice".to_string(), "Bob".to_string()],
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// A `.env` in the current directory is read first, then one in the
    /// platform config directory; variables already set win.
    pub fn from_env() -> MessengerResult<Self> {
        dotenv::dotenv().ok();
        if let Some(proj_dirs) = ProjectDirs::from("com", "handshake", "handshake-messenger") {
            let env_path = proj_dirs.config_dir().join(".env");
            if env_path.exists() {
                let _ = dotenv::from_path(env_path);
            }
        }

        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load a specific `.env` file into the environment, then read it
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> MessengerResult<Self> {
        dotenv::from_path(path.as_ref()).map_err(|e| {
            MessengerError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from a variable lookup, falling back to defaults
    pub fn from_vars<F>(lookup: F) -> MessengerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(strength) = lookup(ENV_KEY_STRENGTH) {
            config.key_strength = KeyStrength::from_str(&strength).map_err(MessengerError::Config)?;
        }
        if let Some(parties) = lookup(ENV_PARTIES) {
            config.parties = parties
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }
        if let Some(filter) = lookup(ENV_LOG) {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> MessengerResult<()> {
        if self.parties.is_empty() {
            return Err(MessengerError::Config("party roster is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &self.parties {
            let id = PartyId::new(name)
                .map_err(|e| MessengerError::Config(format!("party '{}': {}", name, e)))?;
            if !seen.insert(id) {
                return Err(MessengerError::Config(format!("party '{}' listed twice", name)));
            }
        }

        if self.log_filter.trim().is_empty() {
            return Err(MessengerError::Config("log filter is empty".to_string()));
        }

        Ok(())
    }

    /// Parsed party ids (call after `validate`)
    pub fn party_ids(&self) -> MessengerResult<Vec<PartyId>> {
        self.parties.iter().map(|name| PartyId::new(name)).collect()
    }
}
