// API key storage and resolution
//
// Keys are looked up from the environment first, then from OS-native
// secure storage (macOS Keychain, Windows Credential Manager, Linux
// Secret Service). Nothing here is global: callers resolve a key and
// hand it to a backend constructor explicitly.

use keyring::Entry;
use log::warn;

const SERVICE_NAME: &str = "dev.vibelist.engine";

/// Remote chat providers the engine can hold credentials for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
}

impl Provider {
    /// Environment variable consulted before the keychain.
    pub const fn env_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    const fn keychain_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic_api_key",
            Provider::OpenAi => "openai_api_key",
        }
    }

    const fn key_prefix(self) -> &'static str {
        match self {
            Provider::Anthropic => "sk-ant-",
            Provider::OpenAi => "sk-",
        }
    }
}

pub struct CredentialManager;

impl CredentialManager {
    /// Resolve the API key for `provider`: environment variable first,
    /// then the OS keychain. Returns `None` when neither is configured.
    pub fn resolve(provider: Provider) -> Option<String> {
        if let Ok(key) = std::env::var(provider.env_var()) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        let entry = match Entry::new(SERVICE_NAME, provider.keychain_name()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("keychain unavailable: {e}");
                return None;
            }
        };
        match entry.get_password() {
            Ok(key) => Some(key),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("failed to read {} from keychain: {e}", provider.env_var());
                None
            }
        }
    }

    /// Store an API key for `provider` in the OS keychain.
    pub fn store(provider: Provider, key: &str) -> Result<(), String> {
        Self::check_format(provider, key)?;

        let entry = Entry::new(SERVICE_NAME, provider.keychain_name())
            .map_err(|e| format!("Failed to access keychain: {e}"))?;
        entry
            .set_password(key)
            .map_err(|e| format!("Failed to store API key: {e}"))
    }

    /// Remove the stored key for `provider` from the OS keychain.
    pub fn delete(provider: Provider) -> Result<(), String> {
        let entry = Entry::new(SERVICE_NAME, provider.keychain_name())
            .map_err(|e| format!("Failed to access keychain: {e}"))?;
        entry
            .delete_credential()
            .map_err(|e| format!("Failed to delete API key: {e}"))
    }

    /// Sanity-check a key before storing it. Anthropic keys start with
    /// "sk-ant-", OpenAI keys with "sk-"; both are long.
    pub fn check_format(provider: Provider, key: &str) -> Result<(), String> {
        if !key.starts_with(provider.key_prefix()) {
            return Err(format!(
                "Invalid API key format; keys for this provider start with '{}'",
                provider.key_prefix()
            ));
        }
        if key.len() < 20 {
            return Err("API key appears too short. Please check and try again.".to_string());
        }
        Ok(())
    }
}
