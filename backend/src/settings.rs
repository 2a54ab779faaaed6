//! Deployment settings loaded via OrthoConfig.
//!
//! Every key can be set through a `PORTAL_`-prefixed environment variable,
//! for example `PORTAL_BACKEND_URL` or `PORTAL_MIN_LOADING_MS`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Deserializer};
use url::Url;
use zeroize::Zeroizing;

use crate::domain::{AdminIdentifierPolicy, DEFAULT_APOLOGY, SessionStoreConfig};

const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Problems with required or malformed settings.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A required key has no value.
    #[error("missing setting {key} (set PORTAL_{env})", env = key.to_ascii_uppercase())]
    Missing {
        /// Setting name.
        key: &'static str,
    },
    /// A URL setting does not parse.
    #[error("setting {key} is not a valid URL: {message}")]
    InvalidUrl {
        /// Setting name.
        key: &'static str,
        /// Parser message.
        message: String,
    },
}

/// Portal configuration.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PORTAL")]
pub struct PortalSettings {
    /// Base URL of the hosted backend project.
    pub backend_url: Option<String>,
    /// Public (anonymous) API key of the hosted project.
    pub backend_anon_key: Option<String>,
    /// Auth user id granted the administrator role.
    pub admin_user_id: Option<String>,
    /// Minimum time a visible loading state is held, in milliseconds.
    #[ortho_config(default = 500)]
    pub min_loading_ms: u64,
    /// Wait for the sign-out notification before forcing loading off.
    #[ortho_config(default = 1500)]
    pub sign_out_grace_ms: u64,
    /// Chat-completions endpoint for the manuscript assistant.
    pub completion_url: Option<String>,
    /// Bearer key for the completion endpoint.
    pub completion_api_key: Option<String>,
    /// Model requested from the completion endpoint.
    pub completion_model: Option<String>,
    /// Timeout applied to every outbound request, in seconds.
    #[ortho_config(default = 20)]
    pub request_timeout_secs: u64,
    /// Answer shown when the assistant cannot reply.
    #[serde(default, deserialize_with = "free_text")]
    pub apology: Option<String>,
}

impl PortalSettings {
    /// Loads settings from defaults, configuration files, and the
    /// environment. Command-line flags belong to the subcommands and are not
    /// consulted.
    ///
    /// # Errors
    ///
    /// Fails when a layer cannot be read or a value has the wrong type.
    pub fn from_environment() -> ortho_config::OrthoResult<Self> {
        Self::load_from_iter([OsString::from("portal")])
    }

    /// Hosted backend base URL.
    ///
    /// # Errors
    ///
    /// Fails when unset or not a URL.
    pub fn backend_url(&self) -> Result<Url, SettingsError> {
        parse_url("backend_url", self.backend_url.as_deref())
    }

    /// Hosted backend anonymous key.
    ///
    /// # Errors
    ///
    /// Fails when unset.
    pub fn backend_anon_key(&self) -> Result<Zeroizing<String>, SettingsError> {
        secret("backend_anon_key", self.backend_anon_key.as_deref())
    }

    /// Completion endpoint URL, falling back to the default endpoint.
    ///
    /// # Errors
    ///
    /// Fails when the configured value is not a URL.
    pub fn completion_url(&self) -> Result<Url, SettingsError> {
        parse_url(
            "completion_url",
            Some(
                self.completion_url
                    .as_deref()
                    .unwrap_or(DEFAULT_COMPLETION_URL),
            ),
        )
    }

    /// Completion bearer key.
    ///
    /// # Errors
    ///
    /// Fails when unset.
    pub fn completion_api_key(&self) -> Result<Zeroizing<String>, SettingsError> {
        secret("completion_api_key", self.completion_api_key.as_deref())
    }

    /// Model name, falling back to the default.
    pub fn completion_model(&self) -> &str {
        self.completion_model
            .as_deref()
            .unwrap_or(DEFAULT_COMPLETION_MODEL)
    }

    /// Assistant apology, falling back to the default.
    pub fn apology(&self) -> &str {
        self.apology.as_deref().unwrap_or(DEFAULT_APOLOGY)
    }

    /// Outbound request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Role policy keyed on the configured administrator id.
    ///
    /// An unset id grants nobody the administrator role.
    pub fn admin_policy(&self) -> AdminIdentifierPolicy {
        AdminIdentifierPolicy::new(self.admin_user_id.clone().unwrap_or_default())
    }

    /// Session store timings.
    pub fn session_store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            min_loading: Duration::from_millis(self.min_loading_ms),
            sign_out_grace: Duration::from_millis(self.sign_out_grace_ms),
        }
    }
}

/// Rejoins free text that the environment layer split on commas.
fn free_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Whole(String),
        Pieces(Vec<String>),
    }

    Ok(Option::<Text>::deserialize(deserializer)?.map(|text| match text {
        Text::Whole(text) => text,
        Text::Pieces(pieces) => pieces.join(", "),
    }))
}

fn parse_url(key: &'static str, raw: Option<&str>) -> Result<Url, SettingsError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SettingsError::Missing { key })?;
    Url::parse(raw).map_err(|error| SettingsError::InvalidUrl {
        key,
        message: error.to_string(),
    })
}

fn secret(key: &'static str, raw: Option<&str>) -> Result<Zeroizing<String>, SettingsError> {
    raw.filter(|value| !value.trim().is_empty())
        .map(|value| Zeroizing::new(value.to_owned()))
        .ok_or(SettingsError::Missing { key })
}
