use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::state::DEFAULT_MAX_TOOL_ROUNDS;
use crate::util::{is_http_url, is_local_endpoint_url, parse_flag};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-05-01-preview";
pub const DEFAULT_ASSISTANT_TITLE: &str = "Assistants API UI";
pub const DEFAULT_UPLOAD_MESSAGE: &str = "Upload a file";
pub const MAX_TOOL_ROUNDS_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantProfile {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

/// Which assistants the user may talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelection {
    /// One fixed assistant; no switching.
    Single(AssistantProfile),
    /// A named list the user picks from; the first entry is active at start.
    Multiple(Vec<AssistantProfile>),
    Unconfigured,
}

impl ProfileSelection {
    pub fn profiles(&self) -> &[AssistantProfile] {
        match self {
            Self::Single(profile) => std::slice::from_ref(profile),
            Self::Multiple(profiles) => profiles,
            Self::Unconfigured => &[],
        }
    }

    pub fn default_profile(&self) -> Option<&AssistantProfile> {
        self.profiles().first()
    }

    pub fn find(&self, title: &str) -> Option<&AssistantProfile> {
        let title = title.trim();
        self.profiles()
            .iter()
            .find(|profile| profile.title.eq_ignore_ascii_case(title))
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub azure: Option<AzureSettings>,
    pub profiles: ProfileSelection,
    pub instructions: String,
    pub upload_message: String,
    pub uploads_enabled: bool,
    pub authentication_required: bool,
    pub max_tool_rounds: usize,
    pub transcript_dir: PathBuf,
    pub working_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let working_dir = std::env::current_dir()?;
        Self::from_source(|key| std::env::var(key).ok(), working_dir)
    }

    /// Builds a config from any variable lookup; `load` passes the process
    /// environment.
    pub fn from_source<F>(lookup: F, working_dir: PathBuf) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let flag = |key: &str| {
            non_empty(key)
                .and_then(|value| parse_flag(&value))
                .unwrap_or(false)
        };

        let api_url = non_empty("RUNSTREAM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_key = non_empty("OPENAI_API_KEY");

        let azure = match (non_empty("AZURE_OPENAI_ENDPOINT"), non_empty("AZURE_OPENAI_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(AzureSettings {
                endpoint,
                api_key,
                api_version: non_empty("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            }),
            _ => None,
        };

        let profiles = if let Some(raw) = non_empty("OPENAI_ASSISTANTS") {
            let profiles: Vec<AssistantProfile> = serde_json::from_str(&raw)
                .context("OPENAI_ASSISTANTS must be a JSON list of {\"id\", \"title\"} objects")?;
            ProfileSelection::Multiple(profiles)
        } else if let Some(id) = non_empty("ASSISTANT_ID") {
            ProfileSelection::Single(AssistantProfile {
                id,
                title: non_empty("ASSISTANT_TITLE")
                    .unwrap_or_else(|| DEFAULT_ASSISTANT_TITLE.to_string()),
            })
        } else {
            ProfileSelection::Unconfigured
        };

        let max_tool_rounds = match non_empty("RUNSTREAM_MAX_TOOL_ROUNDS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid RUNSTREAM_MAX_TOOL_ROUNDS '{raw}'"))?
                .clamp(1, MAX_TOOL_ROUNDS_LIMIT),
            None => DEFAULT_MAX_TOOL_ROUNDS,
        };

        let transcript_dir = non_empty("RUNSTREAM_TRANSCRIPT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| working_dir.clone());

        Ok(Self {
            api_key,
            api_url,
            azure,
            profiles,
            instructions: lookup("RUN_INSTRUCTIONS").unwrap_or_default(),
            upload_message: non_empty("ENABLED_FILE_UPLOAD_MESSAGE")
                .unwrap_or_else(|| DEFAULT_UPLOAD_MESSAGE.to_string()),
            uploads_enabled: flag("RUNSTREAM_UPLOADS_ENABLED"),
            authentication_required: flag("AUTHENTICATION_REQUIRED"),
            max_tool_rounds,
            transcript_dir,
            working_dir,
        })
    }

    pub fn validate(&self) -> Result<()> {
        match &self.azure {
            Some(azure) => {
                if !is_http_url(&azure.endpoint) {
                    bail!(
                        "Invalid AZURE_OPENAI_ENDPOINT '{}': expected http:// or https:// URL",
                        azure.endpoint
                    );
                }
            }
            None => {
                if !is_http_url(&self.api_url) {
                    bail!(
                        "Invalid RUNSTREAM_API_URL '{}': expected http:// or https:// URL",
                        self.api_url
                    );
                }
                if !self.is_local_endpoint() && self.api_key.is_none() {
                    bail!(
                        "OPENAI_API_KEY must be set for non-local endpoints (url: '{}')",
                        self.api_url
                    );
                }
            }
        }

        match &self.profiles {
            ProfileSelection::Unconfigured => {
                bail!("No assistant configured: set OPENAI_ASSISTANTS or ASSISTANT_ID")
            }
            ProfileSelection::Single(profile) if profile.id.trim().is_empty() => {
                bail!("ASSISTANT_ID must not be empty")
            }
            ProfileSelection::Single(_) => {}
            ProfileSelection::Multiple(profiles) => {
                if profiles.is_empty() {
                    bail!("OPENAI_ASSISTANTS must list at least one assistant");
                }
                let mut titles = HashSet::new();
                for profile in profiles {
                    if profile.id.trim().is_empty() || profile.title.trim().is_empty() {
                        bail!("OPENAI_ASSISTANTS entries need a non-empty id and title");
                    }
                    if !titles.insert(profile.title.trim().to_lowercase()) {
                        bail!("Duplicate assistant title '{}' in OPENAI_ASSISTANTS", profile.title);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        self.azure.is_none() && is_local_endpoint_url(&self.api_url)
    }
}
