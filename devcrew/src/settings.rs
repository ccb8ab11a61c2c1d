//! Settings file + environment resolution.
//!
//! Every knob has a built-in default, which the TOML settings file may
//! replace, which an environment variable may replace in turn:
//!
//! ```text
//! ROLE_ARCHITECT / ROLE_DEVELOPER / ROLE_TESTER   provider per role
//! MODEL_OPENAI / MODEL_GOOGLE / MODEL_ANTHROPIC   model per provider
//! OPENAI_API_KEY / GOOGLE_API_KEY / ANTHROPIC_API_KEY
//! PROJECT_BASE_PATH
//! ```
//!
//! API keys only come from the environment. A key is required only for a
//! provider that some role is assigned to.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "devcrew.toml";

/// A hosted LLM vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Google,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Openai, Provider::Google, Provider::Anthropic];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Google => "google",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn key_var(self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Environment variable overriding this provider's model.
    pub fn model_var(self) -> &'static str {
        match self {
            Provider::Openai => "MODEL_OPENAI",
            Provider::Google => "MODEL_GOOGLE",
            Provider::Anthropic => "MODEL_ANTHROPIC",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::Openai),
            "google" => Ok(Provider::Google),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(PipelineError::config(format!(
                "unknown provider '{other}' (expected one of: openai, google, anthropic)"
            ))),
        }
    }
}

// Case-insensitive, like the environment overrides.
impl<'de> Deserialize<'de> for Provider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// A pipeline stage bound to one provider per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Architect,
    Developer,
    Tester,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Architect, Role::Developer, Role::Tester];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Architect => "architect",
            Role::Developer => "developer",
            Role::Tester => "tester",
        }
    }

    /// Environment variable overriding this role's provider.
    pub fn env_var(self) -> &'static str {
        match self {
            Role::Architect => "ROLE_ARCHITECT",
            Role::Developer => "ROLE_DEVELOPER",
            Role::Tester => "ROLE_TESTER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Which stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Plan, code, compile-check, write.
    #[default]
    Basic,
    /// Basic plus live functional QA against a spawned server.
    Advanced,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Basic => f.write_str("basic"),
            Variant::Advanced => f.write_str("advanced"),
        }
    }
}

impl FromStr for Variant {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Variant::Basic),
            "advanced" => Ok(Variant::Advanced),
            other => Err(PipelineError::config(format!(
                "unknown variant '{other}' (expected basic or advanced)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleDefaults {
    pub architect: Provider,
    pub developer: Provider,
    pub tester: Provider,
}

impl Default for RoleDefaults {
    fn default() -> Self {
        Self {
            architect: Provider::Anthropic,
            developer: Provider::Google,
            tester: Provider::Openai,
        }
    }
}

impl RoleDefaults {
    pub fn get(&self, role: Role) -> Provider {
        match role {
            Role::Architect => self.architect,
            Role::Developer => self.developer,
            Role::Tester => self.tester,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDefaults {
    pub openai: String,
    pub google: String,
    pub anthropic: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            openai: "gpt-4o".to_string(),
            google: "gemini-2.0-flash".to_string(),
            anthropic: "claude-3-7-sonnet-20250219".to_string(),
        }
    }
}

impl ModelDefaults {
    pub fn get(&self, provider: Provider) -> &str {
        match provider {
            Provider::Openai => &self.openai,
            Provider::Google => &self.google,
            Provider::Anthropic => &self.anthropic,
        }
    }
}

/// API base URL overrides, e.g. for a proxy. Unset means the vendor's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseUrls {
    pub openai: Option<String>,
    pub google: Option<String>,
    pub anthropic: Option<String>,
}

impl BaseUrls {
    pub fn get(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Openai => self.openai.as_deref(),
            Provider::Google => self.google.as_deref(),
            Provider::Anthropic => self.anthropic.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Directory the generated code lands in. `~` expands to home.
    pub base_path: String,
    /// File name of the generated source inside `base_path`.
    pub file_name: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            base_path: "~/project/todo_list_fastapi_demo".to_string(),
            file_name: "main.py".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntaxCheckSettings {
    pub enabled: bool,
    /// Program and arguments; `{file}` is replaced by the file to check.
    pub command: Vec<String>,
}

impl Default for SyntaxCheckSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            command: ["python3", "-m", "py_compile", "{file}"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSettings {
    /// Program and arguments that serve the generated app, run in the
    /// project directory. `{module}` is replaced by the import path of
    /// `project.file_name` (`app/main.py` becomes `app.main`).
    pub server_command: Vec<String>,
    pub base_url: String,
    /// The server process must stay up this long before an answer on
    /// `base_url` counts as ready.
    pub startup_grace_secs: u64,
    /// Readiness wait after the grace period.
    pub ready_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            server_command: ["uvicorn", "{module}:app", "--host", "127.0.0.1", "--port", "8000"]
                .map(String::from)
                .to_vec(),
            base_url: "http://127.0.0.1:8000".to_string(),
            startup_grace_secs: 5,
            ready_timeout_secs: 15,
            request_timeout_secs: 10,
        }
    }
}

impl QaSettings {
    pub fn startup_grace(&self) -> Duration {
        Duration::from_secs(self.startup_grace_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub variant: Variant,
    pub roles: RoleDefaults,
    pub models: ModelDefaults,
    pub base_urls: BaseUrls,
    pub project: ProjectSettings,
    pub syntax_check: SyntaxCheckSettings,
    pub qa: QaSettings,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| PipelineError::config(format!("invalid settings file: {e}")))
    }

    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_SETTINGS_FILE`]
    /// is read if present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "Loaded settings file");
                Self::from_toml_str(&text)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(PipelineError::config(format!(
                "cannot read settings file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Apply environment overrides and check that every assigned provider
    /// has a key. Nothing here touches the network.
    pub fn resolve<F>(&self, env: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let mut assignments = Vec::with_capacity(Role::ALL.len());
        let mut missing = Vec::new();

        for role in Role::ALL {
            let provider = match lookup(role.env_var()) {
                Some(v) => v.parse::<Provider>().map_err(|_| {
                    PipelineError::config(format!(
                        "{}='{v}' is not a known provider (expected openai, google or anthropic)",
                        role.env_var()
                    ))
                })?,
                None => self.roles.get(role),
            };

            let model = lookup(provider.model_var())
                .unwrap_or_else(|| self.models.get(provider).to_string());

            match lookup(provider.key_var()) {
                Some(key) => assignments.push(RoleAssignment {
                    role,
                    provider,
                    model,
                    api_key: ApiKey(key.trim().to_string()),
                    base_url: self.base_urls.get(provider).map(str::to_string),
                }),
                None => missing.push(format!("{} (needed by {role})", provider.key_var())),
            }
        }

        if !missing.is_empty() {
            return Err(PipelineError::config(format!(
                "missing API key: {}",
                missing.join(", ")
            )));
        }

        let base_path = lookup("PROJECT_BASE_PATH").unwrap_or_else(|| self.project.base_path.clone());
        let file_name = self.project.file_name.trim();
        if file_name.is_empty() {
            return Err(PipelineError::config("project.file_name must not be empty"));
        }
        if self.syntax_check.enabled && self.syntax_check.command.is_empty() {
            return Err(PipelineError::config(
                "syntax_check.command must not be empty when the check is enabled",
            ));
        }
        if self.variant == Variant::Advanced && self.qa.server_command.is_empty() {
            return Err(PipelineError::config(
                "qa.server_command must not be empty for the advanced variant",
            ));
        }

        // Role::ALL order is architect, developer, tester.
        let mut it = assignments.into_iter();
        let (Some(architect), Some(developer), Some(tester)) = (it.next(), it.next(), it.next())
        else {
            return Err(PipelineError::config("role table incomplete"));
        };

        Ok(ResolvedConfig {
            crew: Crew {
                architect,
                developer,
                tester,
            },
            project_dir: expand_home(&base_path),
            file_name: file_name.to_string(),
            variant: self.variant,
            syntax_check: self.syntax_check.clone(),
            qa: self.qa.clone(),
        })
    }
}

/// Environment lookup backed by the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// An API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Role → (provider, model, key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub role: Role,
    pub provider: Provider,
    pub model: String,
    pub api_key: ApiKey,
    pub base_url: Option<String>,
}

/// The three resolved role assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crew {
    pub architect: RoleAssignment,
    pub developer: RoleAssignment,
    pub tester: RoleAssignment,
}

impl Crew {
    pub fn get(&self, role: Role) -> &RoleAssignment {
        match role {
            Role::Architect => &self.architect,
            Role::Developer => &self.developer,
            Role::Tester => &self.tester,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleAssignment> {
        [&self.architect, &self.developer, &self.tester].into_iter()
    }
}

/// Everything a run needs, after overrides and validation.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub crew: Crew,
    pub project_dir: PathBuf,
    pub file_name: String,
    pub variant: Variant,
    pub syntax_check: SyntaxCheckSettings,
    pub qa: QaSettings,
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
