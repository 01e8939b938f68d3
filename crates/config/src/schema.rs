/// Config schema types (decision service, agent behaviour, input dispatch).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndusConfig {
    pub service: ServiceConfig,
    pub agent: AgentConfig,
    pub dispatch: DispatchConfig,
}

/// Remote decision service connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL; `/chat` and `/computer` are appended.
    pub base_url: String,

    /// Bearer token sent with every request (optional).
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,

    /// Per-request timeout in seconds. Expiry is reported as a transport failure.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://indus-backend.tushar-vijayanagar.workers.dev".into(),
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}

/// Task-level agent behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Ask the planner endpoint for high-level steps before deciding an action.
    pub plan_before_act: bool,
    /// Screenshots wider or taller than this are downscaled before upload.
    /// 0 disables downscaling.
    pub max_screenshot_dimension: u32,
    /// Domains the agent may navigate to (empty = all allowed).
    /// `*.example.com` also matches `example.com`.
    pub allowed_domains: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            plan_before_act: false,
            max_screenshot_dimension: 1920,
            allowed_domains: Vec::new(),
        }
    }
}

/// Synthetic input timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Delay after focusing a surface before the first input event.
    pub settle_ms: u64,
    /// Delay between consecutive pointer events of one click.
    pub step_delay_ms: u64,
    /// Upper bound for a `wait` action requested by the decision service.
    pub max_wait_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            settle_ms: 50,
            step_delay_ms: 30,
            max_wait_ms: 10_000,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
