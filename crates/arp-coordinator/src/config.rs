use arp_gateway::GatewayEndpoints;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const SERVICE_NAME_ENV: &str = "ARP_SERVICE_NAME";
pub const SERVICE_VERSION_ENV: &str = "ARP_SERVICE_VERSION";
pub const TERMINAL_NODE_RUN_POLICY_ENV: &str = "ARP_TERMINAL_NODE_RUN_POLICY";
pub const STATE_DIR_ENV: &str = "ARP_STATE_DIR";

pub const DEFAULT_SERVICE_NAME: &str = "arp-run-coordinator";
pub const SUPPORTED_API_VERSIONS: &[&str] = &["v1"];

/// What completion or evaluation does to a NodeRun that is already terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TerminalNodeRunPolicy {
    /// Apply the update anyway and log it.
    #[default]
    Overwrite,
    /// Refuse with `node_run_already_terminal`.
    Reject,
}

impl TerminalNodeRunPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for TerminalNodeRunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalNodeRunPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::InvalidValue {
                key: TERMINAL_NODE_RUN_POLICY_ENV,
                message: format!("'{other}' is not one of overwrite, reject"),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub service_name: String,
    pub service_version: String,
    pub terminal_node_run_policy: TerminalNodeRunPolicy,
    /// Directory for the file-backed store; `None` keeps state in memory.
    pub state_dir: Option<PathBuf>,
    pub endpoints: GatewayEndpoints,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            terminal_node_run_policy: TerminalNodeRunPolicy::default(),
            state_dir: None,
            endpoints: GatewayEndpoints::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let terminal_node_run_policy = match read(TERMINAL_NODE_RUN_POLICY_ENV) {
            Some(raw) => raw.parse()?,
            None => defaults.terminal_node_run_policy,
        };

        Ok(Self {
            service_name: read(SERVICE_NAME_ENV).unwrap_or(defaults.service_name),
            service_version: read(SERVICE_VERSION_ENV).unwrap_or(defaults.service_version),
            terminal_node_run_policy,
            state_dir: read(STATE_DIR_ENV).map(PathBuf::from),
            endpoints: GatewayEndpoints::from_lookup(&lookup),
        })
    }

    pub fn with_terminal_node_run_policy(mut self, policy: TerminalNodeRunPolicy) -> Self {
        self.terminal_node_run_policy = policy;
        self
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(state_dir.into());
        self
    }
}
