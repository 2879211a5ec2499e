use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::workflow::{PollPolicy, WorkflowSettings};

/// Client configuration.  Every key is optional in the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint of the server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API token, sent as the `token` query parameter.
    #[serde(default)]
    pub token: Option<String>,

    /// How long to wait for any inbound frame before giving up.
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,

    /// Inbound frames larger than this are dropped unparsed.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default)]
    pub workflow: WorkflowConfig,
}

// ── Workflow ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_task")]
    pub task: String,

    #[serde(default = "default_true")]
    pub precision_mode: bool,

    #[serde(default = "default_true")]
    pub navigate_to_home: bool,

    /// Delay between the submit result and the first status check.
    #[serde(default = "default_poll_secs")]
    pub poll_delay_secs: u64,

    /// Keep checking until the task reports a terminal status instead of
    /// checking once.
    #[serde(default)]
    pub poll_until_terminal: bool,

    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

fn default_endpoint() -> String {
    "ws://localhost:3000".into()
}
fn default_receive_timeout_secs() -> u64 {
    30
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}
fn default_task() -> String {
    WorkflowSettings::default().task
}
fn default_true() -> bool {
    true
}
fn default_poll_secs() -> u64 {
    5
}
fn default_max_poll_attempts() -> u32 {
    12
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            receive_timeout_secs: default_receive_timeout_secs(),
            max_frame_bytes: default_max_frame_bytes(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            task: default_task(),
            precision_mode: true,
            navigate_to_home: true,
            poll_delay_secs: default_poll_secs(),
            poll_until_terminal: false,
            poll_interval_secs: default_poll_secs(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl WorkflowConfig {
    pub fn to_settings(&self) -> WorkflowSettings {
        let poll_policy = if self.poll_until_terminal {
            PollPolicy::UntilTerminal {
                interval: Duration::from_secs(self.poll_interval_secs),
                max_attempts: self.max_poll_attempts.max(1),
            }
        } else {
            PollPolicy::Once
        };

        WorkflowSettings {
            task: self.task.clone(),
            precision_mode: self.precision_mode,
            navigate_to_home: self.navigate_to_home,
            poll_delay: Duration::from_secs(self.poll_delay_secs),
            poll_policy,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing keys.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Load from `path` if given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ClientError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Override fields from `AIRTAP_URL`, `API_TOKEN` and `AIRTAP_TASK`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("AIRTAP_URL") {
            self.endpoint = url;
        }
        if let Some(token) = non_empty("API_TOKEN") {
            self.token = Some(token);
        }
        if let Some(task) = non_empty("AIRTAP_TASK") {
            self.workflow.task = task;
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_config_defaults() {
        let cfg: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.endpoint, "ws://localhost:3000");
        assert_eq!(cfg.token, None);
        assert_eq!(cfg.receive_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.max_frame_bytes, 1024 * 1024);
        assert!(cfg.workflow.precision_mode);
        assert!(cfg.workflow.navigate_to_home);
        assert_eq!(cfg.workflow.to_settings().poll_policy, PollPolicy::Once);
        assert_eq!(cfg.workflow.to_settings().poll_delay, Duration::from_secs(5));
    }

    #[test]
    fn deserialize_full_config() {
        let raw = r#"
            endpoint = "ws://airtap.local:3000"
            token = "secret"
            receive_timeout_secs = 10

            [workflow]
            task = "Open Notes and create a note titled Groceries"
            precision_mode = false
            poll_until_terminal = true
            poll_interval_secs = 2
            max_poll_attempts = 30
        "#;
        let cfg: ClientConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.endpoint, "ws://airtap.local:3000");
        assert_eq!(cfg.token.as_deref(), Some("secret"));

        let settings = cfg.workflow.to_settings();
        assert_eq!(settings.task, "Open Notes and create a note titled Groceries");
        assert!(!settings.precision_mode);
        assert!(settings.navigate_to_home);
        assert_eq!(
            settings.poll_policy,
            PollPolicy::UntilTerminal {
                interval: Duration::from_secs(2),
                max_attempts: 30,
            }
        );
    }

    #[test]
    fn env_overrides_non_empty_values_only() {
        let env: HashMap<&str, &str> = [
            ("AIRTAP_URL", "ws://10.0.0.5:3000"),
            ("API_TOKEN", "  "),
            ("AIRTAP_TASK", "Take a screenshot"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ClientConfig {
            token: Some("from-file".into()),
            ..Default::default()
        };
        cfg.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.endpoint, "ws://10.0.0.5:3000");
        assert_eq!(cfg.token.as_deref(), Some("from-file"));
        assert_eq!(cfg.workflow.task, "Take a screenshot");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ClientConfig::load(Path::new("/nonexistent/airtap.toml")).unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("/nonexistent/airtap.toml")));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airtap.toml");
        std::fs::write(&path, "endpoint = \"ws://example:4000\"\n").unwrap();

        let cfg = ClientConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(cfg.endpoint, "ws://example:4000");
        assert_eq!(cfg.workflow.max_poll_attempts, 12);
    }
}
