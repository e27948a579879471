use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration, usually read from `weft.yaml`.
///
/// Every field has a default so a missing or partial file is fine;
/// `credentials` and `test_data` seed the parameter map each flow run
/// starts from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeftConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub credentials: HashMap<String, String>,

    #[serde(default)]
    pub test_data: HashMap<String, String>,

    /// Glob matching the flow definition files to load.
    #[serde(default = "default_flows")]
    pub flows: String,

    #[serde(default = "default_knowledge_path")]
    pub knowledge_path: PathBuf,

    /// Where screenshots land. Unset means no screenshots are written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Ceiling for a single selector attempt on one tier.
    #[serde(default = "default_interaction_ms")]
    pub interaction_ms: u64,

    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Endpoint of the selector-suggestion service. Unset disables the
    /// oracle tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key. The key
    /// itself never appears in config files.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,

    /// Accounted per consultation in the run report.
    #[serde(default = "default_cost_per_call")]
    pub cost_per_call: f64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_flows() -> String {
    "flows/**/*.yaml".to_string()
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("weft-knowledge.json")
}

fn default_interaction_ms() -> u64 {
    10_000
}

fn default_navigation_ms() -> u64 {
    30_000
}

fn default_api_key_env() -> String {
    "WEFT_ORACLE_API_KEY".to_string()
}

fn default_oracle_timeout_ms() -> u64 {
    20_000
}

fn default_cost_per_call() -> f64 {
    0.01
}

impl Default for WeftConfig {
    fn default() -> Self {
        WeftConfig {
            base_url: default_base_url(),
            credentials: HashMap::new(),
            test_data: HashMap::new(),
            flows: default_flows(),
            knowledge_path: default_knowledge_path(),
            artifacts_dir: None,
            timeouts: TimeoutConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            interaction_ms: default_interaction_ms(),
            navigation_ms: default_navigation_ms(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            endpoint: None,
            api_key_env: default_api_key_env(),
            timeout_ms: default_oracle_timeout_ms(),
            cost_per_call: default_cost_per_call(),
        }
    }
}
