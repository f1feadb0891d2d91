//! Agent constants
//!
//! Centralized location for topic names, header keys, and filesystem names
//! shared by every crate.

// Event bus topics
pub const TOPIC_ENROLL_REQUEST: &str = "agent.EnrollRequest";
pub const TOPIC_ENROLL_RESPONSE: &str = "agent.EnrollResponse";
pub const TOPIC_EXPORT_REQUEST: &str = "agent.ExportRequest";
pub const TOPIC_EXPORT_RESPONSE: &str = "agent.ExportResponse";
pub const TOPIC_INTEGRATION_REQUEST: &str = "agent.IntegrationRequest";
pub const TOPIC_INTEGRATION_RESPONSE: &str = "agent.IntegrationResponse";
pub const TOPIC_EXPORT_LOG: &str = "agent.ExportLog";
pub const TOPIC_LIFECYCLE: &str = "agent.Lifecycle";
pub const TOPIC_USER_REQUEST: &str = "agent.UserRequest";
pub const TOPIC_USER_RESPONSE: &str = "agent.UserResponse";
pub const TOPIC_REPO_REQUEST: &str = "agent.RepoRequest";
pub const TOPIC_REPO_RESPONSE: &str = "agent.RepoResponse";
pub const TOPIC_PROJECT_REQUEST: &str = "agent.ProjectRequest";
pub const TOPIC_PROJECT_RESPONSE: &str = "agent.ProjectResponse";

// Header keys used for request/response correlation
pub const HEADER_DEVICE_ID: &str = "uuid";
pub const HEADER_CUSTOMER_ID: &str = "customer_id";
pub const HEADER_JOB_ID: &str = "job_id";

/// Prefix of the consumer group derived from a device id.
pub const GROUP_PREFIX: &str = "agent-";

// Runtime defaults
pub const DEFAULT_HEARTBEAT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_BATCH_SIZE: usize = 100;
pub const ENCRYPTION_KEY_LEN: usize = 32;

// Worker process contract
pub const WORKER_SUBCOMMAND: &str = "export";
pub const ARG_INTEGRATIONS_FILE: &str = "--integrations-file";
pub const ARG_AGENT_CONFIG_FILE: &str = "--agent-config-file";
pub const ARG_LOG_LEVEL: &str = "--log-level";
pub const ARG_LOG_FORMAT: &str = "--log-format";
/// Workers always log structured lines so the agent can forward them verbatim.
pub const WORKER_LOG_FORMAT: &str = "json";
pub const ARG_JOB_ID: &str = "--job-id";
pub const ARG_REPROCESS_HISTORICAL: &str = "--reprocess-historical";

// Filesystem layout under the agent root
pub const DIR_TEMP: &str = "temp";
pub const DIR_LOGS: &str = "logs";
pub const DIR_STATE: &str = "state";
pub const DIR_UPLOADS: &str = "uploads";
pub const FILE_DEVICE_CONFIG: &str = "config.json";
pub const FILE_LAST_PROCESSED: &str = "last_processed.json";
pub const FILE_PID: &str = "agent.pid";
pub const FILE_SETTINGS_TOML: &str = "agent.toml";
pub const FILE_SETTINGS_JSON: &str = "agent.json";

/// Name of the built-in exporter used for local smoke runs.
pub const MOCK_INTEGRATION: &str = "mock";
