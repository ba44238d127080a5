use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level techdesk configuration, loaded from `config.toml`.
///
/// Resolution order: `TECHDESK_CONFIG_DIR` env (also set by `--config-dir`), then
/// `~/.techdesk/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the chat model. Overridden by `TECHDESK_API_KEY`, `NVIDIA_MOD` or `API_KEY`.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible chat API. Default: NVIDIA NIM.
    pub api_url: Option<String>,
    /// Provider ID (`"nvidia"`, `"openai"` or `"custom:<url>"`). Default: `"nvidia"`.
    pub default_provider: Option<String>,
    /// Chat model (e.g. `"meta/llama-3.1-8b-instruct"`).
    pub default_model: Option<String>,
    /// Default model temperature (0.0–2.0). Default: `0.1`.
    pub default_temperature: f64,

    /// Embedding model used for document and tool retrieval (`[embedding]`).
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Support documents and chunking (`[documents]`).
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Agent loop settings (`[agent]`).
    #[serde(default)]
    pub agent: AgentConfig,

    /// Session store settings (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// HTTP gateway settings: host, port, body limit, CORS (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,
}

// ── Embedding ────────────────────────────────────────────────────

/// Embedding configuration (`[embedding]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmbeddingConfig {
    /// Embedding API key. Overridden by `TECHDESK_EMBEDDING_API_KEY` or `NVIDIA_EMB`.
    /// Falls back to the chat key when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible embeddings API.
    #[serde(default = "default_embedding_api_url")]
    pub api_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Server-side truncation of over-long inputs (`NONE`, `START`, `END`). Default: `END`.
    #[serde(default = "default_embedding_truncate")]
    pub truncate: Option<String>,
}

fn default_embedding_api_url() -> String {
    crate::providers::NVIDIA_BASE_URL.into()
}

fn default_embedding_model() -> String {
    "nvidia/nv-embedqa-e5-v5".into()
}

#[allow(clippy::unnecessary_wraps)]
fn default_embedding_truncate() -> Option<String> {
    Some("END".into())
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_embedding_api_url(),
            model: default_embedding_model(),
            truncate: default_embedding_truncate(),
        }
    }
}

// ── Documents ────────────────────────────────────────────────────

/// Document set configuration (`[documents]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentsConfig {
    /// Directory holding `<document>.pdf` (or `.md`/`.txt`) files. Default: `docs`.
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
    /// Chunk budget in estimated tokens. Default: `1024`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks. Default: `20`.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Chunks retrieved per lookup-tool query. Default: `2`.
    #[serde(default = "default_similarity_top_k")]
    pub similarity_top_k: usize,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_chunk_size() -> usize {
    1024
}

fn default_chunk_overlap() -> usize {
    20
}

fn default_similarity_top_k() -> usize {
    2
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            similarity_top_k: default_similarity_top_k(),
        }
    }
}

// ── Agent ────────────────────────────────────────────────────────

/// Agent configuration (`[agent]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Maximum reasoning/tool-call iterations per user message. Default: `60`.
    #[serde(default = "default_agent_max_iterations")]
    pub max_iterations: usize,
    /// Candidate tools offered per turn, by similarity to the message. Default: `3`.
    #[serde(default = "default_agent_tool_top_k")]
    pub tool_top_k: usize,
    /// Token budget of each session's memory window. Default: `30000`.
    #[serde(default = "default_agent_memory_token_limit")]
    pub memory_token_limit: usize,
    /// Upper bound on one chat turn, including waiting for the agent. `0` disables. Default: `120`.
    #[serde(default = "default_agent_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
    /// Chat turns allowed to run against the agent at once. Default: `1`.
    #[serde(default = "default_agent_max_concurrent_chats")]
    pub max_concurrent_chats: usize,
}

fn default_system_prompt() -> String {
    crate::agent::DEFAULT_SYSTEM_PROMPT.into()
}

fn default_agent_max_iterations() -> usize {
    60
}

fn default_agent_tool_top_k() -> usize {
    crate::tools::retriever::DEFAULT_TOOL_TOP_K
}

fn default_agent_memory_token_limit() -> usize {
    crate::memory::DEFAULT_TOKEN_LIMIT
}

fn default_agent_chat_timeout_secs() -> u64 {
    120
}

fn default_agent_max_concurrent_chats() -> usize {
    1
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_iterations: default_agent_max_iterations(),
            tool_top_k: default_agent_tool_top_k(),
            memory_token_limit: default_agent_memory_token_limit(),
            chat_timeout_secs: default_agent_chat_timeout_secs(),
            max_concurrent_chats: default_agent_max_concurrent_chats(),
        }
    }
}

// ── Sessions ─────────────────────────────────────────────────────

/// Session store configuration (`[sessions]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionsConfig {
    /// Live sessions kept before the least recently active is evicted.
    /// `0` = unbounded. Default: `1000`.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Assistant message seeded into every new session.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Name used when `POST /sessions` omits one.
    #[serde(default = "default_session_name")]
    pub default_name: String,
    /// Name of sessions created implicitly by a chat message.
    #[serde(default = "default_auto_session_name")]
    pub auto_name: String,
}

fn default_max_sessions() -> usize {
    1000
}

fn default_greeting() -> String {
    "👋 Hello! How can I help you with TechCorp IT today?".into()
}

fn default_session_name() -> String {
    "New Session".into()
}

fn default_auto_session_name() -> String {
    "Auto-created Session".into()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            greeting: default_greeting(),
            default_name: default_session_name(),
            auto_name: default_auto_session_name(),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayConfig {
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 0.0.0.0)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Maximum request body size in bytes (default: 64 KiB)
    #[serde(default = "default_gateway_max_body_bytes")]
    pub max_body_bytes: usize,
    /// CORS origins; `"*"` allows any (default: `["*"]`)
    #[serde(default = "default_gateway_allow_origins")]
    pub allow_origins: Vec<String>,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_host() -> String {
    "0.0.0.0".into()
}

fn default_gateway_max_body_bytes() -> usize {
    64 * 1024
}

fn default_gateway_allow_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            max_body_bytes: default_gateway_max_body_bytes(),
            allow_origins: default_gateway_allow_origins(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".techdesk").join("config.toml"),
            api_key: None,
            api_url: None,
            default_provider: Some("nvidia".to_string()),
            default_model: Some("meta/llama-3.1-8b-instruct".to_string()),
            default_temperature: 0.1,
            embedding: EmbeddingConfig::default(),
            documents: DocumentsConfig::default(),
            agent: AgentConfig::default(),
            sessions: SessionsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TECHDESK_CONFIG_DIR") {
        let dir = dir.trim();
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".techdesk"))
}

fn config_dir_creation_error(path: &Path) -> String {
    format!(
        "Failed to create config directory: {}. Set TECHDESK_CONFIG_DIR or pass --config-dir \
         to use a writable location.",
        path.display()
    )
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let dir = default_config_dir()?;
        Self::load_or_init_in(&dir).await
    }

    /// Load `config.toml` from `dir`, writing defaults first if it does not exist.
    pub async fn load_or_init_in(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");

        fs::create_dir_all(dir)
            .await
            .with_context(|| config_dir_creation_error(dir))?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;

            // Restrict permissions on newly created config file (may contain API keys)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            config
        } else {
            // Warn if config file is world-readable (may contain API keys)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = fs::metadata(&config_path).await {
                    if meta.permissions().mode() & 0o004 != 0 {
                        tracing::warn!(
                            "Config file {:?} is world-readable (mode {:o}). \
                             Consider restricting with: chmod 600 {:?}",
                            config_path,
                            meta.permissions().mode() & 0o777,
                            config_path,
                        );
                    }
                }
            }

            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Called after TOML deserialization and env-override application to catch
    /// obviously invalid values early instead of failing at arbitrary runtime points.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!(
                "default_temperature must be between 0.0 and 2.0 (got {})",
                self.default_temperature
            );
        }

        // Gateway
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.max_body_bytes == 0 {
            anyhow::bail!("gateway.max_body_bytes must be greater than 0");
        }

        // Agent
        if self.agent.max_iterations == 0 {
            anyhow::bail!("agent.max_iterations must be greater than 0");
        }
        if self.agent.tool_top_k == 0 {
            anyhow::bail!("agent.tool_top_k must be greater than 0");
        }
        if self.agent.memory_token_limit == 0 {
            anyhow::bail!("agent.memory_token_limit must be greater than 0");
        }
        if self.agent.max_concurrent_chats == 0 {
            anyhow::bail!("agent.max_concurrent_chats must be greater than 0");
        }

        // Documents
        if self.documents.chunk_size == 0 {
            anyhow::bail!("documents.chunk_size must be greater than 0");
        }
        if self.documents.chunk_overlap >= self.documents.chunk_size {
            anyhow::bail!(
                "documents.chunk_overlap ({}) must be smaller than documents.chunk_size ({})",
                self.documents.chunk_overlap,
                self.documents.chunk_size
            );
        }
        if self.documents.similarity_top_k == 0 {
            anyhow::bail!("documents.similarity_top_k must be greater than 0");
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // Chat key: TECHDESK_API_KEY, then the NIM-style NVIDIA_MOD, then API_KEY (generic)
        if let Some(key) = first_env(&["TECHDESK_API_KEY", "NVIDIA_MOD", "API_KEY"]) {
            self.api_key = Some(key);
        }

        // Embedding key: TECHDESK_EMBEDDING_API_KEY or NVIDIA_EMB
        if let Some(key) = first_env(&["TECHDESK_EMBEDDING_API_KEY", "NVIDIA_EMB"]) {
            self.embedding.api_key = Some(key);
        }

        if let Some(model) = first_env(&["TECHDESK_MODEL"]) {
            self.default_model = Some(model);
        }

        if let Some(url) = first_env(&["TECHDESK_API_URL"]) {
            self.api_url = Some(url);
        }

        if let Some(dir) = first_env(&["TECHDESK_DOCS_DIR"]) {
            self.documents.dir = PathBuf::from(dir);
        }

        // Gateway port: TECHDESK_GATEWAY_PORT or PORT
        if let Some(port_str) = first_env(&["TECHDESK_GATEWAY_PORT", "PORT"]) {
            match port_str.parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => {
                    tracing::warn!(value = %port_str, "Ignoring invalid gateway port override");
                }
            }
        }

        // Gateway host: TECHDESK_GATEWAY_HOST or HOST
        if let Some(host) = first_env(&["TECHDESK_GATEWAY_HOST", "HOST"]) {
            self.gateway.host = host;
        }

        // Temperature: TECHDESK_TEMPERATURE
        if let Some(temp_str) = first_env(&["TECHDESK_TEMPERATURE"]) {
            if let Ok(temp) = temp_str.parse::<f64>() {
                if (0.0..=2.0).contains(&temp) {
                    self.default_temperature = temp;
                }
            }
        }
    }

    /// Chat model to use, falling back to the built-in default.
    pub fn model(&self) -> &str {
        self.default_model
            .as_deref()
            .unwrap_or("meta/llama-3.1-8b-instruct")
    }

    /// Provider ID to use, falling back to `nvidia`.
    pub fn provider(&self) -> &str {
        self.default_provider.as_deref().unwrap_or("nvidia")
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));
        let backup_path = parent_dir.join(format!("{file_name}.bak"));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        let had_existing_config = self.config_path.exists();
        if had_existing_config {
            fs::copy(&self.config_path, &backup_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create config backup before atomic replace: {}",
                        backup_path.display()
                    )
                })?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            if had_existing_config && backup_path.exists() {
                fs::copy(&backup_path, &self.config_path)
                    .await
                    .context("Failed to restore config backup")?;
            }
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await?;

        if had_existing_config {
            let _ = fs::remove_file(&backup_path).await;
        }

        Ok(())
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::{Mutex, MutexGuard};
    use tokio::test;

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    async fn config_default_has_sane_values() {
        let c = Config::default();
        assert_eq!(c.provider(), "nvidia");
        assert_eq!(c.model(), "meta/llama-3.1-8b-instruct");
        assert!((c.default_temperature - 0.1).abs() < f64::EPSILON);
        assert!(c.api_key.is_none());
        assert!(c.config_path.to_string_lossy().contains("config.toml"));
        assert_eq!(c.agent.max_iterations, 60);
        assert_eq!(c.agent.tool_top_k, 3);
        assert_eq!(c.agent.memory_token_limit, 30_000);
        assert_eq!(c.documents.chunk_size, 1024);
        assert_eq!(c.embedding.truncate.as_deref(), Some("END"));
        assert_eq!(c.gateway.port, 8000);
        assert_eq!(c.sessions.max_sessions, 1000);
        c.validate().unwrap();
    }

    #[test]
    async fn config_schema_export_contains_expected_contract_shape() {
        let schema = schemars::schema_for!(Config);
        let schema_json = serde_json::to_value(&schema).expect("schema should serialize to json");

        let properties = schema_json
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .expect("schema should expose top-level properties");

        assert!(properties.contains_key("default_provider"));
        assert!(properties.contains_key("gateway"));
        assert!(properties.contains_key("agent"));
        assert!(properties.contains_key("sessions"));
        assert!(!properties.contains_key("config_path"));
    }

    #[test]
    async fn config_minimal_toml_uses_defaults() {
        let minimal = r#"
default_temperature = 0.3
"#;
        let parsed: Config = toml::from_str(minimal).unwrap();
        assert!(parsed.api_key.is_none());
        assert!(parsed.default_provider.is_none());
        assert_eq!(parsed.provider(), "nvidia");
        assert_eq!(parsed.documents.dir, PathBuf::from("docs"));
        assert_eq!(parsed.sessions.default_name, "New Session");
        assert_eq!(parsed.sessions.auto_name, "Auto-created Session");
        assert_eq!(parsed.gateway.allow_origins, vec!["*".to_string()]);
    }

    #[test]
    async fn agent_config_deserializes() {
        let raw = r#"
default_temperature = 0.1
[agent]
max_iterations = 12
tool_top_k = 5
chat_timeout_secs = 0
"#;
        let parsed: Config = toml::from_str(raw).unwrap();
        assert_eq!(parsed.agent.max_iterations, 12);
        assert_eq!(parsed.agent.tool_top_k, 5);
        assert_eq!(parsed.agent.chat_timeout_secs, 0);
        assert_eq!(parsed.agent.memory_token_limit, 30_000);
        assert!(parsed.agent.system_prompt.contains("IT support"));
    }

    #[test]
    async fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.api_key = Some("nvapi-test-key".into());
        config.documents.chunk_size = 512;
        config.sessions.max_sessions = 0;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.api_key, config.api_key);
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.documents.chunk_size, 512);
        assert_eq!(parsed.sessions.max_sessions, 0);
    }

    // ── Validation ───────────────────────────────────────────

    #[test]
    async fn validate_rejects_overlap_not_below_chunk_size() {
        let mut c = Config::default();
        c.documents.chunk_size = 20;
        c.documents.chunk_overlap = 20;
        assert!(c.validate().unwrap_err().to_string().contains("chunk_overlap"));
    }

    #[test]
    async fn validate_rejects_zero_caps() {
        let mut c = Config::default();
        c.agent.max_iterations = 0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.agent.tool_top_k = 0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.agent.memory_token_limit = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    async fn validate_rejects_bad_temperature_and_host() {
        let mut c = Config::default();
        c.default_temperature = 3.5;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.gateway.host = "  ".into();
        assert!(c.validate().unwrap_err().to_string().contains("gateway.host"));
    }

    // ── Persistence ──────────────────────────────────────────

    #[test]
    async fn sync_directory_handles_existing_directory() {
        let tmp = TempDir::new().unwrap();
        sync_directory(tmp.path()).await.unwrap();
    }

    #[test]
    async fn config_save_atomic_replaces_cleanly() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        let mut config = Config::default();
        config.config_path = config_path.clone();
        config.default_model = Some("model-a".into());
        config.save().await.unwrap();
        assert!(config_path.exists());

        config.default_model = Some("model-b".into());
        config.save().await.unwrap();

        let contents = fs::read_to_string(&config_path).await.unwrap();
        assert!(contents.contains("model-b"));

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(!names.iter().any(|name| name.contains(".tmp-")));
        assert!(!names.iter().any(|name| name.ends_with(".bak")));
    }

    #[test]
    async fn load_or_init_creates_then_reads_config() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();

        let created = Config::load_or_init_in(tmp.path()).await.unwrap();
        assert!(tmp.path().join("config.toml").exists());
        assert_eq!(created.gateway.port, 8000);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(tmp.path().join("config.toml"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        std::fs::write(
            tmp.path().join("config.toml"),
            "default_temperature = 0.2\n[gateway]\nport = 9100\n",
        )
        .unwrap();
        let loaded = Config::load_or_init_in(tmp.path()).await.unwrap();
        assert_eq!(loaded.gateway.port, 9100);
        assert!((loaded.default_temperature - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    async fn load_rejects_invalid_values() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "default_temperature = 0.1\n[agent]\nmax_iterations = 0\n",
        )
        .unwrap();
        assert!(Config::load_or_init_in(tmp.path()).await.is_err());
    }

    // ── Env override helpers ─────────────────────────────────

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            "TECHDESK_API_KEY",
            "NVIDIA_MOD",
            "API_KEY",
            "TECHDESK_EMBEDDING_API_KEY",
            "NVIDIA_EMB",
            "TECHDESK_MODEL",
            "TECHDESK_API_URL",
            "TECHDESK_DOCS_DIR",
            "TECHDESK_GATEWAY_PORT",
            "PORT",
            "TECHDESK_GATEWAY_HOST",
            "HOST",
            "TECHDESK_TEMPERATURE",
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Env override tests ───────────────────────────────────

    #[test]
    async fn env_override_api_key_precedence() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("API_KEY", "generic-key");
        std::env::set_var("NVIDIA_MOD", "nvapi-mod-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("nvapi-mod-key"));

        std::env::set_var("TECHDESK_API_KEY", "techdesk-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("techdesk-key"));

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_embedding_key() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("NVIDIA_EMB", "nvapi-emb-key");
        config.apply_env_overrides();
        assert_eq!(config.embedding.api_key.as_deref(), Some("nvapi-emb-key"));
        assert!(config.api_key.is_none());

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_gateway_and_docs() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("PORT", "9000");
        std::env::set_var("TECHDESK_GATEWAY_HOST", "127.0.0.1");
        std::env::set_var("TECHDESK_DOCS_DIR", "/srv/docs");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.documents.dir, PathBuf::from("/srv/docs"));

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_invalid_values_ignored() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("TECHDESK_GATEWAY_PORT", "not-a-port");
        std::env::set_var("TECHDESK_TEMPERATURE", "9.0");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 8000);
        assert!((config.default_temperature - 0.1).abs() < f64::EPSILON);

        std::env::set_var("TECHDESK_TEMPERATURE", "0.4");
        config.apply_env_overrides();
        assert!((config.default_temperature - 0.4).abs() < f64::EPSILON);

        clear_env_test_vars();
    }
}
