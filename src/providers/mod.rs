//! Provider subsystem for hosted model inference.
//!
//! Every supported backend speaks the OpenAI-compatible chat completions
//! format, so the factory [`create_provider`] only has to pick a base URL and
//! resolve credentials. Error bodies returned by upstream APIs are scrubbed of
//! secret-looking tokens before they reach logs or HTTP clients.

pub mod compatible;
pub mod traits;

pub use compatible::{AuthStyle, OpenAiCompatibleProvider};
#[allow(unused_imports)]
pub use traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolSpec};

const MAX_API_ERROR_CHARS: usize = 200;

pub const NVIDIA_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
///
/// Redacts tokens with prefixes like `sk-`, `nvapi-`, `ghp_` and `github_pat_`.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 6] = ["sk-", "nvapi-", "ghp_", "gho_", "ghu_", "github_pat_"];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Resolve the chat API key from an explicit value and environment variables.
fn resolve_provider_credential(name: &str, credential_override: Option<&str>) -> Option<String> {
    if let Some(raw_override) = credential_override {
        let trimmed_override = raw_override.trim();
        if !trimmed_override.is_empty() {
            return Some(trimmed_override.to_owned());
        }
    }

    let provider_env_candidates: &[&str] = match name {
        "nvidia" => &["NVIDIA_MOD", "NVIDIA_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        _ => &[],
    };

    first_env(provider_env_candidates).or_else(|| first_env(&["TECHDESK_API_KEY", "API_KEY"]))
}

/// Resolve the embedding API key. Falls back to the chat credential chain.
pub fn resolve_embedding_credential(
    provider: &str,
    credential_override: Option<&str>,
) -> Option<String> {
    if let Some(key) = credential_override.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    first_env(&["TECHDESK_EMBEDDING_API_KEY", "NVIDIA_EMB"])
        .or_else(|| resolve_provider_credential(provider, None))
}

/// Default base URL for a provider name, or the URL embedded in `custom:<url>`.
pub fn default_base_url(name: &str) -> Option<&str> {
    match name {
        "nvidia" => Some(NVIDIA_BASE_URL),
        "openai" => Some(OPENAI_BASE_URL),
        other => other.strip_prefix("custom:"),
    }
}

/// Factory: create the right provider by name with the default base URL.
pub fn create_provider(name: &str, api_key: Option<&str>) -> anyhow::Result<Box<dyn Provider>> {
    create_provider_with_url(name, api_key, None)
}

/// Factory: create a provider with an optional base URL override.
pub fn create_provider_with_url(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let name = name.trim();
    let Some(default_url) = default_base_url(name) else {
        anyhow::bail!(
            "Unknown provider: {name}. Supported: \"nvidia\", \"openai\", \"custom:<URL>\"."
        );
    };
    if default_url.trim().is_empty() {
        anyhow::bail!("custom provider requires a URL, e.g. custom:http://localhost:8080/v1");
    }

    let key = resolve_provider_credential(name, api_key);
    let base_url = api_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(default_url);
    let display = if name.starts_with("custom:") { "custom" } else { name };

    Ok(Box::new(OpenAiCompatibleProvider::new(
        display,
        base_url,
        key.as_deref(),
        AuthStyle::Bearer,
    )))
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    /// Canonical name used in config (e.g. `"nvidia"`)
    pub name: &'static str,
    /// Human-readable display name
    pub display_name: &'static str,
    pub base_url: &'static str,
}

/// Return the list of all known providers.
pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "nvidia",
            display_name: "NVIDIA NIM",
            base_url: NVIDIA_BASE_URL,
        },
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
            base_url: OPENAI_BASE_URL,
        },
    ]
}
