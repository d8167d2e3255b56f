//! Configuration helpers: server URL and model defaults from the environment.

use std::env;

/// Default server address when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Environment variable holding the server address.
pub const BASE_URL_ENV: &str = "OLLAMA_HOST";

/// Environment variable holding the default model name.
pub const MODEL_ENV: &str = "OLLAMA_MODEL";

/// Get the server base URL.
///
/// Priority:
/// 1. `OLLAMA_HOST` environment variable (a bare `host:port` gets `http://`)
/// 2. `fallback`
/// 3. [`DEFAULT_BASE_URL`]
///
/// # Examples
///
/// ```rust,no_run
/// use ollama_chat::get_base_url;
///
/// let url = get_base_url(None);
/// let url = get_base_url(Some("http://gpu-box:11434"));
/// ```
pub fn get_base_url(fallback: Option<&str>) -> String {
    resolve_base_url(env::var(BASE_URL_ENV).ok(), fallback)
}

fn resolve_base_url(from_env: Option<String>, fallback: Option<&str>) -> String {
    let raw = from_env
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let raw = raw.trim().trim_end_matches('/');
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    }
}

/// Get the model name from `OLLAMA_MODEL` (when `prefer_env`) or `fallback`.
///
/// ```rust,no_run
/// use ollama_chat::get_model;
///
/// let model = get_model(Some("llama3.1"), true);
/// ```
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    let from_env = if prefer_env {
        env::var(MODEL_ENV).ok()
    } else {
        None
    };
    from_env
        .filter(|m| !m.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_base_url_priority() {
        assert_eq!(
            resolve_base_url(Some("http://env:1".into()), Some("http://fallback:2")),
            "http://env:1"
        );
        assert_eq!(
            resolve_base_url(None, Some("http://fallback:2/")),
            "http://fallback:2"
        );
        assert_eq!(resolve_base_url(None, None), DEFAULT_BASE_URL);
        assert_eq!(resolve_base_url(Some("  ".into()), None), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_resolve_base_url_adds_scheme() {
        assert_eq!(
            resolve_base_url(Some("0.0.0.0:11434".into()), None),
            "http://0.0.0.0:11434"
        );
        assert_eq!(
            resolve_base_url(Some("https://ollama.example.com".into()), None),
            "https://ollama.example.com"
        );
    }

    #[test]
    fn test_get_model_fallback_without_env() {
        assert_eq!(get_model(Some("llama3.1"), false), Some("llama3.1".to_string()));
        assert_eq!(get_model(None, false), None);
    }
}
