//! Runtime settings read from the environment.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3-coder-next";
pub const MAX_HISTORY_SESSIONS: usize = 50;

/// Configuration shared by the gateway, the session store and the renderer
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub default_model: String,
    pub history_dir: PathBuf,
    pub max_history_sessions: usize,
    pub chat_timeout: Duration,
    pub list_timeout: Duration,
    pub color: bool,
}

impl Settings {
    /// Build settings from `OLLAMA_HOST`, `ASK_MODEL`, `ASK_HISTORY_DIR` and `NO_COLOR`.
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let history_dir = std::env::var("ASK_HISTORY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_history_dir());

        Self {
            host: normalize_host(&host),
            default_model: std::env::var("ASK_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            history_dir,
            max_history_sessions: MAX_HISTORY_SESSIONS,
            chat_timeout: Duration::from_secs(300),
            list_timeout: Duration::from_secs(10),
            color: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

fn default_history_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".ask_history")
}

pub(crate) fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_env() {
        std::env::set_var("OLLAMA_HOST", "http://gpu-box:11434/");
        std::env::set_var("ASK_MODEL", "llama3");
        std::env::set_var("ASK_HISTORY_DIR", "/tmp/ask-history-test");

        let settings = Settings::from_env();

        assert_eq!(settings.host, "http://gpu-box:11434");
        assert_eq!(settings.default_model, "llama3");
        assert_eq!(settings.history_dir, PathBuf::from("/tmp/ask-history-test"));
        assert_eq!(settings.max_history_sessions, 50);
        assert_eq!(settings.chat_timeout, Duration::from_secs(300));
        assert_eq!(settings.list_timeout, Duration::from_secs(10));

        std::env::remove_var("OLLAMA_HOST");
        std::env::remove_var("ASK_MODEL");
        std::env::remove_var("ASK_HISTORY_DIR");
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("http://localhost:11434"), "http://localhost:11434");
        assert_eq!(normalize_host(" http://localhost:11434// "), "http://localhost:11434");
    }

    #[test]
    fn test_default_history_dir_name() {
        assert!(default_history_dir().ends_with(".ask_history"));
    }
}
