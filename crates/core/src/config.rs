use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    /// Explicit Chrome/Chromium binary. Discovered on PATH when unset.
    #[serde(default)]
    pub executable_path: Option<String>,
    /// Profile directory. Falls back to `~/.webnav/sessions/<session>`.
    #[serde(default)]
    pub user_data_dir: Option<String>,
    /// Attach to an already running browser (`http://127.0.0.1:9222`)
    /// instead of launching one.
    #[serde(default)]
    pub remote_debugging_url: Option<String>,
    #[serde(default = "default_homepage")]
    pub homepage: String,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,
}

fn default_homepage() -> String {
    "https://www.google.com".to_string()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_launch_timeout_secs() -> u64 {
    15
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable_path: None,
            user_data_dir: None,
            remote_debugging_url: None,
            homepage: default_homepage(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            launch_timeout_secs: default_launch_timeout_secs(),
        }
    }
}

/// Bounded waits used inside individual browser actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    /// How long an action keeps listening for DOM changes after it completes.
    #[serde(default = "default_settle_window_ms")]
    pub settle_window_ms: u64,
    #[serde(default = "default_locate_timeout_ms")]
    pub locate_timeout_ms: u64,
    #[serde(default = "default_scroll_timeout_ms")]
    pub scroll_timeout_ms: u64,
    #[serde(default = "default_visible_timeout_ms")]
    pub visible_timeout_ms: u64,
    #[serde(default = "default_keystroke_delay_ms")]
    pub keystroke_delay_ms: u64,
    /// Pause between the focus / clear / type steps of text entry.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_dom_ready_timeout_ms")]
    pub dom_ready_timeout_ms: u64,
}

fn default_settle_window_ms() -> u64 {
    100
}

fn default_locate_timeout_ms() -> u64 {
    2000
}

fn default_scroll_timeout_ms() -> u64 {
    200
}

fn default_visible_timeout_ms() -> u64 {
    200
}

fn default_keystroke_delay_ms() -> u64 {
    1
}

fn default_step_delay_ms() -> u64 {
    100
}

fn default_dom_ready_timeout_ms() -> u64 {
    2000
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            settle_window_ms: default_settle_window_ms(),
            locate_timeout_ms: default_locate_timeout_ms(),
            scroll_timeout_ms: default_scroll_timeout_ms(),
            visible_timeout_ms: default_visible_timeout_ms(),
            keystroke_delay_ms: default_keystroke_delay_ms(),
            step_delay_ms: default_step_delay_ms(),
            dom_ready_timeout_ms: default_dom_ready_timeout_ms(),
        }
    }
}

impl ActionConfig {
    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    pub fn scroll_timeout(&self) -> Duration {
        Duration::from_millis(self.scroll_timeout_ms)
    }

    pub fn visible_timeout(&self) -> Duration {
        Duration::from_millis(self.visible_timeout_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn dom_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.dom_ready_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Trailing turns compared by loop detection.
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,
    #[serde(default)]
    pub take_screenshots: bool,
    /// Write raw and reconciled accessibility trees to the log directory.
    #[serde(default)]
    pub dump_trees: bool,
}

fn default_loop_window() -> usize {
    6
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            loop_window: default_loop_window(),
            take_screenshots: false,
            dump_trees: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub actions: ActionConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `BROWSER_STORAGE_DIR` and `WEBNAV_HEADLESS` take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("BROWSER_STORAGE_DIR").ok(),
            std::env::var("WEBNAV_HEADLESS").ok(),
        );
    }

    fn apply_overrides(&mut self, storage_dir: Option<String>, headless: Option<String>) {
        if let Some(dir) = storage_dir.filter(|d| !d.trim().is_empty()) {
            self.browser.user_data_dir = Some(dir);
        }
        if let Some(flag) = headless {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.browser.headless = true,
                "0" | "false" | "no" => self.browser.headless = false,
                other => tracing::warn!(value = other, "Ignoring unrecognised WEBNAV_HEADLESS"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.actions.settle_window_ms, 100);
        assert_eq!(cfg.actions.locate_timeout_ms, 2000);
        assert_eq!(cfg.agent.loop_window, 6);
        assert_eq!(cfg.browser.window_width, 1280);
        assert!(!cfg.browser.headless);
    }

    #[test]
    fn test_camel_case_fields() {
        let raw = r#"{
  "browser": { "headless": true, "remoteDebuggingUrl": "http://127.0.0.1:9222" },
  "actions": { "settleWindowMs": 250 },
  "agent": { "loopWindow": 4, "dumpTrees": true }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert!(cfg.browser.headless);
        assert_eq!(
            cfg.browser.remote_debugging_url.as_deref(),
            Some("http://127.0.0.1:9222")
        );
        assert_eq!(cfg.actions.settle_window(), Duration::from_millis(250));
        assert_eq!(cfg.actions.keystroke_delay_ms, 1);
        assert_eq!(cfg.agent.loop_window, 4);
        assert!(cfg.agent.dump_trees);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.browser.homepage = "https://example.com".to_string();
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.browser.homepage, "https://example.com");
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let cfg = Config::load_or_default(&paths).unwrap();
        assert_eq!(cfg.actions.step_delay_ms, 100);
    }

    #[test]
    fn test_overrides() {
        let mut cfg = Config::default();
        cfg.apply_overrides(Some("/data/profile".into()), Some("TRUE".into()));
        assert_eq!(cfg.browser.user_data_dir.as_deref(), Some("/data/profile"));
        assert!(cfg.browser.headless);

        cfg.apply_overrides(Some("  ".into()), Some("maybe".into()));
        assert_eq!(cfg.browser.user_data_dir.as_deref(), Some("/data/profile"));
        assert!(cfg.browser.headless);
    }
}
