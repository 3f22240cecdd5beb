//! Browser session management.
//!
//! A single Chrome process (launched here, or an existing one reached through
//! its remote debugging endpoint) with one CDP connection to its first page
//! target. The session wires the DOM change binding into the
//! [`MutationWatcher`] and re-installs the page observer on every
//! `DOMContentLoaded`.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webnav_core::{BrowserConfig, Error, Paths, Result};

use crate::cdp::CdpClient;
use crate::mutation::{attach_observer, MutationWatcher, DOM_CHANGE_BINDING};
use crate::page::{cdp_err, CdpPage, PageHandle, PageProvider};

const DOMAINS: &[&str] = &["Page", "Runtime", "DOM", "Network", "Accessibility"];

struct ActiveBrowser {
    /// `None` when attached to a browser we did not launch.
    process: Option<Child>,
    cdp: Arc<CdpClient>,
    page: Arc<CdpPage>,
    listeners: Vec<JoinHandle<()>>,
}

/// Owns the browser for the lifetime of the process.
pub struct BrowserManager {
    config: BrowserConfig,
    paths: Paths,
    session_name: String,
    watcher: MutationWatcher,
    active: Mutex<Option<ActiveBrowser>>,
}

impl BrowserManager {
    pub fn new(config: BrowserConfig, paths: Paths, watcher: MutationWatcher) -> Self {
        Self {
            config,
            paths,
            session_name: "default".to_string(),
            watcher,
            active: Mutex::new(None),
        }
    }

    /// Use a named profile directory under the sessions folder.
    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    pub fn watcher(&self) -> &MutationWatcher {
        &self.watcher
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Launch (or attach to) the browser and open the homepage. No-op when
    /// already running.
    pub async fn start(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Ok(());
        }

        let (process, page_ws_url) = match &self.config.remote_debugging_url {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "Attaching to running browser");
                (None, get_page_ws_url(endpoint).await.map_err(Error::Browser)?)
            }
            None => {
                let (child, port) = self.launch().await?;
                let endpoint = format!("http://127.0.0.1:{}", port);
                wait_for_cdp_ready(&endpoint, self.config.launch_timeout_secs)
                    .await
                    .map_err(Error::Browser)?;
                (Some(child), get_page_ws_url(&endpoint).await.map_err(Error::Browser)?)
            }
        };

        let cdp = Arc::new(CdpClient::connect(&page_ws_url).await.map_err(cdp_err)?);
        for domain in DOMAINS {
            cdp.enable_domain(domain).await.map_err(cdp_err)?;
        }
        cdp.add_binding(DOM_CHANGE_BINDING).await.map_err(cdp_err)?;
        info!(ws_url = %page_ws_url, "CDP connection established (page target)");

        let page = Arc::new(CdpPage::new(cdp.clone()));
        let listeners = self.spawn_listeners(&cdp, &page).await;

        if let Err(e) = page.navigate(&self.config.homepage).await {
            warn!(url = %self.config.homepage, error = %e, "Failed to open homepage");
        }
        if let Err(e) = attach_observer(page.as_ref()).await {
            debug!(error = %e, "Observer not attached yet, waiting for DOMContentLoaded");
        }

        *active = Some(ActiveBrowser {
            process,
            cdp,
            page,
            listeners,
        });
        Ok(())
    }

    async fn launch(&self) -> Result<(Child, u16)> {
        let binary = match &self.config.executable_path {
            Some(path) => path.clone(),
            None => find_chrome_binary()
                .ok_or_else(|| Error::Browser("Chrome not found. Please install it.".to_string()))?,
        };

        let user_data_dir = match &self.config.user_data_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.paths.session_profile(&self.session_name),
        };
        std::fs::create_dir_all(&user_data_dir)?;

        let port = find_free_port().await?;
        let args = build_browser_args(&self.config, port, &user_data_dir);

        info!(
            session = %self.session_name,
            port,
            headless = self.config.headless,
            "Launching browser for session"
        );

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch {}: {}", binary, e)))?;
        Ok((child, port))
    }

    /// Pump binding calls into the watcher and re-attach the observer after
    /// every document load.
    async fn spawn_listeners(&self, cdp: &CdpClient, page: &Arc<CdpPage>) -> Vec<JoinHandle<()>> {
        let mut bindings = cdp.subscribe_event("Runtime.bindingCalled").await;
        let watcher = self.watcher.clone();
        let binding_task = tokio::spawn(async move {
            while let Some(params) = bindings.recv().await {
                if params.get("name").and_then(|v| v.as_str()) != Some(DOM_CHANGE_BINDING) {
                    continue;
                }
                let payload = params.get("payload").and_then(|v| v.as_str()).unwrap_or("[]");
                if let Err(e) = watcher.handle_binding_payload(payload) {
                    warn!(error = %e, "Ignoring malformed DOM change payload");
                }
            }
        });

        let mut loads = cdp.subscribe_event("Page.domContentEventFired").await;
        let page = page.clone();
        let load_task = tokio::spawn(async move {
            while loads.recv().await.is_some() {
                match attach_observer(page.as_ref()).await {
                    Ok(true) => debug!("Observer attached after DOMContentLoaded"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Failed to attach DOM observer"),
                }
            }
        });

        vec![binding_task, load_task]
    }

    /// Close the browser. Attached browsers are only disconnected.
    pub async fn close(&self) {
        let Some(mut active) = self.active.lock().await.take() else {
            return;
        };
        for task in &active.listeners {
            task.abort();
        }
        if let Some(process) = active.process.as_mut() {
            if let Err(e) = active.cdp.close_browser().await {
                debug!("CDP Browser.close failed (may already be closed): {}", e);
            }
            let _ = process.kill().await;
        }
        info!(session = %self.session_name, "Browser closed");
    }
}

#[async_trait]
impl PageProvider for BrowserManager {
    async fn current_page(&self) -> Result<Arc<dyn PageHandle>> {
        match self.active.lock().await.as_ref() {
            Some(active) => Ok(active.page.clone() as Arc<dyn PageHandle>),
            None => Err(Error::NoActivePage(
                "Browser is not running. Open a URL to start it.".to_string(),
            )),
        }
    }
}

impl Drop for ActiveBrowser {
    fn drop(&mut self) {
        for task in &self.listeners {
            task.abort();
        }
        if let Some(process) = self.process.as_mut() {
            let _ = process.start_kill();
        }
    }
}

fn build_browser_args(config: &BrowserConfig, debug_port: u16, user_data_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--safebrowsing-disable-auto-update".to_string(),
        "--password-store=basic".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-session-crashed-bubble".to_string(),
        "--disable-infobars".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.push(format!("--window-size={},{}", config.window_width, config.window_height));
    args.push("about:blank".to_string());
    args
}

/// Find a Chrome or Chromium binary on this machine.
pub fn find_chrome_binary() -> Option<String> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll `/json/version` until the endpoint answers, up to `timeout_secs`.
async fn wait_for_cdp_ready(endpoint: &str, timeout_secs: u64) -> std::result::Result<String, String> {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let url = format!("{}/json/version", endpoint.trim_end_matches('/'));

    loop {
        if start.elapsed() > timeout {
            return Err(format!("Chrome CDP not ready after {}s at {}", timeout_secs, endpoint));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// WebSocket URL of the first page target listed at `endpoint`. Retries a few
/// times since the page target may not appear immediately.
async fn get_page_ws_url(endpoint: &str) -> std::result::Result<String, String> {
    let url = format!("{}/json/list", endpoint.trim_end_matches('/'));

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };
        if let Some(ws_url) = first_page_target(&targets) {
            return Ok(ws_url);
        }
    }

    Err(format!("No page target found at {} after retries", endpoint))
}

fn first_page_target(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .find_map(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_browser_args() {
        let mut config = BrowserConfig::default();
        config.headless = true;
        config.window_width = 1440;
        config.window_height = 900;

        let args = build_browser_args(&config, 9333, Path::new("/tmp/profile"));

        assert_eq!(args[0], "--remote-debugging-port=9333");
        assert_eq!(args[1], "--user-data-dir=/tmp/profile");
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--window-size=1440,900".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("about:blank"));

        config.headless = false;
        let args = build_browser_args(&config, 9333, Path::new("/tmp/profile"));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn test_first_page_target() {
        let targets = vec![
            json!({"type": "service_worker", "webSocketDebuggerUrl": "ws://sw"}),
            json!({"type": "page", "webSocketDebuggerUrl": "ws://page/1"}),
            json!({"type": "page", "webSocketDebuggerUrl": "ws://page/2"}),
        ];
        assert_eq!(first_page_target(&targets).as_deref(), Some("ws://page/1"));
        assert!(first_page_target(&[]).is_none());
    }

    #[tokio::test]
    async fn test_find_free_port() {
        let port = find_free_port().await.unwrap();
        assert!(port > 0);
    }

    #[tokio::test]
    async fn test_no_page_before_start() {
        let manager = BrowserManager::new(
            BrowserConfig::default(),
            Paths::with_base(std::env::temp_dir().join("webnav-test")),
            MutationWatcher::new(),
        );
        assert!(!manager.is_running().await);
        let err = manager.current_page().await.err().unwrap();
        assert!(err.is_structural());

        manager.close().await;
    }
}
