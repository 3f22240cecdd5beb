use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use webnav_core::{Error, MessageType, Result};

use super::dom::wait_for_non_loading_dom_state;
use super::ActionExecutor;

pub(crate) const LOCATION_SCRIPT: &str = "() => ({url: window.location.href, title: document.title})";

const MAX_URL_CHARS: usize = 250;

#[derive(Debug, Deserialize)]
struct Location {
    url: String,
    #[serde(default)]
    title: String,
}

impl ActionExecutor {
    /// Navigate the current page. Navigation errors and timeouts are only
    /// logged; the result reports wherever the page ended up.
    pub async fn open_url(&self, url: &str, timeout: Duration) -> Result<String> {
        let url = normalize_url(url);
        info!(url = %url, "Opening URL");
        let page = self.page().await?;

        match tokio::time::timeout(timeout, page.navigate(&url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(url = %url, error = %e, "Initial navigation failed, continuing"),
            Err(_) => warn!(url = %url, "Navigation timed out, continuing"),
        }
        wait_for_non_loading_dom_state(page.as_ref(), self.settings.dom_ready_timeout()).await;

        let current = match self.location(page.as_ref()).await {
            Ok(location) => location.url,
            Err(e) => {
                warn!(error = %e, "Could not read page location after navigation");
                url.clone()
            }
        };
        self.notify(&format!("Opened URL: {}", url), MessageType::Action)
            .await;
        Ok(format!("Page loaded: {}", strip_query(&current)))
    }

    /// Current address (shortened to 250 characters) and title.
    pub async fn get_url(&self) -> Result<String> {
        let page = self.page().await?;
        wait_for_non_loading_dom_state(page.as_ref(), self.settings.dom_ready_timeout()).await;
        let location = self.location(page.as_ref()).await?;
        let url = if location.url.chars().count() > MAX_URL_CHARS {
            let head: String = location.url.chars().take(MAX_URL_CHARS).collect();
            format!("{}...", head)
        } else {
            location.url
        };
        Ok(format!("Current Page: {}, Title: {}", url, location.title))
    }

    /// Sleep for `seconds`.
    pub async fn wait(&self, seconds: f64) -> Result<String> {
        if seconds < 0.0 {
            return Err(Error::Validation("Duration cannot be negative.".to_string()));
        }
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|e| Error::Validation(format!("Duration {} is out of range: {}", seconds, e)))?;
        info!(seconds, "Waiting");
        tokio::time::sleep(duration).await;
        let unit = if seconds == 1.0 { "second" } else { "seconds" };
        Ok(format!("Waited for {} {}.", seconds, unit))
    }

    async fn location(&self, page: &dyn crate::page::PageHandle) -> Result<Location> {
        let value = page.call_function(LOCATION_SCRIPT, &[]).await?;
        if value.is_null() {
            return Err(Error::Browser("Page location is unavailable".to_string()));
        }
        Ok(serde_json::from_value::<Location>(value)?)
    }
}

/// Add `https://` when the address has no scheme.
fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Ok(_) => raw.to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => format!("https://{}", raw),
        Err(_) => raw.to_string(),
    }
}

fn strip_query(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => raw.split('?').next().unwrap_or(raw).to_string(),
    }
}
