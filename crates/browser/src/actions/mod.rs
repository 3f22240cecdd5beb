//! Browser actions executed against the current page.
//!
//! Every element action follows the same shape: locate the element (polling
//! until `locate_timeout`), scroll it into view and wait for it to become
//! visible (both best-effort), perform the input, then keep a DOM change
//! subscription open for the settle window so that menus, tooltips and
//! validation messages triggered by the action can be reported back.

mod click;
mod dom;
mod enter_text;
mod enter_text_and_click;
mod hover;
mod navigation;
mod press_key;

pub use dom::DomContentType;
pub use enter_text::{BulkEntryResult, EnterTextEntry};
pub use press_key::press_combination;

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use webnav_core::{ActionConfig, MessageType, Result};

use crate::mutation::{describe_changes, DomChange, MutationWatcher};
use crate::notify::{capture_best_effort, LogNotifier, Notifier, ScreenshotSink};
use crate::page::{PageHandle, PageProvider};
use crate::reconcile::TreeReconciler;

/// Text that marks a response as having changed the page. Later actions in the
/// same batch must not run against the stale tree.
pub const PAGE_CHANGE_MARKER: &str = "As a consequence of this action";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Attributes copied into the opening tag shown for an element.
const OUTER_HTML_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "aria-label",
    "placeholder",
    "href",
    "src",
    "aria-autocomplete",
    "role",
    "type",
    "data-testid",
    "value",
    "selected",
    "aria-labelledby",
    "aria-describedby",
    "aria-haspopup",
];

pub(crate) const LOCATE_SCRIPT: &str = r#"(selector, attributes) => {
    const element = document.querySelector(selector);
    if (!element) {
        return null;
    }
    const tag = element.tagName.toLowerCase();
    let openingTag = '<' + tag;
    for (const attr of attributes) {
        const value = element.getAttribute(attr);
        if (value) {
            openingTag += ' ' + attr + '="' + value + '"';
        }
    }
    return {tag: tag, opening_tag: openingTag + '>'};
}"#;

pub(crate) const SCROLL_SCRIPT: &str = r#"(selector) => {
    const element = document.querySelector(selector);
    if (!element) {
        return false;
    }
    if (element.scrollIntoViewIfNeeded) {
        element.scrollIntoViewIfNeeded(true);
    } else {
        element.scrollIntoView({block: 'center', inline: 'center'});
    }
    return true;
}"#;

pub(crate) const VISIBLE_SCRIPT: &str = r#"(selector) => {
    const element = document.querySelector(selector);
    if (!element) {
        return false;
    }
    const style = window.getComputedStyle(element);
    const rect = element.getBoundingClientRect();
    return style.visibility !== 'hidden' && style.display !== 'none' && rect.width > 0 && rect.height > 0;
}"#;

pub(crate) const ELEMENT_BOX_SCRIPT: &str = r#"(selector, retargetLinks) => {
    const element = document.querySelector(selector);
    if (!element) {
        return null;
    }
    if (retargetLinks && element.tagName.toLowerCase() === 'a') {
        element.target = '_self';
    }
    const rect = element.getBoundingClientRect();
    return {
        x: rect.left + rect.width / 2,
        y: rect.top + rect.height / 2,
        width: rect.width,
        height: rect.height
    };
}"#;

/// Result of a single primitive. `summary` is what the user is told,
/// `detailed` is what the caller gets back.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub succeeded: bool,
    pub summary: String,
    pub detailed: String,
}

impl ActionOutcome {
    pub(crate) fn success(summary: impl Into<String>, detailed: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            summary: summary.into(),
            detailed: detailed.into(),
        }
    }

    pub(crate) fn failure(summary: impl Into<String>, detailed: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            summary: summary.into(),
            detailed: detailed.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LocatedElement {
    pub tag: String,
    pub opening_tag: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct ElementBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementBox {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Runs browser actions against whatever page the provider hands out.
pub struct ActionExecutor {
    provider: Arc<dyn PageProvider>,
    watcher: MutationWatcher,
    notifier: Arc<dyn Notifier>,
    screenshots: Option<Arc<dyn ScreenshotSink>>,
    settings: ActionConfig,
    reconciler: TreeReconciler,
}

impl ActionExecutor {
    pub fn new(provider: Arc<dyn PageProvider>, watcher: MutationWatcher, settings: ActionConfig) -> Self {
        Self {
            provider,
            watcher,
            notifier: Arc::new(LogNotifier),
            screenshots: None,
            settings,
            reconciler: TreeReconciler::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_screenshots(mut self, sink: Arc<dyn ScreenshotSink>) -> Self {
        self.screenshots = Some(sink);
        self
    }

    pub fn with_reconciler(mut self, reconciler: TreeReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn settings(&self) -> &ActionConfig {
        &self.settings
    }

    pub fn watcher(&self) -> &MutationWatcher {
        &self.watcher
    }

    async fn page(&self) -> Result<Arc<dyn PageHandle>> {
        self.provider.current_page().await
    }

    async fn notify(&self, message: &str, message_type: MessageType) {
        self.notifier.notify(message, message_type).await;
    }

    async fn capture(&self, label: &str, page: &dyn PageHandle) {
        capture_best_effort(self.screenshots.as_deref(), label, page).await;
    }

    /// Single lookup. Page errors (an invalid selector, for one) propagate.
    pub(crate) async fn query(&self, page: &dyn PageHandle, selector: &str) -> Result<Option<LocatedElement>> {
        let value = page
            .call_function(LOCATE_SCRIPT, &[json!(selector), json!(OUTER_HTML_ATTRIBUTES)])
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Poll for the element until it is attached or `locate_timeout` passes.
    pub(crate) async fn locate(&self, page: &dyn PageHandle, selector: &str) -> Result<Option<LocatedElement>> {
        let deadline = tokio::time::Instant::now() + self.settings.locate_timeout();
        loop {
            if let Some(element) = self.query(page, selector).await? {
                return Ok(Some(element));
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(selector, "Element not attached before timeout");
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub(crate) async fn scroll_into_view(&self, page: &dyn PageHandle, selector: &str) {
        let args = [json!(selector)];
        let scroll = page.call_function(SCROLL_SCRIPT, &args);
        match tokio::time::timeout(self.settings.scroll_timeout(), scroll).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(selector, error = %e, "Scroll into view failed"),
            Err(_) => debug!(selector, "Scroll into view timed out"),
        }
    }

    pub(crate) async fn wait_visible(&self, page: &dyn PageHandle, selector: &str) {
        let poll = async {
            loop {
                match page.call_function(VISIBLE_SCRIPT, &[json!(selector)]).await {
                    Ok(visible) if visible.as_bool() == Some(true) => return,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(selector, error = %e, "Visibility check failed");
                        return;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        if tokio::time::timeout(self.settings.visible_timeout(), poll).await.is_err() {
            debug!(selector, "Element not visible before timeout, continuing");
        }
    }

    pub(crate) async fn element_box(
        &self,
        page: &dyn PageHandle,
        selector: &str,
        retarget_links: bool,
    ) -> Result<Option<ElementBox>> {
        let value = page
            .call_function(ELEMENT_BOX_SCRIPT, &[json!(selector), json!(retarget_links)])
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// Collect changes that arrived during the action and the settle window.
pub(crate) async fn settle_changes(subscription: crate::mutation::Subscription, window: Duration) -> Option<String> {
    let changes: Vec<DomChange> = subscription.settle(window).await;
    if changes.is_empty() {
        return None;
    }
    let described = describe_changes(&changes);
    if described.is_empty() {
        warn!("DOM changes detected but could not be described");
        return None;
    }
    Some(described)
}
