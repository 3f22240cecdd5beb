//! DOM mutation watcher.
//!
//! A `MutationObserver` installed in the page reports added content through a
//! DevTools binding. The session pumps `Runtime.bindingCalled` payloads into
//! [`MutationWatcher::handle_binding_payload`], which fans the parsed changes
//! out to every live [`Subscription`].

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webnav_core::Result;

use crate::page::PageHandle;

/// Name of the page binding the observer reports through.
pub const DOM_CHANGE_BINDING: &str = "webnavDomChanged";

/// Id of the notification overlay. Its subtree never counts as a page change.
pub const OVERLAY_ELEMENT_ID: &str = "webnav-overlay";

pub(crate) const OBSERVER_SCRIPT: &str = r#"(binding, overlayId) => {
    if (window.__webnavObserverAttached) {
        return false;
    }
    window.__webnavObserverAttached = true;
    const skipped = ['SCRIPT', 'NOSCRIPT', 'STYLE'];
    const inOverlay = (element) => !!(element.closest && element.closest('#' + overlayId));
    new MutationObserver((mutations) => {
        const changes = [];
        for (const mutation of mutations) {
            if (mutation.type === 'childList') {
                for (const node of mutation.addedNodes) {
                    if (!node.tagName || skipped.includes(node.tagName) || inOverlay(node)) {
                        continue;
                    }
                    const content = (node.innerText || '').trim();
                    if (content) {
                        changes.push({tag: node.tagName, content: content});
                    }
                }
            } else if (mutation.type === 'characterData') {
                const parent = mutation.target.parentNode;
                if (!parent || !parent.tagName || skipped.includes(parent.tagName) || inOverlay(parent)) {
                    continue;
                }
                const content = (mutation.target.data || '').trim();
                if (!content || window.getComputedStyle(parent).display === 'none') {
                    continue;
                }
                if (!changes.some(change => change.content.includes(content))) {
                    changes.push({tag: parent.tagName, content: content});
                }
            }
        }
        if (changes.length > 0 && typeof window[binding] === 'function') {
            window[binding](JSON.stringify(changes));
        }
    }).observe(document, {subtree: true, childList: true, characterData: true});
    return true;
}"#;

/// Content that appeared in the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomChange {
    pub tag: String,
    pub content: String,
}

struct WatcherInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, mpsc::UnboundedSender<Vec<DomChange>>)>>,
}

/// Host side of the mutation bridge. Cheap to clone; clones share subscribers.
#[derive(Clone)]
pub struct MutationWatcher {
    inner: Arc<WatcherInner>,
}

impl Default for MutationWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start collecting changes. Collection stops when the subscription is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_subscribers().push((id, tx));
        debug!(subscription = id, "DOM change subscription added");
        Subscription {
            id,
            watcher: self.inner.clone(),
            rx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Deliver a batch to every current subscriber. Empty batches are ignored.
    pub fn publish(&self, changes: Vec<DomChange>) {
        if changes.is_empty() {
            return;
        }
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|(_, tx)| tx.send(changes.clone()).is_ok());
    }

    /// Parse a binding payload (a JSON array of `{tag, content}`) and publish
    /// it. Returns the number of changes delivered.
    pub fn handle_binding_payload(&self, payload: &str) -> Result<usize> {
        let cleaned: String = payload.chars().filter(|c| *c != '\t' && *c != '\n').collect();
        let changes: Vec<DomChange> = serde_json::from_str(&cleaned)?;
        let count = changes.len();
        if count > 0 {
            debug!(count, "DOM changes detected");
        }
        self.publish(changes);
        Ok(count)
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(u64, mpsc::UnboundedSender<Vec<DomChange>>)>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live registration for DOM changes.
pub struct Subscription {
    id: u64,
    watcher: Arc<WatcherInner>,
    rx: mpsc::UnboundedReceiver<Vec<DomChange>>,
}

impl Subscription {
    /// Everything received so far.
    pub fn drain(&mut self) -> Vec<DomChange> {
        let mut changes = Vec::new();
        while let Ok(batch) = self.rx.try_recv() {
            changes.extend(batch);
        }
        changes
    }

    /// Wait `window` for late changes, then unsubscribe and return all of them.
    pub async fn settle(mut self, window: Duration) -> Vec<DomChange> {
        tokio::time::sleep(window).await;
        let changes = self.drain();
        self.unsubscribe();
        changes
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.watcher
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
        debug!(subscription = self.id, "DOM change subscription removed");
    }
}

/// Install the observer in the current document. Returns `false` when this
/// document already has one.
pub async fn attach_observer(page: &dyn PageHandle) -> Result<bool> {
    let attached = page
        .call_function(OBSERVER_SCRIPT, &[json!(DOM_CHANGE_BINDING), json!(OVERLAY_ELEMENT_ID)])
        .await?;
    let attached = attached.as_bool().unwrap_or(false);
    if attached {
        debug!("DOM mutation observer attached");
    }
    Ok(attached)
}

/// Describe changes for the caller: a compact JSON array of `{tag, content}`.
pub fn describe_changes(changes: &[DomChange]) -> String {
    serde_json::to_string(changes).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize DOM changes");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;

    fn change(tag: &str, content: &str) -> DomChange {
        DomChange {
            tag: tag.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_single_change_delivered() {
        let watcher = MutationWatcher::new();
        let sub = watcher.subscribe();

        let delivered = watcher
            .handle_binding_payload("[{\"tag\": \"UL\", \"content\": \"Small\n\tMedium\"}]")
            .unwrap();
        assert_eq!(delivered, 1);

        let changes = sub.settle(Duration::from_millis(5)).await;
        assert_eq!(changes, vec![change("UL", "SmallMedium")]);
        assert_eq!(watcher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_no_changes() {
        let watcher = MutationWatcher::new();
        let sub = watcher.subscribe();
        assert_eq!(watcher.handle_binding_payload("[]").unwrap(), 0);
        assert!(sub.settle(Duration::from_millis(1)).await.is_empty());
    }

    #[test]
    fn test_fan_out_to_all_subscribers() {
        let watcher = MutationWatcher::new();
        let mut a = watcher.subscribe();
        let mut b = watcher.subscribe();
        watcher.publish(vec![change("DIV", "Added to cart")]);
        assert_eq!(a.drain().len(), 1);
        assert_eq!(b.drain().len(), 1);
    }

    #[test]
    fn test_dropped_subscription_stops_receiving() {
        let watcher = MutationWatcher::new();
        let sub = watcher.subscribe();
        let mut other = watcher.subscribe();
        assert_eq!(watcher.subscriber_count(), 2);

        drop(sub);
        assert_eq!(watcher.subscriber_count(), 1);

        watcher.publish(vec![change("SPAN", "tooltip")]);
        assert_eq!(other.drain(), vec![change("SPAN", "tooltip")]);

        other.unsubscribe();
        assert_eq!(watcher.subscriber_count(), 0);
    }

    #[test]
    fn test_changes_before_subscribe_are_not_seen() {
        let watcher = MutationWatcher::new();
        watcher.publish(vec![change("P", "early")]);
        let mut sub = watcher.subscribe();
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_malformed_payload() {
        let watcher = MutationWatcher::new();
        assert!(watcher.handle_binding_payload("not json").is_err());
    }

    #[test]
    fn test_describe_changes() {
        let text = describe_changes(&[change("LI", "Option A")]);
        assert_eq!(text, r#"[{"tag":"LI","content":"Option A"}]"#);
    }

    #[tokio::test]
    async fn test_attach_observer() {
        let page = FakePage::new();
        page.on(OBSERVER_SCRIPT, serde_json::json!(true));
        assert!(attach_observer(&page).await.unwrap());

        let args = page.script_args(OBSERVER_SCRIPT);
        assert_eq!(args[0], vec![json!(DOM_CHANGE_BINDING), json!(OVERLAY_ELEMENT_ID)]);
    }
}
