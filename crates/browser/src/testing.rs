//! Scripted page, provider and notifier used by the unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use webnav_core::{ActionConfig, Error, MessageType, Result};

use crate::actions::ActionExecutor;
use crate::keys::KeyStroke;
use crate::mutation::MutationWatcher;
use crate::notify::{Notifier, ScreenshotSink};
use crate::page::{KeyEventKind, MouseEventKind, PageHandle, PageProvider};

type Handler = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;
type InputHook = Arc<dyn Fn(&PageCall) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    Script { script: String, args: Vec<Value> },
    Navigate(String),
    Key { kind: KeyEventKind, key: String, modifiers: u8 },
    InsertText(String),
    Mouse { kind: MouseEventKind, x: f64, y: f64 },
    Screenshot,
}

/// A page whose scripts answer from handlers keyed by the exact script text.
/// Unknown scripts evaluate to `null`.
#[derive(Default)]
pub struct FakePage {
    handlers: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<PageCall>>,
    ax_tree: Mutex<Value>,
    input_hook: Mutex<Option<InputHook>>,
    navigate_error: Mutex<Option<String>>,
    key_error: Mutex<Option<String>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, script: &str, value: Value) {
        self.on_fn(script, move |_| Ok(value.clone()));
    }

    pub fn on_fn<F>(&self, script: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(script.to_string(), Arc::new(f));
    }

    pub fn set_ax_tree(&self, tree: Value) {
        *self.ax_tree.lock().unwrap() = tree;
    }

    /// Called for every key, mouse and text input event after it is recorded.
    pub fn on_input<F>(&self, f: F)
    where
        F: Fn(&PageCall) + Send + Sync + 'static,
    {
        *self.input_hook.lock().unwrap() = Some(Arc::new(f));
    }

    pub fn fail_navigation(&self, message: &str) {
        *self.navigate_error.lock().unwrap() = Some(message.to_string());
    }

    /// Every key event fails with a browser error from now on.
    pub fn fail_keys(&self, message: &str) {
        *self.key_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn script_calls(&self, script: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PageCall::Script { script: s, .. } if s == script))
            .count()
    }

    /// Arguments of every call to `script`, in order.
    pub fn script_args(&self, script: &str) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::Script { script: s, args } if s == script => Some(args),
                _ => None,
            })
            .collect()
    }

    pub fn mouse_events(&self) -> Vec<MouseEventKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::Mouse { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    /// Key-down events as `key` strings, e.g. `["Control", "a", "Backspace"]`.
    pub fn keys_pressed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::Key { kind: KeyEventKind::Down, key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PageCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn record_input(&self, call: PageCall) {
        self.record(call.clone());
        let hook = self.input_hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(&call);
        }
    }

    fn run(&self, script: &str, args: &[Value]) -> Result<Value> {
        self.record(PageCall::Script {
            script: script.to_string(),
            args: args.to_vec(),
        });
        let handler = self.handlers.lock().unwrap().get(script).cloned();
        match handler {
            Some(handler) => handler(args),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.run(expression, &[])
    }

    async fn call_function(&self, declaration: &str, args: &[Value]) -> Result<Value> {
        self.run(declaration, args)
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(PageCall::Navigate(url.to_string()));
        match self.navigate_error.lock().unwrap().clone() {
            Some(message) => Err(Error::Browser(message)),
            None => Ok(()),
        }
    }

    async fn accessibility_tree(&self) -> Result<Value> {
        Ok(self.ax_tree.lock().unwrap().clone())
    }

    async fn key_event(&self, kind: KeyEventKind, stroke: &KeyStroke, modifiers: u8) -> Result<()> {
        self.record_input(PageCall::Key {
            kind,
            key: stroke.key.clone(),
            modifiers,
        });
        match self.key_error.lock().unwrap().clone() {
            Some(message) => Err(Error::Browser(message)),
            None => Ok(()),
        }
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        self.record_input(PageCall::InsertText(text.to_string()));
        Ok(())
    }

    async fn mouse_event(&self, kind: MouseEventKind, x: f64, y: f64) -> Result<()> {
        self.record_input(PageCall::Mouse { kind, x, y });
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.record(PageCall::Screenshot);
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

pub struct FakeProvider {
    page: Option<Arc<FakePage>>,
}

impl FakeProvider {
    pub fn with_page(page: Arc<FakePage>) -> Self {
        Self { page: Some(page) }
    }

    pub fn without_page() -> Self {
        Self { page: None }
    }
}

#[async_trait]
impl PageProvider for FakeProvider {
    async fn current_page(&self) -> Result<Arc<dyn PageHandle>> {
        match &self.page {
            Some(page) => Ok(page.clone() as Arc<dyn PageHandle>),
            None => Err(Error::NoActivePage("browser is not running".into())),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, MessageType)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, MessageType)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, message_type: MessageType) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), message_type));
    }
}

/// Records the label of every requested screenshot.
#[derive(Default)]
pub struct RecordingScreenshots {
    labels: Mutex<Vec<String>>,
}

impl RecordingScreenshots {
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScreenshotSink for RecordingScreenshots {
    async fn capture(&self, label: &str, _page: &dyn PageHandle) -> Result<()> {
        self.labels.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

/// Action timings short enough for unit tests.
pub fn fast_action_config() -> ActionConfig {
    ActionConfig {
        settle_window_ms: 10,
        locate_timeout_ms: 20,
        scroll_timeout_ms: 20,
        visible_timeout_ms: 5,
        keystroke_delay_ms: 0,
        step_delay_ms: 0,
        dom_ready_timeout_ms: 20,
    }
}

/// An executor bound to `page`, with its own watcher and a recording notifier.
pub fn test_executor(page: Arc<FakePage>) -> (ActionExecutor, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let executor = ActionExecutor::new(
        Arc::new(FakeProvider::with_page(page)),
        MutationWatcher::new(),
        fast_action_config(),
    )
    .with_notifier(notifier.clone());
    (executor, notifier)
}

pub fn executor_without_page() -> ActionExecutor {
    ActionExecutor::new(
        Arc::new(FakeProvider::without_page()),
        MutationWatcher::new(),
        fast_action_config(),
    )
}
