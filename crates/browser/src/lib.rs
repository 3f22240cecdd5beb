pub mod actions;
pub mod cdp;
pub mod identifiers;
pub mod keys;
pub mod mutation;
pub mod notify;
pub mod page;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{ActionExecutor, ActionOutcome, DomContentType, EnterTextEntry, PAGE_CHANGE_MARKER};
pub use mutation::{DomChange, MutationWatcher, Subscription};
pub use notify::{FileScreenshotSink, LogNotifier, Notifier, ScreenshotSink};
pub use page::{CdpPage, PageHandle, PageProvider};
pub use reconcile::{Node, TreeReconciler};
pub use session::BrowserManager;
pub use tools::registry::ToolRegistry;
pub use tools::{Tool, ToolContext, ToolSchema};
