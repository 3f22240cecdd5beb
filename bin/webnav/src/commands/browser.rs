use std::sync::Arc;
use webnav_browser::{ActionExecutor, BrowserManager, FileScreenshotSink, MutationWatcher, TreeReconciler};
use webnav_core::{Config, Paths};

/// A started browser and the executor driving it.
pub struct BrowserSession {
    pub manager: Arc<BrowserManager>,
    pub executor: Arc<ActionExecutor>,
}

impl BrowserSession {
    pub async fn start(config: &Config, paths: &Paths, session: &str) -> anyhow::Result<Self> {
        let watcher = MutationWatcher::new();
        let manager = Arc::new(
            BrowserManager::new(config.browser.clone(), paths.clone(), watcher.clone())
                .with_session_name(session),
        );

        let mut executor = ActionExecutor::new(manager.clone(), watcher, config.actions.clone());
        if config.agent.take_screenshots {
            executor = executor.with_screenshots(Arc::new(FileScreenshotSink::new(paths.screenshots_dir())));
        }
        if config.agent.dump_trees {
            executor = executor.with_reconciler(TreeReconciler::with_dump_dir(paths.tree_dump_dir()));
        }

        manager.start().await?;
        Ok(Self {
            manager,
            executor: Arc::new(executor),
        })
    }

    pub async fn close(&self) {
        self.manager.close().await;
    }
}
