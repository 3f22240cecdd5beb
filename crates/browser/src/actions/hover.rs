use tracing::{info, warn};
use webnav_core::{Error, MessageType, Result};

use super::{settle_changes, ActionExecutor};
use crate::page::{MouseEventKind, PageHandle};

impl ActionExecutor {
    /// Move the mouse over the element, reporting anything that pops up.
    pub async fn hover(&self, selector: &str) -> Result<String> {
        info!(selector, "Hovering over element");
        let page = self.page().await?;
        self.capture("hover_start", page.as_ref()).await;

        let subscription = self.watcher.subscribe();
        let hovered = self.move_to(page.as_ref(), selector).await;
        let changes = settle_changes(subscription, self.settings.settle_window()).await;
        self.capture("hover_end", page.as_ref()).await;

        let message = match (hovered, changes) {
            (Err(e), _) => {
                warn!(selector, error = %e, "Unable to hover");
                format!(
                    "Unable to hover on element with selector: \"{}\". Proceed by retrieving DOM again. Error: {}",
                    selector, e
                )
            }
            (Ok(()), Some(changes)) => format!(
                "Hovered on element {} successfully.\n As a consequence of this action, new elements have appeared in view: {}. This could be a drop down or a tooltip.",
                selector, changes
            ),
            (Ok(()), None) => format!(
                "Hovered on element {} successfully. No changes were observed in the DOM",
                selector
            ),
        };
        self.notify(&format!("Hovered on element {}", selector), MessageType::Action)
            .await;
        Ok(message)
    }

    async fn move_to(&self, page: &dyn PageHandle, selector: &str) -> Result<()> {
        self.locate(page, selector)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Element with selector {} not found", selector)))?;
        self.scroll_into_view(page, selector).await;
        self.wait_visible(page, selector).await;

        let bounds = self
            .element_box(page, selector, false)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Element with selector {} not found", selector)))?;
        page.mouse_event(MouseEventKind::Moved, bounds.x, bounds.y).await
    }
}
