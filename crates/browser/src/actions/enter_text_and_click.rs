use std::time::Duration;
use tracing::info;
use webnav_core::{MessageType, Result};

use super::press_key::press_combination;
use super::{settle_changes, ActionExecutor, ActionOutcome};
use crate::keys::KeyCombination;
use crate::page::PageHandle;

impl ActionExecutor {
    /// Type into one element, then click another. When both selectors name
    /// the same element the text is submitted with `Enter` instead.
    ///
    /// Stops before clicking if typing failed or made new content appear.
    pub async fn enter_text_and_click(
        &self,
        text_selector: &str,
        text: &str,
        click_selector: &str,
        wait_before_click: Duration,
    ) -> Result<String> {
        info!(text_selector, click_selector, "Entering text and clicking");
        let page = self.page().await?;

        let subscription = self.watcher.subscribe();
        let entry = self.do_enter_text(page.as_ref(), text_selector, text).await;
        self.notify(&entry.summary, MessageType::Action).await;
        if !entry.succeeded {
            return Ok(format!(
                "Failed to enter text '{}' into element with selector '{}'. Check that the selector is valid.",
                text, text_selector
            ));
        }
        if let Some(changes) = settle_changes(subscription, self.settings.settle_window()).await {
            return Ok(format!(
                "{}. \n As a consequence of this action, new elements have appeared in view: {}. Get all_fields DOM to interact with it. Note that I have not clicked on the element you suggested. Use the click tool to initiate a click.",
                entry.summary, changes
            ));
        }

        let subscription = self.watcher.subscribe();
        let click = if text_selector == click_selector {
            self.submit_with_enter(page.as_ref()).await
        } else {
            self.do_click(page.as_ref(), click_selector, wait_before_click).await
        };
        let changes = settle_changes(subscription, self.settings.settle_window()).await;
        self.notify(&click.summary, MessageType::Action).await;

        if let Some(changes) = changes {
            return Ok(format!(
                "{}. {}.\n As a consequence of this action, new elements have appeared in view: {}. Get all_fields DOM to interact with it.",
                entry.summary, click.summary, changes
            ));
        }
        Ok(format!("{}. {}", entry.summary, click.detailed))
    }

    async fn submit_with_enter(&self, page: &dyn PageHandle) -> ActionOutcome {
        let pressed = match KeyCombination::parse("Enter") {
            Ok(enter) => press_combination(page, &enter).await,
            Err(e) => Err(e),
        };
        match pressed {
            Ok(()) => {
                let message = "Key Enter executed successfully";
                ActionOutcome::success(message, message)
            }
            Err(e) => {
                let message = format!("Unable to press Enter. Error: {}", e);
                ActionOutcome::failure(message.clone(), message)
            }
        }
    }
}
