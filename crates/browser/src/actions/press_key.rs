use tracing::{info, warn};
use webnav_core::{MessageType, Result};

use super::{settle_changes, ActionExecutor};
use crate::keys::KeyCombination;
use crate::page::{KeyEventKind, PageHandle};

/// Hold the modifiers in order, press and release the last key, then release
/// the modifiers in reverse order.
pub async fn press_combination(page: &dyn PageHandle, combination: &KeyCombination) -> Result<()> {
    let mut modifiers = 0u8;
    for held in &combination.held {
        modifiers |= held.modifier_bit();
        page.key_event(KeyEventKind::Down, held, modifiers).await?;
    }

    page.key_event(KeyEventKind::Down, &combination.key, modifiers).await?;
    page.key_event(KeyEventKind::Up, &combination.key, modifiers).await?;

    for held in combination.held.iter().rev() {
        modifiers &= !held.modifier_bit();
        page.key_event(KeyEventKind::Up, held, modifiers).await?;
    }
    Ok(())
}

impl ActionExecutor {
    /// Press a combination such as `Enter`, `Control+A` or `Shift+Tab` on the
    /// focused element.
    pub async fn press_key_combination(&self, keys: &str) -> Result<String> {
        info!(keys, "Pressing key combination");
        let combination = KeyCombination::parse(keys)?;
        let page = self.page().await?;
        self.capture("press_key_combination_start", page.as_ref()).await;

        let subscription = self.watcher.subscribe();
        let pressed = press_combination(page.as_ref(), &combination).await;
        let changes = settle_changes(subscription, self.settings.settle_window()).await;
        self.capture("press_key_combination_end", page.as_ref()).await;

        if let Err(e) = pressed {
            warn!(keys, error = %e, "Unable to press key combination");
            let message = format!("Unable to press key combination {}. Error: {}", keys, e);
            self.notify(&message, MessageType::Action).await;
            return Ok(message);
        }

        if let Some(changes) = changes {
            return Ok(format!(
                "Key {} executed successfully.\n As a consequence of this action, new elements have appeared in view:{}. This means that the action is not yet executed and needs further interaction. Get all_fields DOM to complete the interaction.",
                keys, changes
            ));
        }

        self.notify(&format!("Key {} executed successfully", keys), MessageType::Action)
            .await;
        Ok(format!("Key {} executed successfully", keys))
    }
}
