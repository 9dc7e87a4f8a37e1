use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use pairchat_shared::models::Message;
use pairchat_shared::validation::normalize_user_key;

use crate::ws::events::ReactionAction;

type ReactionMap = BTreeMap<String, BTreeSet<String>>;

/// Reactions and read receipts. Held only in process memory and reset on
/// restart; the store never sees them.
#[derive(Default)]
pub struct EphemeralState {
    reactions: RwLock<HashMap<String, ReactionMap>>,
    read_by: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl EphemeralState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the actor's membership actually changed.
    pub async fn apply_reaction(
        &self,
        message_id: &str,
        emoji: &str,
        actor: &str,
        action: ReactionAction,
    ) -> bool {
        let actor = normalize_user_key(actor);
        let emoji = emoji.trim();
        let mut reactions = self.reactions.write().await;

        match action {
            ReactionAction::Add => reactions
                .entry(message_id.to_string())
                .or_default()
                .entry(emoji.to_string())
                .or_default()
                .insert(actor),
            ReactionAction::Remove => {
                let Some(per_message) = reactions.get_mut(message_id) else {
                    return false;
                };
                let removed = per_message
                    .get_mut(emoji)
                    .map(|actors| actors.remove(&actor))
                    .unwrap_or(false);
                per_message.retain(|_, actors| !actors.is_empty());
                if per_message.is_empty() {
                    reactions.remove(message_id);
                }
                removed
            }
        }
    }

    /// Adds the reader; returns the full reader set only if the reader is new.
    pub async fn mark_read(&self, message_id: &str, reader: &str) -> Option<Vec<String>> {
        let mut read_by = self.read_by.write().await;
        let readers = read_by.entry(message_id.to_string()).or_default();
        if readers.insert(normalize_user_key(reader)) {
            Some(readers.iter().cloned().collect())
        } else {
            None
        }
    }

    pub async fn forget(&self, message_id: &str) {
        self.reactions.write().await.remove(message_id);
        self.read_by.write().await.remove(message_id);
    }

    /// Copy current reactions and receipts onto messages read from the store.
    pub async fn decorate(&self, messages: &mut [Message]) {
        let reactions = self.reactions.read().await;
        let read_by = self.read_by.read().await;
        for msg in messages.iter_mut() {
            if let Some(r) = reactions.get(&msg.id) {
                msg.reactions = r.clone();
            }
            if let Some(r) = read_by.get(&msg.id) {
                msg.read_by = r.clone();
            }
        }
    }
}
