//! Client Delivery State Machine: one ordered list of messages plus the
//! presence/typing/status bits the UI renders around it.

use std::collections::{BTreeSet, HashMap};

use chrono::{SubsecRound, Utc};
use pairchat_shared::constants::TEMP_ID_PREFIX;
use pairchat_shared::events::{ClientEvent, ConnectionId, ReactionAction, ServerEvent};
use pairchat_shared::models::{Attachment, Message};
use pairchat_shared::validation::{identity_eq, normalize_user_key, validate_message_parts, ValidationError};
use tracing::{debug, warn};

use crate::reconcile::find_optimistic_match;

/// A staged send: the optimistic copy is already in the list, `event` still
/// has to go out on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub temp_id: String,
    pub event: ClientEvent,
}

#[derive(Debug, Clone)]
pub struct ChatState {
    display_name: String,
    user_id: String,
    messages: Vec<Message>,
    /// temp id -> reason, for optimistic copies the relay refused.
    failed: HashMap<String, String>,
    typing: BTreeSet<String>,
    online: BTreeSet<String>,
    welcome_text: Option<String>,
    connection_id: Option<ConnectionId>,
    last_error: Option<String>,
}

impl ChatState {
    pub fn new(display_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            user_id: user_id.into(),
            messages: Vec::new(),
            failed: HashMap::new(),
            typing: BTreeSet::new(),
            online: BTreeSet::new(),
            welcome_text: None,
            connection_id: None,
            last_error: None,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn is_own(&self, message: &Message) -> bool {
        identity_eq(&message.author_id, &self.user_id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        id.starts_with(TEMP_ID_PREFIX) && !self.failed.contains_key(id)
    }

    pub fn failure(&self, id: &str) -> Option<&str> {
        self.failed.get(id).map(String::as_str)
    }

    /// Display names of peers currently typing.
    pub fn typing(&self) -> impl Iterator<Item = &str> {
        self.typing.iter().map(String::as_str)
    }

    pub fn online(&self) -> impl Iterator<Item = &str> {
        self.online.iter().map(String::as_str)
    }

    pub fn welcome_text(&self) -> Option<&str> {
        self.welcome_text.as_deref()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn join_event(&self, secret: Option<String>) -> ClientEvent {
        ClientEvent::Join {
            display_name: self.display_name.clone(),
            user_id: self.user_id.clone(),
            secret,
        }
    }

    /// Validates, renders an optimistic copy and returns the event to send.
    /// Nothing is staged when validation fails.
    pub fn stage_outgoing(
        &mut self,
        body: Option<String>,
        attachment: Option<Attachment>,
        reply_to: Option<&str>,
    ) -> Result<Outgoing, ValidationError> {
        let attachment = attachment.filter(|a| a.is_present());
        validate_message_parts(body.as_deref(), attachment.as_ref())?;

        let body = body.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());
        let reply_ref = reply_to
            .and_then(|id| self.get(id))
            .map(Message::reply_snapshot);
        let temp_id = format!("{TEMP_ID_PREFIX}{}", nanoid::nanoid!());
        let timestamp = Utc::now().trunc_subsecs(3);

        let optimistic = Message {
            id: temp_id.clone(),
            author_name: self.display_name.clone(),
            author_id: self.user_id.clone(),
            body: body.clone(),
            attachment: attachment.clone(),
            timestamp,
            reply_ref: reply_ref.clone(),
            edited: false,
            client_message_id: Some(temp_id.clone()),
            reactions: Default::default(),
            read_by: Default::default(),
        };
        self.messages.push(optimistic);
        self.sort();

        Ok(Outgoing {
            event: ClientEvent::SendMessage {
                body,
                attachment,
                reply_ref,
                timestamp: Some(timestamp),
                client_message_id: Some(temp_id.clone()),
                author_name: Some(self.display_name.clone()),
                author_id: Some(self.user_id.clone()),
            },
            temp_id,
        })
    }

    /// Replaces the list with the relay's snapshot. Still-pending optimistic
    /// copies survive unless the snapshot already confirms them; confirmed
    /// entries newer than the snapshot's tail arrived ahead of it and are
    /// kept too. An empty snapshot keeps every confirmed entry.
    pub fn apply_history_snapshot(&mut self, snapshot: Vec<Message>) {
        let newest = snapshot.iter().map(|m| m.timestamp).max();
        let previous = std::mem::replace(&mut self.messages, snapshot);

        for msg in previous {
            if self.messages.iter().any(|m| m.id == msg.id) {
                continue;
            }
            if msg.is_temporary() {
                let confirmed = self.messages.iter().any(|m| {
                    find_optimistic_match(std::slice::from_ref(&msg), m).is_some()
                });
                if confirmed {
                    self.failed.remove(&msg.id);
                } else {
                    self.messages.push(msg);
                }
            } else if newest.map_or(true, |t| msg.timestamp > t) {
                self.messages.push(msg);
            }
        }
        self.sort();
    }

    /// Dedup by id first, then replace a matching optimistic copy, else append.
    pub fn apply_insert(&mut self, message: Message) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else if let Some(idx) = find_optimistic_match(&self.messages, &message) {
            let temp_id = std::mem::replace(&mut self.messages[idx], message).id;
            self.failed.remove(&temp_id);
            debug!(%temp_id, "optimistic copy confirmed");
        } else {
            self.messages.push(message);
        }
        self.sort();
    }

    pub fn apply_delete(&mut self, id: &str) {
        self.messages.retain(|m| m.id != id);
        self.failed.remove(id);
    }

    pub fn apply_edit(&mut self, id: &str, new_body: &str) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            msg.body = Some(new_body.to_string());
            msg.edited = true;
        }
    }

    pub fn apply_reaction(&mut self, id: &str, emoji: &str, actor: &str, action: ReactionAction) {
        let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) else {
            return;
        };
        let actor = normalize_user_key(actor);
        match action {
            ReactionAction::Add => {
                msg.reactions.entry(emoji.to_string()).or_default().insert(actor);
            }
            ReactionAction::Remove => {
                if let Some(actors) = msg.reactions.get_mut(emoji) {
                    actors.remove(&actor);
                    if actors.is_empty() {
                        msg.reactions.remove(emoji);
                    }
                }
            }
        }
    }

    pub fn apply_read_receipt(&mut self, id: &str, reader: &str) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            msg.read_by.insert(normalize_user_key(reader));
        }
    }

    /// Marks an optimistic copy as refused. It stays visible so the user can
    /// retry or discard it.
    pub fn mark_failed(&mut self, temp_id: &str, reason: impl Into<String>) {
        if self.messages.iter().any(|m| m.id == temp_id && m.is_temporary()) {
            self.failed.insert(temp_id.to_string(), reason.into());
        }
    }

    /// Marks the optimistic copy sent with `client_message_id` as refused.
    /// Returns false when no pending copy carries that id.
    pub fn mark_send_failed(&mut self, client_message_id: &str, reason: impl Into<String>) -> bool {
        let temp_id = self
            .messages
            .iter()
            .find(|m| m.is_temporary() && m.client_message_id.as_deref() == Some(client_message_id))
            .map(|m| m.id.clone());
        match temp_id {
            Some(temp_id) => {
                self.mark_failed(&temp_id, reason);
                true
            }
            None => false,
        }
    }

    /// Drops a failed optimistic copy, returning it for a retry.
    pub fn discard_failed(&mut self, temp_id: &str) -> Option<Message> {
        self.failed.remove(temp_id)?;
        let idx = self.messages.iter().position(|m| m.id == temp_id)?;
        Some(self.messages.remove(idx))
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Joined {
                welcome_text,
                connection_id,
            } => {
                self.welcome_text = Some(welcome_text);
                self.connection_id = Some(connection_id);
            }
            ServerEvent::MessageHistory { messages } => self.apply_history_snapshot(messages),
            ServerEvent::ReceiveMessage { message } => {
                // A message is an implicit "stopped typing".
                self.typing.remove(&message.author_name);
                self.apply_insert(message);
            }
            ServerEvent::MessageDeleted { id } => self.apply_delete(&id),
            ServerEvent::DeleteMessageError { id, reason } => {
                warn!(?id, %reason, "delete refused");
                self.last_error = Some(reason);
            }
            ServerEvent::UserTyping {
                display_name,
                is_typing,
            } => {
                if is_typing {
                    self.typing.insert(display_name);
                } else {
                    self.typing.remove(&display_name);
                }
            }
            ServerEvent::UserJoined { display_name, .. } => {
                self.online.insert(display_name);
            }
            ServerEvent::UserLeft { display_name } => {
                self.typing.remove(&display_name);
                self.online.remove(&display_name);
            }
            ServerEvent::MessageReaction {
                id,
                emoji,
                actor,
                action,
            } => self.apply_reaction(&id, &emoji, &actor, action),
            ServerEvent::MessageEdited { id, new_body } => self.apply_edit(&id, &new_body),
            ServerEvent::MessageRead { id, read_by, .. } => {
                for reader in &read_by {
                    self.apply_read_receipt(&id, reader);
                }
            }
            ServerEvent::Error {
                message,
                client_message_id,
            } => {
                let marked = match client_message_id {
                    Some(cid) => self.mark_send_failed(&cid, message.clone()),
                    None => false,
                };
                if !marked {
                    self.last_error = Some(message);
                }
            }
        }
    }

    fn sort(&mut self) {
        self.messages.sort_by_key(|m| m.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn confirmed(id: &str, author: &str, body: &str, ts: DateTime<Utc>) -> Message {
        Message {
            id: id.into(),
            author_name: author.into(),
            author_id: author.into(),
            body: Some(body.into()),
            attachment: None,
            timestamp: ts,
            reply_ref: None,
            edited: false,
            client_message_id: None,
            reactions: Default::default(),
            read_by: Default::default(),
        }
    }

    fn echo(state: &ChatState, outgoing: &Outgoing, id: &str) -> Message {
        let mut msg = state.get(&outgoing.temp_id).unwrap().clone();
        msg.id = id.into();
        msg
    }

    #[test]
    fn staged_send_is_replaced_by_confirmed_copy() {
        let mut alice = ChatState::new("alice", "a1");
        let out = alice.stage_outgoing(Some(" hi ".into()), None, None).unwrap();
        assert_eq!(alice.messages().len(), 1);
        assert!(alice.is_pending(&out.temp_id));

        match &out.event {
            ClientEvent::SendMessage { body, client_message_id, .. } => {
                assert_eq!(body.as_deref(), Some("hi"));
                assert_eq!(client_message_id.as_deref(), Some(out.temp_id.as_str()));
            }
            other => panic!("unexpected {other:?}"),
        }

        let m1 = echo(&alice, &out, "m1");
        alice.apply_insert(m1.clone());
        alice.apply_insert(m1);
        assert_eq!(alice.messages().len(), 1);
        assert_eq!(alice.messages()[0].id, "m1");
    }

    #[test]
    fn empty_send_stages_nothing() {
        let mut alice = ChatState::new("alice", "a1");
        assert_eq!(
            alice.stage_outgoing(Some("  ".into()), None, None),
            Err(ValidationError::EmptyMessage)
        );
        assert!(alice.messages().is_empty());
    }

    #[test]
    fn peer_insert_appends() {
        let mut bob = ChatState::new("bob", "b1");
        bob.apply_insert(confirmed("m1", "a1", "hi", at(0)));
        assert_eq!(bob.messages().len(), 1);
        assert!(!bob.is_own(&bob.messages()[0]));
    }

    #[test]
    fn out_of_order_arrival_renders_by_timestamp() {
        let mut state = ChatState::new("bob", "b1");
        state.apply_insert(confirmed("x", "a1", "later", at(1)));
        state.apply_insert(confirmed("y", "c1", "earlier", at(0)));
        let ids: Vec<_> = state.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x"]);
    }

    #[test]
    fn snapshot_keeps_pending_and_early_inserts() {
        let mut alice = ChatState::new("alice", "a1");
        let out = alice.stage_outgoing(Some("pending".into()), None, None).unwrap();
        let early = confirmed("late", "b1", "arrived first", Utc::now() + Duration::hours(1));
        alice.apply_insert(early);

        alice.apply_history_snapshot(vec![
            confirmed("h1", "b1", "old", at(0)),
            confirmed("h2", "a1", "older reply", at(1)),
        ]);

        let ids: Vec<_> = alice.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "h2", out.temp_id.as_str(), "late"]);
    }

    #[test]
    fn empty_snapshot_keeps_inserts_that_arrived_first() {
        let mut bob = ChatState::new("bob", "b1");
        bob.apply_insert(confirmed("m1", "a1", "hi", at(0)));

        bob.apply_history_snapshot(Vec::new());
        assert_eq!(bob.messages().len(), 1);
        assert_eq!(bob.messages()[0].id, "m1");
    }

    #[test]
    fn snapshot_drops_pending_copy_it_already_confirms() {
        let mut alice = ChatState::new("alice", "a1");
        let out = alice.stage_outgoing(Some("hi".into()), None, None).unwrap();
        let m1 = echo(&alice, &out, "m1");

        alice.apply_history_snapshot(vec![m1]);
        assert_eq!(alice.messages().len(), 1);
        assert_eq!(alice.messages()[0].id, "m1");
    }

    #[test]
    fn delete_edit_reaction_and_receipt() {
        let mut state = ChatState::new("bob", "b1");
        state.apply_insert(confirmed("m1", "a1", "helo", at(0)));

        state.apply_edit("m1", "hello");
        assert_eq!(state.get("m1").unwrap().body.as_deref(), Some("hello"));
        assert!(state.get("m1").unwrap().edited);
        state.apply_edit("missing", "x");

        state.apply_reaction("m1", "👍", "B1", ReactionAction::Add);
        state.apply_reaction("m1", "👍", "b1", ReactionAction::Add);
        assert_eq!(state.get("m1").unwrap().reactions["👍"].len(), 1);
        state.apply_reaction("m1", "👍", "b1", ReactionAction::Remove);
        assert!(state.get("m1").unwrap().reactions.is_empty());

        state.apply_read_receipt("m1", "b1");
        state.apply_read_receipt("m1", "b1");
        assert_eq!(state.get("m1").unwrap().read_by.len(), 1);

        state.apply_delete("m1");
        state.apply_delete("m1");
        assert!(state.messages().is_empty());
    }

    #[test]
    fn relay_error_marks_matching_send_failed() {
        let mut alice = ChatState::new("alice", "a1");
        let out = alice.stage_outgoing(Some("hi".into()), None, None).unwrap();

        alice.handle_server_event(ServerEvent::Error {
            message: "Name and ID are required".into(),
            client_message_id: Some(out.temp_id.clone()),
        });
        assert_eq!(alice.failure(&out.temp_id), Some("Name and ID are required"));
        assert!(!alice.is_pending(&out.temp_id));
        assert!(alice.last_error().is_none());

        let dropped = alice.discard_failed(&out.temp_id).unwrap();
        assert_eq!(dropped.body.as_deref(), Some("hi"));
        assert!(alice.messages().is_empty());
    }

    #[test]
    fn typing_and_presence_events() {
        let mut alice = ChatState::new("alice", "a1");
        alice.handle_server_event(ServerEvent::UserJoined {
            display_name: "bob".into(),
            user_id: "b1".into(),
        });
        alice.handle_server_event(ServerEvent::UserTyping {
            display_name: "bob".into(),
            is_typing: true,
        });
        assert_eq!(alice.typing().collect::<Vec<_>>(), vec!["bob"]);

        alice.handle_server_event(ServerEvent::UserLeft {
            display_name: "bob".into(),
        });
        assert_eq!(alice.typing().count(), 0);
        assert_eq!(alice.online().count(), 0);
    }

    #[test]
    fn reply_carries_snapshot_of_target() {
        let mut alice = ChatState::new("alice", "a1");
        alice.apply_insert(confirmed("m1", "b1", "question?", at(0)));
        let out = alice
            .stage_outgoing(Some("answer".into()), None, Some("m1"))
            .unwrap();
        match out.event {
            ClientEvent::SendMessage { reply_ref: Some(r), .. } => {
                assert_eq!(r.id, "m1");
                assert_eq!(r.body, "question?");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
