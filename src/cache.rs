//! In-memory chat state cache.
//!
//! Fed by REST pagination and socket pushes. Mutation policy mirrors the
//! backend contract exactly:
//!
//! - a list fetch replaces the chat summaries wholesale;
//! - a messages fetch replaces the chat's list when no cursor was supplied,
//!   and prepends when one was — with NO de-duplication, so refetching the
//!   same cursor duplicates entries (a known upstream quirk, kept as is);
//! - a pushed message appends and updates that chat's last-message snapshot
//!   without reordering the summary list;
//! - presence updates overwrite entries, status and last-seen only.
//!
//! Nothing here is persisted (the session slice in [`crate::storage`] is;
//! the cache would go stale) and nothing is evicted for the session's life.

use std::collections::HashMap;

use log::debug;

use crate::api::events::ServerEvent;
use crate::api::models::{Chat, Message, Presence};

#[derive(Debug, Default)]
pub struct Cache {
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<Message>>,
    presence: HashMap<String, Presence>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    // --- REST results -----------------------------------------------------

    /// Replace the chat summary list wholesale.
    pub fn set_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    /// Land one page of history. `had_cursor` distinguishes an initial load
    /// (replace) from an older-page load (prepend).
    pub fn apply_messages(&mut self, chat_id: &str, page: Vec<Message>, had_cursor: bool) {
        let entry = self.messages.entry(chat_id.to_string()).or_default();
        if had_cursor {
            let mut merged = page;
            merged.append(entry);
            *entry = merged;
        } else {
            *entry = page;
        }
    }

    // --- socket pushes ----------------------------------------------------

    pub fn apply_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::MessageNew(message) => self.push_message(message.clone()),
            ServerEvent::ListUpdate(Some(chat)) => self.upsert_chat(chat.clone()),
            ServerEvent::ListUpdate(None) => {
                // Refetch signal only; the caller re-runs the list fetch.
            }
            ServerEvent::PresenceBulk(map) => {
                for (user_id, entry) in map {
                    self.presence.insert(user_id.clone(), entry.clone());
                }
            }
            ServerEvent::PresenceUpdate(update) => {
                self.presence.insert(
                    update.user_id.clone(),
                    Presence {
                        status: update.status,
                        last_seen: update.last_seen,
                    },
                );
            }
            ServerEvent::Other { event, .. } => {
                debug!("cache ignoring event {event}");
            }
        }
    }

    /// Append a pushed message and refresh that chat's last-message snapshot.
    /// The summary list is not reordered.
    fn push_message(&mut self, message: Message) {
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == message.chat_id) {
            chat.last_message = Some(message.clone());
        }
        self.messages
            .entry(message.chat_id.clone())
            .or_default()
            .push(message);
    }

    /// Replace a known summary in place, or insert an unseen chat at the
    /// front of the list.
    fn upsert_chat(&mut self, chat: Chat) {
        match self.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => *existing = chat,
            None => self.chats.insert(0, chat),
        }
    }

    // --- reads ------------------------------------------------------------

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.messages.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn presence(&self, user_id: &str) -> Option<&Presence> {
        self.presence.get(user_id)
    }

    pub fn presence_map(&self) -> &HashMap<String, Presence> {
        &self.presence
    }
}
