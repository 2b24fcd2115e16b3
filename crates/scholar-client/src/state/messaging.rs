//! Chats between scholars. There is no messaging backend yet: the inbox is
//! seeded with sample conversations when a session starts and lives in memory.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, Utc};
use uuid::Uuid;

use scholar_types::{Chat, ChatKind, ChatMessage, LastMessage, Participant, SessionUser};

use crate::error::ClientError;
use crate::validation::ValidationError;

/// Someone a direct chat can be started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub role: &'static str,
}

const CONTACTS: &[(u128, &str, &str)] = &[
    (2, "Jane Doe", "Scholar"),
    (3, "Alex Smith", "Scholar"),
    (4, "Michael Johnson", "Scholar"),
    (5, "Sarah Williams", "Mentor"),
    (6, "Robert Brown", "Mentor"),
    (7, "Emma Davis", "Admin"),
    (8, "David Wilson", "Scholar"),
    (9, "Olivia Taylor", "Scholar"),
];

fn contact(idx: usize) -> Contact {
    let (id, name, role) = CONTACTS[idx];
    Contact {
        id: Uuid::from_u128(id),
        name: name.to_string(),
        role,
    }
}

#[derive(Default)]
struct Inbox {
    me: Option<Participant>,
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<ChatMessage>>,
}

impl Inbox {
    fn chat_mut(&mut self, chat_id: &str) -> Result<&mut Chat, ClientError> {
        self.chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| ClientError::NotFound("Chat".into()))
    }

    fn push(&mut self, chat_id: &str, message: ChatMessage) {
        let mine = self.me.as_ref().is_some_and(|me| message.is_from(me.id));
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.last_message = Some(LastMessage {
                content: message.content.clone(),
                timestamp: message.timestamp,
            });
            if !mine && !message.read {
                chat.unread_count += 1;
            }
        }
        self.messages
            .entry(chat_id.to_string())
            .or_default()
            .push(message);
    }
}

#[derive(Default)]
pub struct MessagingHolder {
    inbox: RwLock<Inbox>,
}

impl MessagingHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the inbox with the sample conversations for `user`.
    pub fn seed_for(&self, user: &SessionUser) {
        let me = Participant {
            id: user.id,
            name: user.name.clone(),
        };
        let jane = contact(0);
        let emma = contact(5);
        let now = Utc::now();

        let mut inbox = Inbox {
            me: Some(me.clone()),
            ..Default::default()
        };

        let direct_id = format!("direct-{}", jane.id.simple());
        inbox.chats.push(Chat {
            id: direct_id.clone(),
            name: jane.name.clone(),
            kind: ChatKind::Direct,
            participants: vec![me.clone(), participant(&jane)],
            batch_id: None,
            last_message: None,
            unread_count: 0,
        });
        let thread = [
            (&jane.id, &jane.name, "Hey, how are you doing with the scholarship project?", 60),
            (&me.id, &me.name, "I'm making good progress! Just need to finish the final report.", 58),
            (&jane.id, &jane.name, "That's great! Do you need any help with it?", 57),
            (&me.id, &me.name, "I might need some feedback on the methodology section. Could you review it when I'm done?", 55),
        ];
        for (sender_id, sender_name, content, minutes_ago) in thread {
            let message = ChatMessage {
                id: Uuid::new_v4(),
                chat_id: direct_id.clone(),
                sender_id: *sender_id,
                sender_name: sender_name.clone(),
                content: content.to_string(),
                timestamp: now - Duration::minutes(minutes_ago),
                read: *sender_id == me.id,
                attachments: Vec::new(),
            };
            inbox.push(&direct_id, message);
        }

        let batch_id = "batch-1".to_string();
        inbox.chats.push(Chat {
            id: batch_id.clone(),
            name: "Batch Group".into(),
            kind: ChatKind::Batch,
            participants: vec![me.clone(), participant(&contact(1)), participant(&contact(2))],
            batch_id: Some("1".into()),
            last_message: None,
            unread_count: 0,
        });

        let all_id = "all-batches".to_string();
        inbox.chats.push(Chat {
            id: all_id.clone(),
            name: "All Batches".into(),
            kind: ChatKind::All,
            participants: CONTACTS
                .iter()
                .enumerate()
                .map(|(i, _)| participant(&contact(i)))
                .chain(std::iter::once(me))
                .collect(),
            batch_id: None,
            last_message: None,
            unread_count: 0,
        });
        inbox.push(
            &all_id,
            ChatMessage {
                id: Uuid::new_v4(),
                chat_id: all_id.clone(),
                sender_id: emma.id,
                sender_name: emma.name.clone(),
                content: "Welcome to the scholars community chat!".into(),
                timestamp: now - Duration::days(1),
                read: false,
                attachments: Vec::new(),
            },
        );

        *self.write() = inbox;
    }

    /// Chats of one kind (or all), most recently active first.
    pub fn chats(&self, kind: Option<ChatKind>) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self
            .read()
            .chats
            .iter()
            .filter(|c| kind.is_none_or(|k| c.kind == k))
            .cloned()
            .collect();
        chats.sort_by_key(|c| {
            std::cmp::Reverse(c.last_message.as_ref().map(|m| m.timestamp))
        });
        chats
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.read().chats.iter().find(|c| c.id == chat_id).cloned()
    }

    /// Messages of one chat, oldest first.
    pub fn messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ClientError> {
        let inbox = self.read();
        if !inbox.chats.iter().any(|c| c.id == chat_id) {
            return Err(ClientError::NotFound("Chat".into()));
        }
        Ok(inbox.messages.get(chat_id).cloned().unwrap_or_default())
    }

    pub fn send_message(&self, chat_id: &str, content: &str) -> Result<ChatMessage, ClientError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let mut inbox = self.write();
        let me = inbox.me.clone().ok_or(ClientError::MissingSession)?;
        inbox.chat_mut(chat_id)?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            chat_id: chat_id.to_string(),
            sender_id: me.id,
            sender_name: me.name,
            content: content.to_string(),
            timestamp: Utc::now(),
            read: true,
            attachments: Vec::new(),
        };
        inbox.push(chat_id, message.clone());
        Ok(message)
    }

    pub fn mark_chat_read(&self, chat_id: &str) -> Result<(), ClientError> {
        let mut inbox = self.write();
        inbox.chat_mut(chat_id)?.unread_count = 0;
        if let Some(messages) = inbox.messages.get_mut(chat_id) {
            messages.iter_mut().for_each(|m| m.read = true);
        }
        Ok(())
    }

    pub fn total_unread(&self) -> u32 {
        self.read().chats.iter().map(|c| c.unread_count).sum()
    }

    /// Open the direct chat with `contact_id`, creating it if needed.
    pub fn start_direct_chat(&self, contact_id: Uuid) -> Result<Chat, ClientError> {
        let contact = self
            .contacts()
            .into_iter()
            .find(|c| c.id == contact_id)
            .ok_or_else(|| ClientError::NotFound("Contact".into()))?;

        let mut inbox = self.write();
        let me = inbox.me.clone().ok_or(ClientError::MissingSession)?;
        let existing = inbox.chats.iter().find(|c| {
            c.kind == ChatKind::Direct && c.participants.iter().any(|p| p.id == contact_id)
        });
        if let Some(chat) = existing {
            return Ok(chat.clone());
        }

        let chat = Chat {
            id: format!("direct-{}", contact.id.simple()),
            name: contact.name.clone(),
            kind: ChatKind::Direct,
            participants: vec![me, participant(&contact)],
            batch_id: None,
            last_message: None,
            unread_count: 0,
        };
        inbox.chats.push(chat.clone());
        Ok(chat)
    }

    pub fn contacts(&self) -> Vec<Contact> {
        (0..CONTACTS.len()).map(contact).collect()
    }

    /// Case-insensitive name match. A blank query lists everyone.
    pub fn search_contacts(&self, query: &str) -> Vec<Contact> {
        let query = query.trim().to_lowercase();
        self.contacts()
            .into_iter()
            .filter(|c| query.is_empty() || c.name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn clear(&self) {
        *self.write() = Inbox::default();
    }

    fn read(&self) -> RwLockReadGuard<'_, Inbox> {
        self.inbox.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inbox> {
        self.inbox.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn participant(contact: &Contact) -> Participant {
    Participant {
        id: contact.id,
        name: contact.name.clone(),
    }
}
