// src/chat.rs

//! In-process relay for doubt chat events.
//!
//! Every connected socket subscribes to one broadcast channel and forwards
//! only the events its user may see: admins see everything, students see
//! events about their own doubts.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{doubt::Doubt, user::Role};

const CHANNEL_CAPACITY: usize = 1024;

/// Frames the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A student posted to a doubt (or opened one).
    DoubtUpdate { doubt: DoubtSnapshot },
    /// An admin answered.
    AdminReply { doubt: DoubtSnapshot },
    DoubtClosed { doubt_id: i64, student_id: i64 },
    /// Only sent to the socket that caused it.
    Error { message: String },
}

/// Frames clients send over the socket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    DoubtUpdate { doubt_id: i64, text: String },
    AdminReply { doubt_id: i64, text: String },
    CloseDoubt { doubt_id: i64 },
}

/// The part of a doubt that travels with events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoubtSnapshot {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub status: String,
    pub messages: Vec<crate::models::doubt::ChatMessage>,
}

impl From<&Doubt> for DoubtSnapshot {
    fn from(doubt: &Doubt) -> Self {
        Self {
            id: doubt.id,
            student_id: doubt.student_id,
            subject: doubt.subject.clone(),
            status: doubt.status.clone(),
            messages: doubt.messages.0.clone(),
        }
    }
}

impl ServerEvent {
    /// Event announcing a new message, named after who sent it.
    pub fn for_message(doubt: &Doubt, sender_role: Role) -> Self {
        let doubt = DoubtSnapshot::from(doubt);
        match sender_role {
            Role::Admin => ServerEvent::AdminReply { doubt },
            Role::Student => ServerEvent::DoubtUpdate { doubt },
        }
    }

    pub fn closed(doubt: &Doubt) -> Self {
        ServerEvent::DoubtClosed {
            doubt_id: doubt.id,
            student_id: doubt.student_id,
        }
    }

    /// Student that owns the doubt this event is about.
    fn student_id(&self) -> Option<i64> {
        match self {
            ServerEvent::DoubtUpdate { doubt } | ServerEvent::AdminReply { doubt } => {
                Some(doubt.student_id)
            }
            ServerEvent::DoubtClosed { student_id, .. } => Some(*student_id),
            ServerEvent::Error { .. } => None,
        }
    }

    /// Whether a socket of (`user_id`, `role`) should receive this event.
    pub fn is_visible_to(&self, user_id: i64, role: Role) -> bool {
        match (role, self.student_id()) {
            (Role::Admin, Some(_)) => true,
            (Role::Student, Some(owner)) => owner == user_id,
            (_, None) => false,
        }
    }
}

/// Shared fan-out point for chat events.
#[derive(Debug, Clone)]
pub struct ChatHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no listeners is fine.
    pub fn publish(&self, event: ServerEvent) {
        if let Ok(receivers) = self.sender.send(event) {
            tracing::debug!(receivers, "Chat event published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(student_id: i64) -> DoubtSnapshot {
        DoubtSnapshot {
            id: 10,
            student_id,
            subject: "Integrals".into(),
            status: "open".into(),
            messages: vec![],
        }
    }

    #[test]
    fn events_use_wire_names() {
        let json = serde_json::to_value(ServerEvent::AdminReply { doubt: snapshot(1) }).unwrap();
        assert_eq!(json["event"], "admin_reply");
        assert_eq!(json["data"]["doubt"]["id"], 10);

        let json = serde_json::to_value(ServerEvent::DoubtClosed {
            doubt_id: 10,
            student_id: 1,
        })
        .unwrap();
        assert_eq!(json["event"], "doubt_closed");
        assert_eq!(json["data"]["doubt_id"], 10);
    }

    #[test]
    fn client_commands_parse() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"event":"close_doubt","data":{"doubt_id":3}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::CloseDoubt { doubt_id: 3 });

        let cmd: ClientCommand = serde_json::from_str(
            r#"{"event":"doubt_update","data":{"doubt_id":3,"text":"still stuck"}}"#,
        )
        .unwrap();
        assert!(matches!(cmd, ClientCommand::DoubtUpdate { doubt_id: 3, .. }));

        assert!(serde_json::from_str::<ClientCommand>(r#"{"event":"nope","data":{}}"#).is_err());
    }

    #[test]
    fn students_only_see_their_own_doubts() {
        let event = ServerEvent::DoubtUpdate { doubt: snapshot(5) };
        assert!(event.is_visible_to(5, Role::Student));
        assert!(!event.is_visible_to(6, Role::Student));
        assert!(event.is_visible_to(99, Role::Admin));

        let error = ServerEvent::Error {
            message: "x".into(),
        };
        assert!(!error.is_visible_to(5, Role::Student));
        assert!(!error.is_visible_to(1, Role::Admin));
    }

    #[tokio::test]
    async fn hub_fans_out_to_subscribers() {
        let hub = ChatHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish(ServerEvent::DoubtClosed {
            doubt_id: 1,
            student_id: 2,
        });

        assert_eq!(a.recv().await.unwrap(), b.recv().await.unwrap());
    }

    #[test]
    fn publishing_without_listeners_is_silent() {
        ChatHub::new().publish(ServerEvent::DoubtClosed {
            doubt_id: 1,
            student_id: 2,
        });
    }
}
