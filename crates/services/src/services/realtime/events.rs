use axum::extract::ws::Message;
use chrono::Utc;
use db::models::{
    attachment::Attachment,
    comment::Comment,
    project::{ProjectMember, ProjectWithDetails, WorkflowStage},
    sprint::Sprint,
    task::Task,
    time_log::TimeLog,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::services::auth::AuthUser;

/// Public identity attached to every event an actor triggers. Id and display
/// name only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

impl From<&AuthUser> for Actor {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SprintAction {
    Created,
    Updated,
    Deleted,
}

/// Server → client event catalog. Serialized as
/// `{"event": <name>, "data": <payload>, "timestamp": <now>}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProjectEvent {
    TaskCreated {
        task: Task,
        user: Actor,
    },
    TaskUpdated {
        task: Task,
        changes: Map<String, Value>,
        user: Actor,
    },
    TaskMoved {
        task: Task,
        from_status: String,
        to_status: String,
        new_order: Option<i32>,
        user: Actor,
    },
    TaskDeleted {
        task_id: Uuid,
        user: Actor,
    },
    CommentAdded {
        comment: Comment,
        task_id: Uuid,
        user: Actor,
    },
    FileUploaded {
        file: Attachment,
        task_id: Uuid,
        user: Actor,
    },
    MemberAdded {
        project: ProjectWithDetails,
        new_member: ProjectMember,
    },
    MemberRemoved {
        project: ProjectWithDetails,
        removed_user_id: Uuid,
    },
    WorkflowUpdated {
        workflow: Vec<WorkflowStage>,
    },
    SprintUpdated {
        sprint: Sprint,
        action: SprintAction,
        user: Actor,
    },
    TimerStarted {
        task_id: Uuid,
        time_log: TimeLog,
        user: Actor,
    },
    TimerStopped {
        task_id: Uuid,
        time_log: TimeLog,
        user: Actor,
    },
    TypingStart {
        task_id: Uuid,
        user: Actor,
    },
    TypingStop {
        task_id: Uuid,
        user_id: Uuid,
    },
    UserJoined {
        user_id: Uuid,
        user_name: String,
    },
    UserLeft {
        user_id: Uuid,
        user_name: String,
    },
    Error {
        message: String,
    },
}

impl ProjectEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectEvent::TaskCreated { .. } => "task_created",
            ProjectEvent::TaskUpdated { .. } => "task_updated",
            ProjectEvent::TaskMoved { .. } => "task_moved",
            ProjectEvent::TaskDeleted { .. } => "task_deleted",
            ProjectEvent::CommentAdded { .. } => "comment_added",
            ProjectEvent::FileUploaded { .. } => "file_uploaded",
            ProjectEvent::MemberAdded { .. } => "member_added",
            ProjectEvent::MemberRemoved { .. } => "member_removed",
            ProjectEvent::WorkflowUpdated { .. } => "workflow_updated",
            ProjectEvent::SprintUpdated { .. } => "sprint_updated",
            ProjectEvent::TimerStarted { .. } => "timer_started",
            ProjectEvent::TimerStopped { .. } => "timer_stopped",
            ProjectEvent::TypingStart { .. } => "typing_start",
            ProjectEvent::TypingStop { .. } => "typing_stop",
            ProjectEvent::UserJoined { .. } => "user_joined",
            ProjectEvent::UserLeft { .. } => "user_left",
            ProjectEvent::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|err| {
            tracing::error!(event = self.name(), error = %err, "Failed to serialize event");
            json!({ "event": "error", "data": { "message": "serialization failure" } })
        });
        if let Value::Object(map) = &mut value {
            map.insert("timestamp".to_string(), json!(Utc::now()));
        }
        value
    }

    pub fn to_ws_message(&self) -> Message {
        Message::Text(self.to_json().to_string().into())
    }
}

/// Client → server commands accepted on the event channel. State-changing
/// confirmations are not relayed from clients; the mutation pipeline is the
/// only authoritative broadcast path, so the channel carries room membership
/// and ephemeral typing signals only.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinProject { project_id: Uuid },
    LeaveProject { project_id: Uuid },
    TypingStart { project_id: Uuid, task_id: Uuid },
    TypingStop { project_id: Uuid, task_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_envelope_carries_name_data_and_timestamp() {
        let event = ProjectEvent::TaskDeleted {
            task_id: Uuid::new_v4(),
            user: Actor {
                id: Uuid::new_v4(),
                name: "Ada".to_string(),
            },
        };

        let json = event.to_json();
        assert_eq!(json["event"], "task_deleted");
        assert!(json["data"]["task_id"].is_string());
        assert_eq!(json["data"]["user"]["name"], "Ada");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn presence_event_names_match_the_catalog() {
        let joined = ProjectEvent::UserJoined {
            user_id: Uuid::new_v4(),
            user_name: "Ada".to_string(),
        };
        assert_eq!(joined.name(), "user_joined");
        assert_eq!(joined.to_json()["event"], "user_joined");
    }

    #[test]
    fn client_commands_parse_from_the_wire_shape() {
        let parsed: ClientEvent = serde_json::from_value(json!({
            "event": "join_project",
            "data": { "project_id": "9f5b4868-6b4d-4f1e-9fb1-3b29e3aab5c8" }
        }))
        .unwrap();
        assert!(matches!(parsed, ClientEvent::JoinProject { .. }));

        let err = serde_json::from_value::<ClientEvent>(json!({
            "event": "task_created",
            "data": {}
        }));
        assert!(err.is_err());
    }
}
