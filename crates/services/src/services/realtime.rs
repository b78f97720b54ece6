use std::sync::{Arc, RwLock};

use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

#[path = "realtime/events.rs"]
pub mod events;
#[path = "realtime/rooms.rs"]
pub mod rooms;

pub use events::{Actor, ClientEvent, ProjectEvent, SprintAction};
pub use rooms::{ConnectionHandle, RoomDirectory, SessionRegistry};

struct RealtimeState {
    sessions: SessionRegistry,
    rooms: RoomDirectory,
}

/// In-process realtime hub: session registry + room directory behind one
/// synchronous lock. Registry mutations never hold the lock across an await
/// point; handlers mutate in a single turn and do their I/O outside.
#[derive(Clone)]
pub struct RealtimeService {
    state: Arc<RwLock<RealtimeState>>,
}

impl Default for RealtimeService {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RealtimeState {
                sessions: SessionRegistry::default(),
                rooms: RoomDirectory::default(),
            })),
        }
    }

    pub fn register_connection(
        &self,
        connection_id: Uuid,
        actor: Actor,
        sender: UnboundedSender<Message>,
    ) {
        let mut state = self.state.write().unwrap();
        state
            .sessions
            .register(connection_id, ConnectionHandle::new(actor, sender));
    }

    pub fn identity_of(&self, connection_id: Uuid) -> Option<Actor> {
        let state = self.state.read().unwrap();
        state.sessions.identity_of(connection_id).cloned()
    }

    pub fn members(&self, project_id: Uuid) -> Vec<Uuid> {
        let state = self.state.read().unwrap();
        state.rooms.members(project_id)
    }

    pub fn is_member(&self, connection_id: Uuid, project_id: Uuid) -> bool {
        let state = self.state.read().unwrap();
        state.rooms.contains(connection_id, project_id)
    }

    pub fn connection_count(&self) -> usize {
        let state = self.state.read().unwrap();
        state.sessions.len()
    }

    /// Subscribe the connection to a project room. Idempotent; the rest of
    /// the room hears `user_joined` only on the first join.
    pub fn join_project(&self, connection_id: Uuid, project_id: Uuid) {
        let (newly_joined, actor) = {
            let mut state = self.state.write().unwrap();
            let Some(actor) = state.sessions.identity_of(connection_id).cloned() else {
                return;
            };
            (state.rooms.join(connection_id, project_id), actor)
        };

        if newly_joined {
            self.relay(
                project_id,
                connection_id,
                &ProjectEvent::UserJoined {
                    user_id: actor.id,
                    user_name: actor.name,
                },
            );
        }
    }

    pub fn leave_project(&self, connection_id: Uuid, project_id: Uuid) {
        let (was_member, actor) = {
            let mut state = self.state.write().unwrap();
            let Some(actor) = state.sessions.identity_of(connection_id).cloned() else {
                return;
            };
            (state.rooms.leave(connection_id, project_id), actor)
        };

        if was_member {
            self.relay(
                project_id,
                connection_id,
                &ProjectEvent::UserLeft {
                    user_id: actor.id,
                    user_name: actor.name,
                },
            );
        }
    }

    /// Disconnect teardown. The connection leaves the session registry and
    /// every room in one synchronous step, then each affected room hears
    /// `user_left` once.
    pub fn disconnect(&self, connection_id: Uuid) {
        let (handle, left_rooms) = {
            let mut state = self.state.write().unwrap();
            let handle = state.sessions.unregister(connection_id);
            let left_rooms = state.rooms.drop_connection(connection_id);
            (handle, left_rooms)
        };

        let Some(handle) = handle else {
            return;
        };
        for project_id in left_rooms {
            self.relay(
                project_id,
                connection_id,
                &ProjectEvent::UserLeft {
                    user_id: handle.actor.id,
                    user_name: handle.actor.name.clone(),
                },
            );
        }
    }

    /// Deliver to every room member, the actor's other connections included.
    /// Used after REST mutations, where the caller is not a room connection.
    pub fn announce(&self, project_id: Uuid, event: &ProjectEvent) {
        self.fan_out(project_id, None, event);
    }

    /// Deliver to every room member except the originating connection.
    /// Echo-suppression for peer-originated signals.
    pub fn relay(&self, project_id: Uuid, sender_id: Uuid, event: &ProjectEvent) {
        self.fan_out(project_id, Some(sender_id), event);
    }

    /// Direct message to one connection, e.g. a rejected socket command.
    pub fn send_to(&self, connection_id: Uuid, event: &ProjectEvent) {
        let state = self.state.read().unwrap();
        if let Some(handle) = state.sessions.handle(connection_id) {
            handle.send(event.to_ws_message());
        }
    }

    fn fan_out(&self, project_id: Uuid, exclude: Option<Uuid>, event: &ProjectEvent) {
        let message = event.to_ws_message();
        let state = self.state.read().unwrap();

        let mut delivered = 0usize;
        let mut dead = 0usize;
        for connection_id in state.rooms.members(project_id) {
            if Some(connection_id) == exclude {
                continue;
            }
            let Some(handle) = state.sessions.handle(connection_id) else {
                continue;
            };
            if handle.send(message.clone()) {
                delivered += 1;
            } else {
                dead += 1;
            }
        }

        if dead > 0 {
            tracing::debug!(
                event = event.name(),
                project_id = %project_id,
                delivered,
                dead,
                "Skipped dead connections during fan-out"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;

    fn actor(name: &str) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }

    fn connect(service: &RealtimeService, name: &str) -> (Uuid, Actor, UnboundedReceiver<Message>) {
        let (tx, rx) = unbounded_channel();
        let connection_id = Uuid::new_v4();
        let actor = actor(name);
        service.register_connection(connection_id, actor.clone(), tx);
        (connection_id, actor, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                out.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        out
    }

    #[tokio::test]
    async fn join_notifies_the_room_but_not_the_joiner() {
        let service = RealtimeService::new();
        let project = Uuid::new_v4();

        let (first, _, mut first_rx) = connect(&service, "first");
        let (second, second_actor, mut second_rx) = connect(&service, "second");

        service.join_project(first, project);
        service.join_project(second, project);

        let first_events = drain(&mut first_rx);
        assert_eq!(first_events.len(), 1);
        assert_eq!(first_events[0]["event"], "user_joined");
        assert_eq!(first_events[0]["data"]["user_id"], second_actor.id.to_string());

        assert!(drain(&mut second_rx).is_empty());

        // Joining again is idempotent: no duplicate notification.
        service.join_project(second, project);
        assert!(drain(&mut first_rx).is_empty());
        assert_eq!(service.members(project).len(), 2);
    }

    #[tokio::test]
    async fn announce_reaches_everyone_relay_excludes_the_sender() {
        let service = RealtimeService::new();
        let project = Uuid::new_v4();

        let (first, first_actor, mut first_rx) = connect(&service, "first");
        let (second, _, mut second_rx) = connect(&service, "second");
        service.join_project(first, project);
        service.join_project(second, project);
        drain(&mut first_rx);
        drain(&mut second_rx);

        let typing = ProjectEvent::TypingStart {
            task_id: Uuid::new_v4(),
            user: first_actor.clone(),
        };
        service.relay(project, first, &typing);
        assert!(drain(&mut first_rx).is_empty());
        assert_eq!(drain(&mut second_rx).len(), 1);

        let deleted = ProjectEvent::TaskDeleted {
            task_id: Uuid::new_v4(),
            user: first_actor,
        };
        service.announce(project, &deleted);
        assert_eq!(drain(&mut first_rx).len(), 1);
        assert_eq!(drain(&mut second_rx).len(), 1);
    }

    #[tokio::test]
    async fn events_stay_inside_their_room() {
        let service = RealtimeService::new();
        let project = Uuid::new_v4();
        let other_project = Uuid::new_v4();

        let (member, member_actor, mut member_rx) = connect(&service, "member");
        let (outsider, _, mut outsider_rx) = connect(&service, "outsider");
        service.join_project(member, project);
        service.join_project(outsider, other_project);
        drain(&mut member_rx);
        drain(&mut outsider_rx);

        service.announce(
            project,
            &ProjectEvent::TaskDeleted {
                task_id: Uuid::new_v4(),
                user: member_actor,
            },
        );

        assert_eq!(drain(&mut member_rx).len(), 1);
        assert!(drain(&mut outsider_rx).is_empty());
    }

    #[tokio::test]
    async fn disconnect_emits_user_left_per_joined_room() {
        let service = RealtimeService::new();
        let rooms: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let unrelated = Uuid::new_v4();

        let (leaver, leaver_actor, _leaver_rx) = connect(&service, "leaver");
        let (watcher, _, mut watcher_rx) = connect(&service, "watcher");

        for room in &rooms {
            service.join_project(watcher, *room);
            service.join_project(leaver, *room);
        }
        service.join_project(watcher, unrelated);
        drain(&mut watcher_rx);

        service.disconnect(leaver);

        let events = drain(&mut watcher_rx);
        assert_eq!(events.len(), rooms.len());
        for event in &events {
            assert_eq!(event["event"], "user_left");
            assert_eq!(event["data"]["user_id"], leaver_actor.id.to_string());
        }
        assert_eq!(service.connection_count(), 1);

        // A second disconnect of the same connection does nothing.
        service.disconnect(leaver);
        assert!(drain(&mut watcher_rx).is_empty());
    }

    #[tokio::test]
    async fn fan_out_survives_dead_connections() {
        let service = RealtimeService::new();
        let project = Uuid::new_v4();

        let (alive, alive_actor, mut alive_rx) = connect(&service, "alive");
        let (dead, _, dead_rx) = connect(&service, "dead");
        service.join_project(alive, project);
        service.join_project(dead, project);
        drain(&mut alive_rx);
        drop(dead_rx);

        service.announce(
            project,
            &ProjectEvent::TaskDeleted {
                task_id: Uuid::new_v4(),
                user: alive_actor,
            },
        );
        assert_eq!(drain(&mut alive_rx).len(), 1);
    }
}
