use std::collections::{HashMap, HashSet};

use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use super::events::Actor;

/// One live connection: the identity fixed at handshake plus its outbound
/// transport.
pub struct ConnectionHandle {
    pub actor: Actor,
    sender: UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub fn new(actor: Actor, sender: UnboundedSender<Message>) -> Self {
        Self { actor, sender }
    }

    /// Best-effort delivery; a closed peer just reports false.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// connection id → authenticated identity. Identity is set exactly once at
/// registration and never changes for the connection's lifetime.
#[derive(Default)]
pub struct SessionRegistry {
    connections: HashMap<Uuid, ConnectionHandle>,
}

impl SessionRegistry {
    pub fn register(&mut self, connection_id: Uuid, handle: ConnectionHandle) {
        self.connections.insert(connection_id, handle);
    }

    pub fn unregister(&mut self, connection_id: Uuid) -> Option<ConnectionHandle> {
        self.connections.remove(&connection_id)
    }

    pub fn identity_of(&self, connection_id: Uuid) -> Option<&Actor> {
        self.connections.get(&connection_id).map(|h| &h.actor)
    }

    pub fn handle(&self, connection_id: Uuid) -> Option<&ConnectionHandle> {
        self.connections.get(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// project id → member connections, with a reverse index so disconnect cost
/// is proportional to the rooms the connection actually joined. Rooms exist
/// only while non-empty; an absent entry is an empty room.
#[derive(Default)]
pub struct RoomDirectory {
    rooms: HashMap<Uuid, HashSet<Uuid>>,
    joined: HashMap<Uuid, HashSet<Uuid>>,
}

impl RoomDirectory {
    /// Returns true when the connection was not already in the room.
    pub fn join(&mut self, connection_id: Uuid, project_id: Uuid) -> bool {
        let newly = self.rooms.entry(project_id).or_default().insert(connection_id);
        if newly {
            self.joined.entry(connection_id).or_default().insert(project_id);
        }
        newly
    }

    /// Returns true when the connection was actually a member.
    pub fn leave(&mut self, connection_id: Uuid, project_id: Uuid) -> bool {
        let Some(members) = self.rooms.get_mut(&project_id) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            self.rooms.remove(&project_id);
        }
        if let Some(joined) = self.joined.get_mut(&connection_id) {
            joined.remove(&project_id);
            if joined.is_empty() {
                self.joined.remove(&connection_id);
            }
        }
        removed
    }

    pub fn members(&self, project_id: Uuid) -> Vec<Uuid> {
        self.rooms
            .get(&project_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, connection_id: Uuid, project_id: Uuid) -> bool {
        self.rooms
            .get(&project_id)
            .is_some_and(|set| set.contains(&connection_id))
    }

    /// Remove the connection from every room it joined, returning those
    /// rooms. Walks the reverse index only.
    pub fn drop_connection(&mut self, connection_id: Uuid) -> Vec<Uuid> {
        let Some(joined) = self.joined.remove(&connection_id) else {
            return Vec::new();
        };
        let mut left = Vec::with_capacity(joined.len());
        for project_id in joined {
            if let Some(members) = self.rooms.get_mut(&project_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    self.rooms.remove(&project_id);
                }
            }
            left.push(project_id);
        }
        left
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent() {
        let mut rooms = RoomDirectory::default();
        let conn = Uuid::new_v4();
        let project = Uuid::new_v4();

        assert!(rooms.join(conn, project));
        assert!(!rooms.join(conn, project));
        assert_eq!(rooms.members(project).len(), 1);
    }

    #[test]
    fn empty_rooms_are_garbage_collected() {
        let mut rooms = RoomDirectory::default();
        let conn = Uuid::new_v4();
        let project = Uuid::new_v4();

        rooms.join(conn, project);
        assert_eq!(rooms.room_count(), 1);

        assert!(rooms.leave(conn, project));
        assert_eq!(rooms.room_count(), 0);
        assert!(rooms.members(project).is_empty());
    }

    #[test]
    fn leaving_a_room_never_joined_is_a_no_op() {
        let mut rooms = RoomDirectory::default();
        assert!(!rooms.leave(Uuid::new_v4(), Uuid::new_v4()));
    }

    #[test]
    fn drop_connection_touches_only_joined_rooms() {
        let mut rooms = RoomDirectory::default();
        let conn = Uuid::new_v4();
        let bystander = Uuid::new_v4();
        let joined: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let untouched = Uuid::new_v4();

        for project in &joined {
            rooms.join(conn, *project);
        }
        rooms.join(bystander, untouched);
        rooms.join(bystander, joined[0]);

        let mut left = rooms.drop_connection(conn);
        left.sort();
        let mut expected = joined.clone();
        expected.sort();
        assert_eq!(left, expected);

        assert_eq!(rooms.members(untouched), vec![bystander]);
        assert_eq!(rooms.members(joined[0]), vec![bystander]);
        assert!(rooms.members(joined[1]).is_empty());

        // Second drop finds nothing.
        assert!(rooms.drop_connection(conn).is_empty());
    }
}
