//! Joined workspace and project rooms.

use events::Outbound;
use std::collections::BTreeSet;
use std::fmt;

/// A server-side broadcast group the client has asked to be part of.
///
/// Workspaces order before projects, so a replay re-enters the broader room first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Room {
    Workspace(String),
    Project(String),
}

impl Room {
    pub fn join_message(&self) -> Outbound {
        match self {
            Room::Workspace(gid) => Outbound::JoinWorkspace {
                workspace_gid: gid.clone(),
            },
            Room::Project(gid) => Outbound::JoinProject {
                project_gid: gid.clone(),
            },
        }
    }

    /// Workspaces have no leave event; membership ends with the connection.
    pub fn leave_message(&self) -> Option<Outbound> {
        match self {
            Room::Workspace(_) => None,
            Room::Project(gid) => Some(Outbound::LeaveProject {
                project_gid: gid.clone(),
            }),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Room::Workspace(gid) => write!(f, "workspace_{}", gid),
            Room::Project(gid) => write!(f, "project_{}", gid),
        }
    }
}

/// Rooms to re-assert after every successful (re)connect.
#[derive(Debug, Default, Clone)]
pub struct RoomSet {
    rooms: BTreeSet<Room>,
}

impl RoomSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the intent to be in `room`; returns `false` if it was already recorded.
    pub fn join(&mut self, room: Room) -> bool {
        self.rooms.insert(room)
    }

    /// Forget `room`; returns `false` if it was never recorded.
    pub fn leave(&mut self, room: &Room) -> bool {
        self.rooms.remove(room)
    }

    pub fn contains(&self, room: &Room) -> bool {
        self.rooms.contains(room)
    }

    /// The join events that re-establish every recorded room.
    pub fn replay(&self) -> Vec<Outbound> {
        self.rooms.iter().map(Room::join_message).collect()
    }

    pub fn snapshot(&self) -> Vec<Room> {
        self.rooms.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_joins_workspaces_before_projects() {
        let mut rooms = RoomSet::new();
        rooms.join(Room::Project("p-2".to_string()));
        rooms.join(Room::Workspace("w-1".to_string()));
        rooms.join(Room::Project("p-1".to_string()));

        assert_eq!(
            rooms.replay(),
            vec![
                Outbound::JoinWorkspace {
                    workspace_gid: "w-1".to_string()
                },
                Outbound::JoinProject {
                    project_gid: "p-1".to_string()
                },
                Outbound::JoinProject {
                    project_gid: "p-2".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_join_and_leave_are_idempotent() {
        let mut rooms = RoomSet::new();
        let project = Room::Project("p-1".to_string());

        assert!(rooms.join(project.clone()));
        assert!(!rooms.join(project.clone()));
        assert_eq!(rooms.len(), 1);

        assert!(rooms.leave(&project));
        assert!(!rooms.leave(&project));
        assert!(rooms.is_empty());
    }

    #[test]
    fn test_room_names_match_server_groups() {
        assert_eq!(Room::Project("p-1".to_string()).to_string(), "project_p-1");
        assert_eq!(Room::Workspace("w-1".to_string()).to_string(), "workspace_w-1");
        assert_eq!(Room::Workspace("w-1".to_string()).leave_message(), None);
    }
}
