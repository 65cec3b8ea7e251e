//! Cluster membership boundary.
//!
//! Discovery lives outside this crate. Whatever notices nodes coming and
//! going turns that into [`MembershipEvent`]s and hands them to a
//! [`MembershipHandler`].

use crate::error::ReplicationResult;

/// A change in cluster membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    /// A node became reachable.
    Joined {
        /// Unique node name.
        name: String,
        /// RPC address of the node.
        addr: String,
    },
    /// A node went away.
    Left {
        /// Unique node name.
        name: String,
    },
}

impl MembershipEvent {
    /// Creates a join event.
    pub fn joined(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self::Joined {
            name: name.into(),
            addr: addr.into(),
        }
    }

    /// Creates a leave event.
    pub fn left(name: impl Into<String>) -> Self {
        Self::Left { name: name.into() }
    }

    /// Returns the node the event is about.
    pub fn name(&self) -> &str {
        match self {
            Self::Joined { name, .. } | Self::Left { name } => name,
        }
    }

    /// Routes the event to the matching handler method.
    ///
    /// # Errors
    ///
    /// Returns whatever the handler returns.
    pub fn dispatch<H: MembershipHandler + ?Sized>(&self, handler: &H) -> ReplicationResult<()> {
        match self {
            Self::Joined { name, addr } => handler.join(name, addr),
            Self::Left { name } => handler.leave(name),
        }
    }
}

/// Reacts to nodes joining and leaving.
pub trait MembershipHandler: Send + Sync {
    /// A node joined.
    fn join(&self, name: &str, addr: &str) -> ReplicationResult<()>;

    /// A node left.
    fn leave(&self, name: &str) -> ReplicationResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl MembershipHandler for Recorder {
        fn join(&self, name: &str, addr: &str) -> ReplicationResult<()> {
            self.calls.lock().push(format!("join {name} {addr}"));
            Ok(())
        }

        fn leave(&self, name: &str) -> ReplicationResult<()> {
            self.calls.lock().push(format!("leave {name}"));
            Ok(())
        }
    }

    #[test]
    fn dispatch_routes_events() {
        let recorder = Recorder::default();
        MembershipEvent::joined("b", "127.0.0.1:8401")
            .dispatch(&recorder)
            .unwrap();
        MembershipEvent::left("b").dispatch(&recorder).unwrap();

        assert_eq!(
            *recorder.calls.lock(),
            vec!["join b 127.0.0.1:8401".to_string(), "leave b".to_string()]
        );
    }

    #[test]
    fn event_name() {
        assert_eq!(MembershipEvent::joined("a", "x").name(), "a");
        assert_eq!(MembershipEvent::left("c").name(), "c");
    }
}
