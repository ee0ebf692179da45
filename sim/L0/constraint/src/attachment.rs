//! Joint attachment records and the body views joints compute against.

use sim_types::{BodyId, JointId, RigidBodyState, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One end of a joint: the joint handle plus the body on that side.
///
/// `body == None` stands for the static world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointNode {
    /// Joint this node belongs to.
    pub joint: JointId,
    /// Body at this end.
    pub body: Option<BodyId>,
}

/// The two nodes linking a joint to its bodies.
///
/// Node 0 always names a real body; node 1 may be the static world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attachment {
    nodes: [JointNode; 2],
}

impl Attachment {
    /// Link `joint` to `first` and, optionally, `second`.
    ///
    /// # Errors
    ///
    /// Rejects attaching a body to itself.
    pub fn new(joint: JointId, first: BodyId, second: Option<BodyId>) -> sim_types::Result<Self> {
        if second == Some(first) {
            return Err(SimError::invalid_attachment(format!(
                "{joint} cannot attach {first} to itself"
            )));
        }
        Ok(Self {
            nodes: [
                JointNode {
                    joint,
                    body: Some(first),
                },
                JointNode {
                    joint,
                    body: second,
                },
            ],
        })
    }

    /// Both nodes.
    #[must_use]
    pub fn nodes(&self) -> &[JointNode; 2] {
        &self.nodes
    }

    /// Joint handle.
    #[must_use]
    pub fn joint(&self) -> JointId {
        self.nodes[0].joint
    }

    /// First body.
    #[must_use]
    pub fn first(&self) -> Option<BodyId> {
        self.nodes[0].body
    }

    /// Second body, `None` for the static world.
    #[must_use]
    pub fn second(&self) -> Option<BodyId> {
        self.nodes[1].body
    }

    /// Check whether `body` is at either end.
    #[must_use]
    pub fn involves(&self, body: BodyId) -> bool {
        self.nodes.iter().any(|n| n.body == Some(body))
    }

    /// Node at the far end from `body`, if `body` is attached.
    #[must_use]
    pub fn other_node(&self, body: BodyId) -> Option<&JointNode> {
        if self.nodes[0].body == Some(body) {
            Some(&self.nodes[1])
        } else if self.nodes[1].body == Some(body) {
            Some(&self.nodes[0])
        } else {
            None
        }
    }
}

/// Borrowed view of the bodies a joint is attached to.
///
/// The empty pair describes a detached joint. A pair with only `first` is a
/// joint attached to the static world.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyPair<'a> {
    first: Option<&'a RigidBodyState>,
    second: Option<&'a RigidBodyState>,
}

impl<'a> BodyPair<'a> {
    /// Bodies of an attached joint.
    #[must_use]
    pub fn new(first: &'a RigidBodyState, second: Option<&'a RigidBodyState>) -> Self {
        Self {
            first: Some(first),
            second,
        }
    }

    /// Joint between `first` and the static world.
    #[must_use]
    pub fn to_world(first: &'a RigidBodyState) -> Self {
        Self::new(first, None)
    }

    /// Two dynamic bodies.
    #[must_use]
    pub fn between(first: &'a RigidBodyState, second: &'a RigidBodyState) -> Self {
        Self::new(first, Some(second))
    }

    /// No bodies.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Check whether a first body is present.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.first.is_some()
    }

    /// First body.
    #[must_use]
    pub fn first(&self) -> Option<&'a RigidBodyState> {
        self.first
    }

    /// Second body.
    #[must_use]
    pub fn second(&self) -> Option<&'a RigidBodyState> {
        self.second
    }

    /// Both bodies, or `NotAttached` naming `joint`.
    pub(crate) fn require(
        &self,
        joint: &'static str,
    ) -> sim_types::Result<(&'a RigidBodyState, Option<&'a RigidBodyState>)> {
        self.first
            .map(|first| (first, self.second))
            .ok_or(SimError::NotAttached { joint })
    }
}
