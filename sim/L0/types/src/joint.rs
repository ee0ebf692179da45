//! Joint handle type.

use crate::WorldId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle to a joint stored in a world arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointId {
    world: WorldId,
    index: u32,
    generation: u32,
}

impl JointId {
    /// Create a joint handle. Worlds call this; applications receive handles
    /// from `World::create_joint`.
    #[must_use]
    pub const fn new(world: WorldId, index: u32, generation: u32) -> Self {
        Self {
            world,
            index,
            generation,
        }
    }

    /// World that issued this handle.
    #[must_use]
    pub const fn world(self) -> WorldId {
        self.world
    }

    /// Arena slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Joint({}v{})", self.index, self.generation)
    }
}
