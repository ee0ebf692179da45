//! Error types for simulation operations.

use thiserror::Error;

use crate::{BodyId, JointId, WorldId};

/// Errors that can occur while building or stepping a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Body handle does not name a live body.
    #[error("invalid body ID: {0}")]
    InvalidBodyId(BodyId),

    /// Joint handle does not name a live joint.
    #[error("invalid joint ID: {0}")]
    InvalidJointId(JointId),

    /// Handle refers to an entity that has been destroyed.
    #[error("stale handle: {handle} was destroyed")]
    StaleHandle {
        /// Display form of the stale handle.
        handle: String,
    },

    /// Handle belongs to a different world.
    #[error("handle {handle} belongs to {owner}, not {world}")]
    ForeignHandle {
        /// Display form of the offending handle.
        handle: String,
        /// World that issued the handle.
        owner: WorldId,
        /// World the operation was invoked on.
        world: WorldId,
    },

    /// Axis index outside the joint's supported range.
    #[error("axis {axis} out of range for {joint} joint (valid: 1..={max})")]
    InvalidAxis {
        /// Joint kind name.
        joint: &'static str,
        /// The rejected 1-based axis index.
        axis: usize,
        /// Highest valid axis index.
        max: usize,
    },

    /// Parameter kind not applicable to this joint kind.
    #[error("parameter {param} is not supported by {joint} joint")]
    UnsupportedParameter {
        /// Joint kind name.
        joint: &'static str,
        /// Parameter name.
        param: &'static str,
    },

    /// Parameter value rejected (non-finite, negative where not allowed).
    #[error("invalid value {value} for parameter {param}: {reason}")]
    InvalidParameterValue {
        /// Parameter name.
        param: &'static str,
        /// The rejected value.
        value: f64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Operation addressed a joint of a different kind.
    #[error("joint type mismatch: expected {expected}, found {actual}")]
    JointTypeMismatch {
        /// Requested joint kind.
        expected: &'static str,
        /// Actual joint kind.
        actual: &'static str,
    },

    /// Joint operation requires attached bodies.
    #[error("{joint} joint is not attached to a body")]
    NotAttached {
        /// Joint kind name.
        joint: &'static str,
    },

    /// Joint is already attached.
    #[error("joint {0} is already attached; detach it first")]
    AlreadyAttached(JointId),

    /// Attachment request is malformed.
    #[error("invalid attachment: {reason}")]
    InvalidAttachment {
        /// Description of the problem.
        reason: String,
    },

    /// Axis read before it was ever set.
    #[error("axis {axis} of {joint} joint has not been set")]
    AxisNotSet {
        /// Joint kind name.
        joint: &'static str,
        /// 1-based axis index.
        axis: usize,
    },

    /// Axis vector is zero-length, non-finite or otherwise unusable.
    #[error("degenerate axis: {reason}")]
    DegenerateAxis {
        /// Description of the degeneracy.
        reason: String,
    },

    /// Operation not offered by this joint kind.
    #[error("{operation} is not supported by {joint} joint")]
    UnsupportedOperation {
        /// Joint kind name.
        joint: &'static str,
        /// Operation name.
        operation: &'static str,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create a degenerate axis error.
    #[must_use]
    pub fn degenerate_axis(reason: impl Into<String>) -> Self {
        Self::DegenerateAxis {
            reason: reason.into(),
        }
    }

    /// Create an invalid attachment error.
    #[must_use]
    pub fn invalid_attachment(reason: impl Into<String>) -> Self {
        Self::InvalidAttachment {
            reason: reason.into(),
        }
    }

    /// Create a not-attached error for the named joint kind.
    #[must_use]
    pub fn not_attached(joint: &'static str) -> Self {
        Self::NotAttached { joint }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidTimestep(_))
    }

    /// Check if the caller passed an argument the operation cannot accept.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidAxis { .. }
                | Self::UnsupportedParameter { .. }
                | Self::InvalidParameterValue { .. }
                | Self::JointTypeMismatch { .. }
                | Self::InvalidAttachment { .. }
                | Self::UnsupportedOperation { .. }
        )
    }

    /// Check if the operation was invoked in the wrong lifecycle state.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::NotAttached { .. } | Self::AlreadyAttached(_) | Self::AxisNotSet { .. }
        )
    }

    /// Check if this error names a destroyed or foreign entity.
    #[must_use]
    pub fn is_handle_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBodyId(_)
                | Self::InvalidJointId(_)
                | Self::StaleHandle { .. }
                | Self::ForeignHandle { .. }
        )
    }
}
