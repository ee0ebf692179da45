//! Joint parameter identifiers and per-joint parameter sets.
//!
//! Every controllable joint axis owns a [`LimitMotor`] record. A
//! [`ParamSet`] groups the records of one joint and exposes a single keyed
//! accessor: a [`ParamId`] names both the parameter ([`ParamKind`]) and the
//! 1-based axis it applies to.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{ParamId, ParamKind, ParamScope, ParamSet};
//! use sim_types::ConstraintDefaults;
//!
//! let mut params = ParamSet::new("universal", ParamScope::LimitMotor, 2, &ConstraintDefaults::default());
//! params.set(ParamId::axis2(ParamKind::HiStop), 0.5).unwrap();
//! assert_eq!(params.get(ParamId::axis2(ParamKind::HiStop)).unwrap(), 0.5);
//!
//! // A third axis does not exist on a universal joint.
//! assert!(params.get(ParamId::axis3(ParamKind::Vel)).is_err());
//! ```

use sim_types::{ConstraintDefaults, SimError};

use crate::limits::LimitMotor;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Semantic joint parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamKind {
    /// Lower stop (m or rad). `-∞` disables it.
    LoStop,
    /// Upper stop (m or rad). `+∞` disables it.
    HiStop,
    /// Motor target velocity.
    Vel,
    /// Maximum motor force or torque. Zero disables the motor.
    FMax,
    /// Fraction of `FMax` applied when powering away from an engaged stop.
    FudgeFactor,
    /// Restitution of the stops (0 = no bounce).
    Bounce,
    /// Constraint force mixing for motor and locking rows.
    Cfm,
    /// Error reduction at the stops.
    StopErp,
    /// Constraint force mixing at the stops.
    StopCfm,
    /// Error reduction for the locking rows.
    Erp,
}

impl ParamKind {
    /// Every parameter kind, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::LoStop,
        Self::HiStop,
        Self::Vel,
        Self::FMax,
        Self::FudgeFactor,
        Self::Bounce,
        Self::Cfm,
        Self::StopErp,
        Self::StopCfm,
        Self::Erp,
    ];

    /// Parameter name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LoStop => "LoStop",
            Self::HiStop => "HiStop",
            Self::Vel => "Vel",
            Self::FMax => "FMax",
            Self::FudgeFactor => "FudgeFactor",
            Self::Bounce => "Bounce",
            Self::Cfm => "CFM",
            Self::StopErp => "StopERP",
            Self::StopCfm => "StopCFM",
            Self::Erp => "ERP",
        }
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parameter kind bound to a 1-based joint axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParamId {
    kind: ParamKind,
    axis: usize,
}

impl ParamId {
    /// Parameter `kind` on `axis` (1-based). The axis is validated by the
    /// parameter set it is used with.
    #[must_use]
    pub const fn new(kind: ParamKind, axis: usize) -> Self {
        Self { kind, axis }
    }

    /// Parameter on the first axis.
    #[must_use]
    pub const fn axis1(kind: ParamKind) -> Self {
        Self::new(kind, 1)
    }

    /// Parameter on the second axis.
    #[must_use]
    pub const fn axis2(kind: ParamKind) -> Self {
        Self::new(kind, 2)
    }

    /// Parameter on the third axis.
    #[must_use]
    pub const fn axis3(kind: ParamKind) -> Self {
        Self::new(kind, 3)
    }

    /// Semantic parameter.
    #[must_use]
    pub const fn kind(self) -> ParamKind {
        self.kind
    }

    /// 1-based axis index.
    #[must_use]
    pub const fn axis(self) -> usize {
        self.axis
    }
}

impl From<ParamKind> for ParamId {
    fn from(kind: ParamKind) -> Self {
        Self::axis1(kind)
    }
}

/// Which parameter kinds a joint variant accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamScope {
    /// Only `Erp` and `Cfm` (fixed and ball joints).
    Stabilization,
    /// Every kind: stops, motor, bounce, stabilization.
    LimitMotor,
    /// Motor parameters plus stabilization; no stops (linear motor).
    Motor,
}

impl ParamScope {
    /// Check whether `kind` is meaningful under this scope.
    #[must_use]
    pub const fn allows(self, kind: ParamKind) -> bool {
        match self {
            Self::Stabilization => matches!(kind, ParamKind::Erp | ParamKind::Cfm),
            Self::LimitMotor => true,
            Self::Motor => matches!(
                kind,
                ParamKind::Vel
                    | ParamKind::FMax
                    | ParamKind::FudgeFactor
                    | ParamKind::Cfm
                    | ParamKind::Erp
            ),
        }
    }
}

/// Parameters of one joint: one [`LimitMotor`] per controllable axis.
///
/// ERP and CFM default to the [`ConstraintDefaults`] captured at
/// construction; later changes to the world configuration do not reach an
/// existing set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParamSet {
    joint: &'static str,
    scope: ParamScope,
    axes: Vec<LimitMotor>,
}

impl ParamSet {
    /// Create a set with `axes` records for the joint kind named `joint`.
    #[must_use]
    pub fn new(
        joint: &'static str,
        scope: ParamScope,
        axes: usize,
        defaults: &ConstraintDefaults,
    ) -> Self {
        Self {
            joint,
            scope,
            axes: (0..axes.max(1)).map(|_| LimitMotor::new(defaults)).collect(),
        }
    }

    /// Number of addressable axes.
    #[must_use]
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Accepted parameter kinds.
    #[must_use]
    pub fn scope(&self) -> ParamScope {
        self.scope
    }

    /// Read a parameter.
    pub fn get(&self, id: ParamId) -> sim_types::Result<f64> {
        self.check_kind(id.kind)?;
        Ok(self.axis(id.axis)?.get(id.kind))
    }

    /// Write a parameter.
    ///
    /// # Errors
    ///
    /// Rejects an out-of-range axis, a kind the joint does not support, and
    /// values outside the parameter's domain.
    pub fn set(&mut self, id: ParamId, value: f64) -> sim_types::Result<()> {
        self.check_kind(id.kind)?;
        validate_value(id.kind, value)?;
        self.axis_mut(id.axis)?.set(id.kind, value);
        Ok(())
    }

    /// Limit/motor record of a 1-based axis.
    pub fn axis(&self, axis: usize) -> sim_types::Result<&LimitMotor> {
        let max = self.axes.len();
        axis.checked_sub(1)
            .and_then(|i| self.axes.get(i))
            .ok_or(SimError::InvalidAxis {
                joint: self.joint,
                axis,
                max,
            })
    }

    pub(crate) fn axis_mut(&mut self, axis: usize) -> sim_types::Result<&mut LimitMotor> {
        let max = self.axes.len();
        let joint = self.joint;
        axis.checked_sub(1)
            .and_then(|i| self.axes.get_mut(i))
            .ok_or(SimError::InvalidAxis { joint, axis, max })
    }

    /// Record of the 0-based axis `index`. Callers guarantee the index.
    pub(crate) fn motor(&self, index: usize) -> &LimitMotor {
        &self.axes[index]
    }

    pub(crate) fn motor_mut(&mut self, index: usize) -> &mut LimitMotor {
        &mut self.axes[index]
    }

    /// ERP used by the joint's locking rows.
    #[must_use]
    pub fn erp(&self) -> f64 {
        self.axes[0].erp()
    }

    /// CFM used by the joint's locking rows.
    #[must_use]
    pub fn cfm(&self) -> f64 {
        self.axes[0].cfm()
    }

    fn check_kind(&self, kind: ParamKind) -> sim_types::Result<()> {
        if self.scope.allows(kind) {
            Ok(())
        } else {
            Err(SimError::UnsupportedParameter {
                joint: self.joint,
                param: kind.name(),
            })
        }
    }
}

fn validate_value(kind: ParamKind, value: f64) -> sim_types::Result<()> {
    let reject = |reason| {
        Err(SimError::InvalidParameterValue {
            param: kind.name(),
            value,
            reason,
        })
    };
    match kind {
        ParamKind::LoStop | ParamKind::HiStop if value.is_nan() => reject("stop cannot be NaN"),
        ParamKind::LoStop | ParamKind::HiStop => Ok(()),
        ParamKind::Vel if !value.is_finite() => reject("must be finite"),
        ParamKind::FudgeFactor if !(0.0..=1.0).contains(&value) => {
            reject("must lie in [0, 1]")
        }
        _ if !value.is_finite() => reject("must be finite"),
        ParamKind::FMax
        | ParamKind::Bounce
        | ParamKind::Cfm
        | ParamKind::StopErp
        | ParamKind::StopCfm
        | ParamKind::Erp
            if value < 0.0 =>
        {
            reject("cannot be negative")
        }
        _ => Ok(()),
    }
}
