//! Integration tests for the sim-* crate ecosystem.
//!
//! These tests exercise joints end-to-end through a world and the stepper:
//! - Read-back idempotence of anchors and axes (two-rig scenario)
//! - Body-order symmetry of every constraint
//! - Stabilization bias and parameter snapshots
//! - Analytic position rates against finite differences
//! - Stop classification and linear motor row counts
//! - World lifecycle while joints are live

pub mod body_swap_symmetry;
pub mod position_rates;
pub mod stabilization_bias;
pub mod stop_limits;
pub mod two_rig_scenario;
pub mod universal_offsets;
pub mod world_lifecycle;
