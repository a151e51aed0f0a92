//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the arm software: the
//! arm command language, the wire representation of commands sent to the arm
//! and the transport abstraction the dispatcher writes through.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm command language and joint catalog
pub mod tc;

/// Wire definitions for equipment (the arm itself)
pub mod eqpt;

/// Transport module
pub mod net;
