//! Authentication module for the demo gate and the persisted session.
//!
//! This module provides:
//! - `LoginGate`: credential check against a fixed reference pair, with a
//!   timed lockout after too many consecutive failures
//! - `SessionStore`: the persisted session record and its lifecycle
//!
//! The gate is a local demo gate, not a security boundary.

pub mod gate;
pub mod session;

pub use gate::{GatePhase, GateStatus, LockoutPolicy, LoginError, LoginGate};
pub use session::{Session, SessionError, SessionStore, SessionView};
