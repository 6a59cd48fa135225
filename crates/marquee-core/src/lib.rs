//! Core of the marquee shell: login gate, session store, lazy module
//! registry, crash boundary and the bounded HTTP client. Shared by the
//! terminal front end and usable without a terminal.

pub mod api;
pub mod auth;
pub mod boundary;
pub mod config;
pub mod modules;

pub use api::{ApiClient, ApiError, Payload};
pub use auth::{LoginError, LoginGate, Session, SessionStore, SessionView};
pub use boundary::{CrashBoundary, CrashReport};
pub use config::{Preferences, ShellConfig};
pub use modules::{ModuleRegistry, Page, Router};
