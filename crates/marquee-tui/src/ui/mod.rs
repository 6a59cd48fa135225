//! Terminal UI module using ratatui.
//!
//! This module provides the TUI rendering and input handling:
//!
//! - `render`: Chrome (title bar, navigation, status bar), page body, overlays
//! - `input`: Keyboard event handling
//! - `styles`: Color palette and text styling

pub mod input;
pub mod render;
pub mod styles;
