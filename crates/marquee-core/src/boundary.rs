//! Crash boundary around a rendering scope.
//!
//! A boundary starts `Healthy` and renders its children. The first error or
//! panic raised while rendering moves it to `Faulted` for good: the crash is
//! recorded, a fallback page with a reload action is shown, and the children
//! are never rendered again by this boundary. Recovery means a fresh mount.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::error;

use crate::modules::Page;

/// Key bound to the reload action on fallback pages.
pub const RELOAD_KEY: char = 'r';

thread_local! {
    /// Backtrace of the most recent panic on this thread, left by the hook.
    static LAST_PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Route panic reports into the log and keep their backtraces for the
/// boundary that catches them.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture().to_string();
        error!(panic = %info, "Panic during execution");
        LAST_PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
    }));
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub message: String,
    pub stack: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryState {
    Healthy,
    Faulted(CrashReport),
}

pub struct CrashBoundary {
    scope: String,
    state: BoundaryState,
}

impl CrashBoundary {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            state: BoundaryState::Healthy,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.state, BoundaryState::Faulted(_))
    }

    pub fn report(&self) -> Option<&CrashReport> {
        match &self.state {
            BoundaryState::Faulted(report) => Some(report),
            BoundaryState::Healthy => None,
        }
    }

    /// Render the wrapped scope, or the fallback once faulted.
    pub fn render<F>(&mut self, render: F) -> Page
    where
        F: FnOnce() -> Result<Page>,
    {
        if let BoundaryState::Faulted(ref report) = self.state {
            return self.fallback(report);
        }

        let report = match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(Ok(page)) => return page,
            Ok(Err(e)) => CrashReport {
                message: format!("{:#}", e),
                stack: e.backtrace().to_string(),
                occurred_at: Utc::now(),
            },
            Err(payload) => CrashReport {
                message: panic_message(payload.as_ref()),
                stack: LAST_PANIC_BACKTRACE
                    .with(|slot| slot.borrow_mut().take())
                    .unwrap_or_else(|| "<backtrace unavailable>".to_string()),
                occurred_at: Utc::now(),
            },
        };

        error!(scope = %self.scope, message = %report.message, "Render crash contained");
        let page = self.fallback(&report);
        self.state = BoundaryState::Faulted(report);
        page
    }

    fn fallback(&self, report: &CrashReport) -> Page {
        Page::new(format!("{} is unavailable", self.scope))
            .section(
                Some("Something went wrong while displaying this section."),
                [
                    "The rest of the site is still available.".to_string(),
                    String::new(),
                    format!("Error: {}", report.message),
                    format!("At: {}", report.occurred_at.format("%Y-%m-%d %H:%M:%S UTC")),
                ],
            )
            .action(RELOAD_KEY, "Reload")
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
