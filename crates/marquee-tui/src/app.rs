//! Application state management for the marquee shell.
//!
//! This module contains the `App` struct that owns the chrome state, the
//! login form and the current view. Sign-in attempts and module loads run as
//! background tasks and report back through a channel drained on the UI task.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use marquee_core::auth::gate::countdown_secs;
use marquee_core::auth::{GatePhase, GateStatus};
use marquee_core::boundary::RELOAD_KEY;
use marquee_core::modules::{ModuleDescriptor, ModuleLoadError, Mount, Navigation, LOGIN_ROUTE};
use marquee_core::{
    ApiClient, LoginError, LoginGate, Page, Preferences, Router, Session, SessionStore, SessionView, ShellConfig,
};

use crate::site;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Number of lines to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: u16 = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    LoggingIn,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// What the main content area is showing.
pub enum View {
    /// Module-specific placeholder while its load is in flight
    Loading { label: String },
    Mounted(Mount),
    LoadFailed { label: String, message: String },
    NotFound,
    SignIn,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent from background tasks back to the UI loop.
enum AppEvent {
    LoginFinished(Result<Session, LoginError>),
    ModuleLoaded {
        /// Navigation sequence number the load was started for
        seq: u64,
        label: String,
        result: Result<Mount, ModuleLoadError>,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub preferences: Preferences,
    pub sessions: Arc<SessionStore>,
    pub gate: LoginGate,
    pub router: Arc<Router>,

    // UI State
    pub state: AppState,
    pub current_path: String,
    pub view: View,
    /// Last rendered page of the current view
    pub page: Page,
    pub scroll: u16,
    pub status_message: Option<String>,

    // Login form
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    /// Outcome of the last submit, kept as the typed error
    pub login_error: Option<LoginError>,
    pub login_pending: bool,
    /// Route to open once signed in
    pub return_to: Option<String>,

    nav_seq: u64,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
}

impl App {
    pub fn new(config: ShellConfig, preferences: Preferences) -> Result<Self> {
        let state_dir = config.state_dir()?;
        let sessions = Arc::new(SessionStore::open(&state_dir));
        let api = ApiClient::from_config(&config).context("Failed to build API client")?;

        let registry = Arc::new(site::registry(&api));
        let router = Arc::new(Router::new(
            registry,
            SessionView::new(sessions.clone()),
            site::DEFAULT_ROUTE,
        ));
        let gate = LoginGate::new(config.credentials.clone(), config.lockout, sessions.clone());

        let (events_tx, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let login_username = preferences.last_username.clone().unwrap_or_default();

        Ok(Self {
            preferences,
            sessions,
            gate,
            router,

            state: AppState::Normal,
            current_path: "/".to_string(),
            view: View::NotFound,
            page: Page::default(),
            scroll: 0,
            status_message: None,

            login_username,
            login_password: String::new(),
            login_focus: LoginFocus::Username,
            login_error: None,
            login_pending: false,
            return_to: None,

            nav_seq: 0,
            events_tx,
            events_rx,
        })
    }

    /// Open the last visited route, or the default one.
    pub fn start(&mut self) {
        let route = self
            .preferences
            .last_route
            .clone()
            .unwrap_or_else(|| "/".to_string());
        self.navigate(&route);
    }

    pub fn save_preferences(&self) -> Result<()> {
        self.preferences.save()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.sessions.is_authenticated()
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.current()
    }

    pub fn gate_status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Show the login overlay.
    pub fn start_login(&mut self, return_to: Option<String>) {
        self.state = AppState::LoggingIn;
        self.return_to = return_to;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Close the login overlay without signing in.
    pub fn cancel_login(&mut self) {
        self.state = AppState::Normal;
        self.return_to = None;
        self.login_password.clear();
        self.navigate(site::DEFAULT_ROUTE);
    }

    /// Submit the login form to the gate in the background.
    pub fn attempt_login(&mut self) {
        if self.login_pending {
            return;
        }
        self.login_pending = true;
        self.login_error = None;

        let gate = self.gate.clone();
        let tx = self.events_tx.clone();
        let username = self.login_username.clone();
        let password = self.login_password.clone();
        tokio::spawn(async move {
            let result = gate.submit(&username, &password).await;
            send_event(&tx, AppEvent::LoginFinished(result)).await;
        });
    }

    /// Message for the login overlay. A running lockout shows a live countdown.
    pub fn login_message(&self) -> Option<String> {
        match self.gate_status().phase {
            GatePhase::Locked { remaining } => Some(format!(
                "Too many failed attempts. Try again in {}s.",
                countdown_secs(remaining)
            )),
            GatePhase::Authenticating => Some("Signing in...".to_string()),
            // A lock that has run out says nothing anymore
            GatePhase::Idle => match self.login_error {
                Some(LoginError::Locked { .. }) | Some(LoginError::CredentialMismatch { just_locked: true, .. }) => None,
                Some(ref e) => Some(e.user_message()),
                None => None,
            },
        }
    }

    pub fn sign_out(&mut self) {
        if let Err(e) = self.sessions.clear() {
            warn!(error = %e, "Failed to clear session");
            self.status_message = Some("Sign-out failed".to_string());
            return;
        }
        self.status_message = Some("Signed out".to_string());
        let path = self.current_path.clone();
        self.navigate(&path);
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn navigate(&mut self, path: &str) {
        self.nav_seq += 1;
        self.scroll = 0;

        match self.router.navigate(path) {
            Navigation::Login => {
                self.current_path = LOGIN_ROUTE.to_string();
                self.view = View::SignIn;
                self.start_login(None);
            }
            Navigation::RedirectToLogin { requested } => {
                self.status_message = Some("Sign in to continue".to_string());
                self.current_path = LOGIN_ROUTE.to_string();
                self.view = View::SignIn;
                self.start_login(Some(requested));
            }
            Navigation::Module { descriptor, path } => {
                self.leave_login();
                self.current_path = path.clone();
                self.preferences.last_route = Some(path.clone());
                match self.router.mount_loaded(&descriptor, &path) {
                    Some(mount) => self.view = View::Mounted(mount),
                    None => self.spawn_load(descriptor, path),
                }
            }
            Navigation::NotFound { path } => {
                self.leave_login();
                self.current_path = path;
                self.view = View::NotFound;
            }
        }
    }

    fn leave_login(&mut self) {
        if self.state == AppState::LoggingIn {
            self.state = AppState::Normal;
        }
    }

    fn spawn_load(&mut self, descriptor: Arc<ModuleDescriptor>, path: String) {
        let label = descriptor.label.clone();
        self.view = View::Loading {
            label: label.clone(),
        };

        let seq = self.nav_seq;
        let router = self.router.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = router.mount(&descriptor, &path).await;
            send_event(&tx, AppEvent::ModuleLoaded { seq, label, result }).await;
        });
    }

    /// Remount the current route. Only offered on fallback and error pages.
    pub fn reload(&mut self) {
        if self.page.has_action(RELOAD_KEY) {
            let path = self.current_path.clone();
            info!(%path, "Reloading");
            self.navigate(&path);
        }
    }

    pub fn nav_index(&self) -> Option<usize> {
        site::NAV.index_of(&self.current_path)
    }

    pub fn go_to_nav(&mut self, index: usize) {
        if let Some(target) = site::NAV.target(index) {
            self.navigate(target);
        }
    }

    pub fn next_nav(&mut self) {
        let index = match self.nav_index() {
            Some(i) => site::NAV.next(i),
            None => 0,
        };
        self.go_to_nav(index);
    }

    pub fn prev_nav(&mut self) {
        let index = match self.nav_index() {
            Some(i) => site::NAV.prev(i),
            None => site::NAV.len().saturating_sub(1),
        };
        self.go_to_nav(index);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render the current view into `page`. Called before every frame so
    /// modules always see the current session.
    pub fn refresh_page(&mut self) {
        self.page = match &mut self.view {
            View::Mounted(mount) => mount.render(self.sessions.current()),
            View::Loading { label } => site::loading_page(label),
            View::LoadFailed { label, message } => Page::new(format!("{} could not be loaded", label))
                .section(
                    None,
                    [
                        message.clone(),
                        String::new(),
                        "Press r to try again.".to_string(),
                    ],
                )
                .action(RELOAD_KEY, "Retry"),
            View::NotFound => site::shell_not_found(&self.current_path),
            View::SignIn => Page::new("Sign in").section(None, ["Sign in to continue."]),
        };
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    /// Check for completed background tasks and apply their results
    pub fn check_background_tasks(&mut self) {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        for event in events {
            self.process_event(event);
        }
    }

    fn process_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::LoginFinished(Ok(session)) => {
                self.login_pending = false;
                self.login_password.clear();
                self.preferences.last_username = Some(session.display_name.clone());
                self.status_message = Some(format!("Signed in as {}", session.display_name));
                self.state = AppState::Normal;

                let target = self
                    .return_to
                    .take()
                    .unwrap_or_else(|| site::DEFAULT_ROUTE.to_string());
                self.navigate(&target);
            }
            AppEvent::LoginFinished(Err(e)) => {
                self.login_pending = false;
                if !matches!(e, LoginError::Validation(_)) {
                    self.login_password.clear();
                }
                self.login_error = Some(e);
            }
            AppEvent::ModuleLoaded { seq, label, result } => {
                if seq != self.nav_seq {
                    debug!(module = %label, "Discarding load result for an old navigation");
                    return;
                }
                self.view = match result {
                    Ok(mount) => View::Mounted(mount),
                    Err(e) => {
                        self.status_message = Some(format!("{} is unavailable", label));
                        View::LoadFailed {
                            label,
                            message: e.to_string(),
                        }
                    }
                };
            }
        }
    }
}

async fn send_event(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
    if let Err(e) = tx.send(event).await {
        warn!(error = %e, "Failed to deliver background result");
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::auth::LockoutPolicy;
    use marquee_core::config::DemoCredentials;
    use std::time::Duration;

    fn app(dir: &tempfile::TempDir) -> App {
        let config = ShellConfig {
            credentials: DemoCredentials {
                username: "admin".to_string(),
                password: "letmein".to_string(),
            },
            lockout: LockoutPolicy {
                max_failures: 5,
                lockout: Duration::from_secs(30),
                min_latency: Duration::from_secs(1),
            },
            state_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        App::new(config, Preferences::default()).unwrap()
    }

    /// Let background tasks finish, then apply their results.
    async fn settle(app: &mut App) {
        tokio::time::sleep(Duration::from_secs(2)).await;
        app.check_background_tasks();
        tokio::time::sleep(Duration::from_millis(10)).await;
        app.check_background_tasks();
        app.refresh_page();
    }

    async fn sign_in(app: &mut App, password: &str) {
        app.login_username = "admin".to_string();
        app.login_password = password.to_string();
        app.attempt_login();
        settle(app).await;
    }

    // -------------------------------------------------------------------------
    // Navigation Tests
    // -------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_start_opens_default_route() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.start();
        assert_eq!(app.current_path, "/home");
        app.refresh_page();
        assert!(matches!(app.view, View::Loading { .. }));
        assert!(app.page.text_lines().any(|l| l == "Loading Home..."));

        settle(&mut app).await;
        assert_eq!(app.page.title, "Home");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.navigate("/pricing");
        app.refresh_page();
        assert!(matches!(app.view, View::NotFound));
        assert_eq!(app.page.title, "Page not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_nav_dispatch_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.navigate("/home");
        app.next_nav();
        assert_eq!(app.current_path, "/blog");
        app.go_to_nav(2);
        assert_eq!(app.current_path, "/industries");

        app.navigate("/home");
        app.prev_nav();
        // Labs is gated, so wrapping backwards lands on the login route
        assert_eq!(app.current_path, LOGIN_ROUTE);
        assert_eq!(app.return_to.as_deref(), Some("/labs"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_load_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.navigate("/blog");
        app.navigate("/industries");
        settle(&mut app).await;
        assert_eq!(app.current_path, "/industries");
        assert_eq!(app.page.title, "Industries");
    }

    // -------------------------------------------------------------------------
    // Sign-in Tests
    // -------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_gated_route_redirects_and_returns_after_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);

        app.navigate("/labs/dark-mode");
        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.return_to.as_deref(), Some("/labs/dark-mode"));

        sign_in(&mut app, "letmein").await;
        assert!(app.is_authenticated());
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.current_path, "/labs/dark-mode");
        assert_eq!(app.page.title, "Dark mode");
        assert_eq!(app.preferences.last_username.as_deref(), Some("admin"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sign_in_shows_remaining_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.navigate(LOGIN_ROUTE);

        sign_in(&mut app, "wrongpass").await;
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.login_password.is_empty());
        assert_eq!(
            app.login_message().as_deref(),
            Some("Invalid username or password. 4 attempts remaining.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_countdown_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.navigate(LOGIN_ROUTE);

        for _ in 0..5 {
            sign_in(&mut app, "wrongpass").await;
        }
        let message = app.login_message().unwrap();
        assert!(message.starts_with("Too many failed attempts. Try again in"), "{}", message);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(app.gate_status().phase, GatePhase::Idle);
        assert_eq!(app.login_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_from_gated_module_redirects() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.navigate(LOGIN_ROUTE);
        sign_in(&mut app, "letmein").await;

        app.navigate("/labs");
        settle(&mut app).await;
        assert_eq!(app.page.title, "Labs");

        app.sign_out();
        assert!(!app.is_authenticated());
        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.return_to.as_deref(), Some("/labs"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_page_offers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.navigate(LOGIN_ROUTE);
        sign_in(&mut app, "letmein").await;

        app.navigate("/labs/fault-injection");
        settle(&mut app).await;
        assert_eq!(app.page.title, "Labs is unavailable");
        assert!(app.page.has_action(RELOAD_KEY));

        // Other modules keep working
        app.navigate("/labs/instant-search");
        app.refresh_page();
        assert_eq!(app.page.title, "Instant search");
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_username_char() {
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(49, 'z'));
        assert!(!can_add_username_char(50, 'a'));
        assert!(!can_add_username_char(0, '\x00'));
        assert!(!can_add_username_char(0, '\n'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }
}
