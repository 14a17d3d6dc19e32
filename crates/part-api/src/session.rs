//! Authentication state owned by a client instance.

use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between two revalidation probes.
pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Tri-state authentication flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// Nothing observed yet.
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl AuthStatus {
    /// `Some(flag)` once the status is known.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Authenticated => Some(true),
            Self::Unauthenticated => Some(false),
        }
    }
}

/// Flag, token and last revalidation time.
///
/// The flag and token only change together through [`Session::mark_authenticated`]
/// and [`Session::mark_unauthenticated`], so an authenticated session always
/// carries a token and an unauthenticated one never does.
#[derive(Debug, Clone)]
pub struct Session {
    status: AuthStatus,
    token: Option<String>,
    last_check: Option<Instant>,
    min_interval: Duration,
}

impl Session {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            status: AuthStatus::Unknown,
            token: None,
            last_check: None,
            min_interval,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn last_check(&self) -> Option<Instant> {
        self.last_check
    }

    pub fn mark_authenticated(&mut self, token: String) {
        self.status = AuthStatus::Authenticated;
        self.token = Some(token);
    }

    pub fn mark_unauthenticated(&mut self) {
        self.status = AuthStatus::Unauthenticated;
        self.token = None;
    }

    /// Rate gate for revalidation.
    ///
    /// Returns `false` when the previous check started less than the minimum
    /// interval before `now`. Otherwise records `now` as the latest check and
    /// returns `true`; the caller must then issue exactly one probe.
    pub fn begin_check(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_check
            && (now < last || now.duration_since(last) < self.min_interval)
        {
            return false;
        }
        self.last_check = Some(now);
        true
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_REVALIDATE_INTERVAL)
    }
}
