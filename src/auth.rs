//! Session authentication level.
//!
//! The server grants one of three levels, chosen by the login name passed to
//! `Authenticate`. [`AuthGate`] remembers the level held by the session and
//! skips the round trip when that level already covers the request.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use tokio::sync::Mutex;

use crate::codec::Value;
use crate::connection::Connection;
use crate::error::{GbxError, Result};
use crate::marshal::FromValue;

/// Authentication level, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthLevel {
    None = -1,
    User = 0,
    Admin = 1,
    SuperAdmin = 2,
}

impl AuthLevel {
    /// Level granted by a login name.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `login` is not `SuperAdmin`, `Admin` or `User`.
    pub fn from_login(login: &str) -> Result<Self> {
        match login {
            "SuperAdmin" => Ok(AuthLevel::SuperAdmin),
            "Admin" => Ok(AuthLevel::Admin),
            "User" => Ok(AuthLevel::User),
            other => Err(GbxError::InvalidArgument(format!(
                "unknown login {:?}, expected SuperAdmin, Admin or User",
                other
            ))),
        }
    }

    /// Login name granting this level.
    pub fn login(self) -> Option<&'static str> {
        match self {
            AuthLevel::None => None,
            AuthLevel::User => Some("User"),
            AuthLevel::Admin => Some("Admin"),
            AuthLevel::SuperAdmin => Some("SuperAdmin"),
        }
    }

    fn from_i32(level: i32) -> Self {
        match level {
            0 => AuthLevel::User,
            1 => AuthLevel::Admin,
            2 => AuthLevel::SuperAdmin,
            _ => AuthLevel::None,
        }
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.login().unwrap_or("None"))
    }
}

/// Tracks the session level and serializes authentication.
pub struct AuthGate {
    level: AtomicI32,
    serial: Mutex<()>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self {
            level: AtomicI32::new(AuthLevel::None as i32),
            serial: Mutex::new(()),
        }
    }

    /// Level currently held.
    pub fn level(&self) -> AuthLevel {
        AuthLevel::from_i32(self.level.load(Ordering::Acquire))
    }

    /// Authenticate as `login` unless the session already holds that level.
    ///
    /// The level only changes when the server accepts the credentials.
    /// Concurrent calls run one at a time, so a second caller sees the level
    /// the first one obtained.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an unknown login name, before any I/O
    /// - `Fault` if the server rejects the credentials
    pub async fn authenticate(
        &self,
        connection: &Connection,
        login: &str,
        password: &str,
    ) -> Result<AuthLevel> {
        let requested = AuthLevel::from_login(login)?;
        let _serial = self.serial.lock().await;

        let current = self.level();
        if current >= requested {
            tracing::debug!("Already authenticated as {}, skipping {}", current, requested);
            return Ok(current);
        }

        let reply = connection
            .query(
                "Authenticate",
                &[Value::from(login), Value::from(password)],
            )
            .await?;
        if !bool::from_value(reply)? {
            return Err(GbxError::Protocol(format!(
                "Authenticate as {} returned false",
                login
            )));
        }

        self.level.store(requested as i32, Ordering::Release);
        tracing::info!("Authenticated as {}", requested);
        Ok(requested)
    }

    /// Note a call that needs `required`; the server has the final word.
    pub fn check(&self, method: &str, required: AuthLevel) {
        let current = self.level();
        if current < required {
            tracing::debug!(
                "{} needs {} but the session holds {}",
                method,
                required,
                current
            );
        }
    }
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}
