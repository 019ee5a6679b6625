//! Authorization failures surfaced to request-handling code.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a request was refused. Each reason maps to an HTTP-like status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeniedReason {
    /// The caller must authenticate first.
    LoginPage,
    /// Only operators may proceed.
    OpOnly,
    /// The caller lacks a specific permission.
    Denied,
}

impl DeniedReason {
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::LoginPage => 401,
            Self::OpOnly | Self::Denied => 403,
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            Self::LoginPage => "you must be logged in to view this page",
            Self::OpOnly => "this page is only available to operators",
            Self::Denied => "you do not have permission to view this page",
        }
    }
}

impl fmt::Display for DeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status_code(), self.message())
    }
}

/// An authorization failure. Routine and recoverable: never log it as an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", describe(.reason, .permission.as_deref()))]
pub struct PermissionDenied {
    pub reason: DeniedReason,
    /// The missing permission, only for [`DeniedReason::Denied`].
    pub permission: Option<String>,
}

impl PermissionDenied {
    pub fn login_page() -> Self {
        Self {
            reason: DeniedReason::LoginPage,
            permission: None,
        }
    }

    pub fn op_only() -> Self {
        Self {
            reason: DeniedReason::OpOnly,
            permission: None,
        }
    }

    /// Denial without naming the missing permission.
    pub fn denied() -> Self {
        Self {
            reason: DeniedReason::Denied,
            permission: None,
        }
    }

    pub fn missing(permission: impl Into<String>) -> Self {
        Self {
            reason: DeniedReason::Denied,
            permission: Some(permission.into()),
        }
    }

    pub const fn status_code(&self) -> u16 {
        self.reason.status_code()
    }
}

fn describe(reason: &DeniedReason, permission: Option<&str>) -> String {
    match permission {
        Some(permission) => format!("permission denied ({reason}): missing {permission}"),
        None => format!("permission denied ({reason})"),
    }
}
