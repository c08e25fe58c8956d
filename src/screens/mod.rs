//! Screen controllers
//!
//! Each screen owns its state explicitly and is driven by the caller:
//! issue a request (getting a ticket), run it against the `WardService`,
//! then hand the response back. Responses carrying a superseded ticket are
//! dropped, so a slow reply never overwrites newer state.
//!
//! These are the library-level controllers for an interactive front end
//! that keeps state between requests. The HTTP service in `api::rest` is
//! stateless per request: it calls `WardService` directly and shares only
//! `RosterEntry` and the failure messages defined here.

pub mod census;
pub mod discharge;
pub mod sequence;

pub use census::CensusScreen;
pub use discharge::{DischargeScreen, RosterEntry};
pub use sequence::{RequestSequence, Ticket};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}
