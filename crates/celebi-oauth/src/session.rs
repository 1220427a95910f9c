use std::fmt;

use celebi_common::Instance;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::types::ClientRegistration;

/// Credentials of a completed login.
///
/// Only one exists at a time; a new login replaces it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "instanceURL")]
    pub instance_url: Instance,
    #[serde(rename = "accessToken")]
    pub access_token: SmolStr,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// A login in flight, rebuilt from the stores when the browser comes back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthRequestData {
    pub instance: Instance,
    pub registration: ClientRegistration,
    /// Absent when the instance did not support PKCE.
    pub verifier: Option<SmolStr>,
}

/// Where a login stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    LoggedOut,
    Registering,
    AwaitingCallback { pkce: bool },
    Exchanging,
    LoggedIn,
    Error,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::LoggedIn | FlowState::Error)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::LoggedOut => f.write_str("logged out"),
            FlowState::Registering => f.write_str("registering"),
            FlowState::AwaitingCallback { pkce: true } => {
                f.write_str("awaiting callback (pkce)")
            }
            FlowState::AwaitingCallback { pkce: false } => f.write_str("awaiting callback"),
            FlowState::Exchanging => f.write_str("exchanging"),
            FlowState::LoggedIn => f.write_str("logged in"),
            FlowState::Error => f.write_str("error"),
        }
    }
}
