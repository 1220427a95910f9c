//! OAuth scopes understood by Mastodon-compatible instance APIs.
//!
//! Scopes are colon-separated, broadest first:
//! - `read`, `write`: top-level access, optionally narrowed to one resource
//!   (`read:statuses`, `write:media`)
//! - `follow`: legacy relationship management scope
//! - `push`: Web Push subscriptions
//! - `profile`: only the authenticated account's own profile
//! - `admin:read`, `admin:write`: moderation API, optionally narrowed
//!   (`admin:read:accounts`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use smol_str::{SmolStr, ToSmolStr};

/// The scopes requested when nothing else is configured.
pub const DEFAULT_SCOPES: &str = "read write follow push";

/// A single instance API scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Read access, optionally limited to one resource
    Read(Option<SmolStr>),
    /// Write access, optionally limited to one resource
    Write(Option<SmolStr>),
    /// Legacy follow scope
    Follow,
    /// Web Push subscriptions
    Push,
    /// The authenticated account's own profile
    Profile,
    /// Moderation API access
    Admin(AdminScope),
}

/// Admin scope attributes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdminScope {
    /// The action permission level
    pub action: AdminAction,
    /// Resource the scope is limited to, `None` for all of them
    pub resource: Option<SmolStr>,
}

/// Admin action permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdminAction {
    /// Read-only access
    Read,
    /// Write access
    Write,
}

impl AdminAction {
    fn as_str(&self) -> &'static str {
        match self {
            AdminAction::Read => "read",
            AdminAction::Write => "write",
        }
    }
}

fn parse_resource(resource: &str) -> Result<SmolStr, ParseError> {
    if !resource.is_empty()
        && resource
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == '_')
    {
        Ok(resource.to_smolstr())
    } else {
        Err(ParseError::InvalidResource(resource.to_string()))
    }
}

impl Scope {
    /// Parse multiple space-separated scopes
    ///
    /// # Examples
    /// ```
    /// # use celebi_oauth::scopes::Scope;
    /// let scopes = Scope::parse_multiple("read write follow push").unwrap();
    /// assert_eq!(scopes.len(), 4);
    /// ```
    pub fn parse_multiple(s: &str) -> Result<Vec<Self>, ParseError> {
        s.split_whitespace().map(Self::parse).collect()
    }

    /// Parse multiple space-separated scopes and return the minimal set needed
    ///
    /// Duplicates and scopes already granted by a broader one in the list are
    /// dropped.
    ///
    /// # Examples
    /// ```
    /// # use celebi_oauth::scopes::Scope;
    /// // read grants read:statuses, so only read is kept
    /// let scopes = Scope::parse_multiple_reduced("read:statuses read push").unwrap();
    /// assert_eq!(scopes.len(), 2);
    /// ```
    pub fn parse_multiple_reduced(s: &str) -> Result<Vec<Self>, ParseError> {
        Ok(Self::reduce(Self::parse_multiple(s)?))
    }

    /// Drop duplicates and scopes granted by another scope in the list.
    pub fn reduce(scopes: Vec<Self>) -> Vec<Self> {
        let mut result: Vec<Self> = Vec::new();
        for scope in scopes {
            if result.iter().any(|existing| existing.grants(&scope)) {
                continue;
            }
            result.retain(|existing| !scope.grants(existing));
            result.push(scope);
        }
        result
    }

    /// Serialize a list of scopes into a space-separated OAuth scopes string
    ///
    /// Scopes keep the order they were given in; repeats after the first are
    /// dropped.
    ///
    /// # Examples
    /// ```
    /// # use celebi_oauth::scopes::Scope;
    /// let scopes = Scope::parse_multiple("write read push read").unwrap();
    /// assert_eq!(Scope::serialize_multiple(&scopes), "write read push");
    /// ```
    pub fn serialize_multiple(scopes: &[Self]) -> SmolStr {
        let mut serialized: Vec<String> = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let scope = scope.to_string();
            if !serialized.contains(&scope) {
                serialized.push(scope);
            }
        }
        serialized.join(" ").into()
    }

    /// Parse a scope from a string
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let mut parts = s.split(':');
        let prefix = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        match (prefix, rest.as_slice()) {
            ("read", []) => Ok(Scope::Read(None)),
            ("read", [resource]) => Ok(Scope::Read(Some(parse_resource(resource)?))),
            ("write", []) => Ok(Scope::Write(None)),
            ("write", [resource]) => Ok(Scope::Write(Some(parse_resource(resource)?))),
            ("follow", []) => Ok(Scope::Follow),
            ("push", []) => Ok(Scope::Push),
            ("profile", []) => Ok(Scope::Profile),
            ("admin", []) => Err(ParseError::MissingAction),
            ("admin", [action, resource @ ..]) => {
                let action = match *action {
                    "read" => AdminAction::Read,
                    "write" => AdminAction::Write,
                    other => return Err(ParseError::InvalidAction(other.to_string())),
                };
                let resource = match resource {
                    [] => None,
                    [resource] => Some(parse_resource(resource)?),
                    _ => return Err(ParseError::TooManyParts(s.to_string())),
                };
                Ok(Scope::Admin(AdminScope { action, resource }))
            }
            ("read" | "write" | "follow" | "push" | "profile", _) => {
                Err(ParseError::TooManyParts(s.to_string()))
            }
            (other, _) => Err(ParseError::UnknownScope(other.to_string())),
        }
    }

    /// Check if this scope grants the permissions of another scope
    pub fn grants(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::Read(None), Scope::Read(_)) => true,
            (Scope::Write(None), Scope::Write(_)) => true,
            (Scope::Read(Some(a)), Scope::Read(Some(b))) => a == b,
            (Scope::Write(Some(a)), Scope::Write(Some(b))) => a == b,
            // verify_credentials is covered by read:accounts
            (Scope::Read(None), Scope::Profile) => true,
            (Scope::Read(Some(resource)), Scope::Profile) => resource == "accounts",
            (Scope::Admin(a), Scope::Admin(b)) => {
                a.action == b.action
                    && match (&a.resource, &b.resource) {
                        (None, _) => true,
                        (Some(ra), Some(rb)) => ra == rb,
                        (Some(_), None) => false,
                    }
            }
            (a, b) => a == b,
        }
    }
}

impl FromStr for Scope {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::parse(s)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Read(None) => f.write_str("read"),
            Scope::Read(Some(resource)) => write!(f, "read:{resource}"),
            Scope::Write(None) => f.write_str("write"),
            Scope::Write(Some(resource)) => write!(f, "write:{resource}"),
            Scope::Follow => f.write_str("follow"),
            Scope::Push => f.write_str("push"),
            Scope::Profile => f.write_str("profile"),
            Scope::Admin(AdminScope {
                action,
                resource: None,
            }) => write!(f, "admin:{}", action.as_str()),
            Scope::Admin(AdminScope {
                action,
                resource: Some(resource),
            }) => write!(f, "admin:{}:{resource}", action.as_str()),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value: SmolStr = Deserialize::deserialize(deserializer)?;
        Scope::parse(&value).map_err(D::Error::custom)
    }
}

/// Error type for scope parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum ParseError {
    /// Unknown scope prefix
    #[error("unknown scope: {0}")]
    #[diagnostic(
        code(celebi_oauth::scopes::unknown),
        help("known scopes: read, write, follow, push, profile, admin:read, admin:write")
    )]
    UnknownScope(String),
    /// `admin` without `:read` or `:write`
    #[error("admin scope needs an action")]
    #[diagnostic(code(celebi_oauth::scopes::missing_action))]
    MissingAction,
    /// Invalid admin action
    #[error("invalid admin action: {0}")]
    #[diagnostic(code(celebi_oauth::scopes::invalid_action))]
    InvalidAction(String),
    /// Invalid resource name
    #[error("invalid resource: {0}")]
    #[diagnostic(code(celebi_oauth::scopes::invalid_resource))]
    InvalidResource(String),
    /// More colon-separated parts than the scope allows
    #[error("too many parts in scope: {0}")]
    #[diagnostic(code(celebi_oauth::scopes::too_many_parts))]
    TooManyParts(String),
}
