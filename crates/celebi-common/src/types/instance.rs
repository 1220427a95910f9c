use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::{SmolStr, ToSmolStr};
use std::fmt;
use std::{ops::Deref, str::FromStr};
use url::Url;

/// Bare hostname (optionally with a port) of a fediverse instance.
///
/// Never carries a scheme, a trailing slash or an account handle prefix. It is
/// the cache key for app registrations and the authority of every request made
/// to the instance.
#[derive(Clone, PartialEq, Eq, Serialize, Hash, PartialOrd, Ord)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Instance(SmolStr);

/// Errors from [`Instance::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum InstanceError {
    /// Nothing left after normalization
    #[error("instance identifier is empty")]
    #[diagnostic(
        code(celebi::instance::empty),
        help("enter the address of your server, e.g. `mastodon.social`")
    )]
    Empty,
    /// Something left, but not a bare `host[:port]`
    #[error("`{input}` is not a valid instance: {reason}")]
    #[diagnostic(
        code(celebi::instance::invalid),
        help("enter only the server's host name, e.g. `mastodon.social`")
    )]
    Invalid {
        /// What the user supplied
        input: SmolStr,
        /// Why it was rejected
        reason: SmolStr,
    },
}

impl InstanceError {
    fn invalid(input: &str, reason: &'static str) -> Self {
        Self::Invalid {
            input: input.to_smolstr(),
            reason: SmolStr::new_static(reason),
        }
    }
}

/// Strip everything up to and including the first `@` of an account handle,
/// accepting both `@user@host` and `user@host`.
fn strip_handle_prefix(input: &str) -> &str {
    let rest = input.strip_prefix('@').unwrap_or(input);
    match rest.find('@') {
        Some(idx) if idx > 0 => &rest[idx + 1..],
        _ => input,
    }
}

fn strip_scheme(input: &str) -> &str {
    input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
        .unwrap_or(input)
}

impl Instance {
    /// Canonicalize a user-supplied server identifier.
    ///
    /// In order: trim, strip a leading `http://`/`https://`, strip trailing
    /// slashes, strip a leading `@user@` handle prefix, trim again. The result
    /// must be non-empty and usable as the authority of an `https` URL.
    ///
    /// ```
    /// # use celebi_common::Instance;
    /// let a = Instance::normalize("https://mastodon.example/").unwrap();
    /// let b = Instance::normalize("@alice@mastodon.example").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str(), "mastodon.example");
    /// ```
    pub fn normalize(input: &str) -> Result<Self, InstanceError> {
        let s = strip_scheme(input.trim());
        let s = s.trim_end_matches('/');
        let s = strip_handle_prefix(s).trim();

        if s.is_empty() {
            return Err(InstanceError::Empty);
        }
        Self::validate(s)?;
        Ok(Self(s.to_smolstr()))
    }

    fn validate(s: &str) -> Result<(), InstanceError> {
        if s.contains(|c: char| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@' | '\\')) {
            return Err(InstanceError::invalid(s, "expected a bare host name"));
        }
        let url = Url::parse(&format!("https://{s}"))
            .map_err(|_| InstanceError::invalid(s, "not a valid host name"))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(InstanceError::invalid(s, "missing host"));
        }
        Ok(())
    }

    /// Infallible constructor for values already known to be normalized,
    /// e.g. read back from a store written by this crate.
    ///
    /// Panics on input that does not survive normalization unchanged.
    pub fn raw(instance: &str) -> Self {
        match Self::normalize(instance) {
            Ok(normalized) if normalized.as_str() == instance => normalized,
            _ => panic!("not a normalized instance: {instance}"),
        }
    }

    /// Base `https` URL of the instance, with a `/` path.
    pub fn base_url(&self) -> Url {
        // validate() already proved this parses
        Url::parse(&format!("https://{}/", self.0))
            .unwrap_or_else(|_| unreachable!("instance {} was validated", self.0))
    }

    /// URL of `path` on this instance. `path` is taken as absolute.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url();
        url.set_path(path);
        url
    }

    /// The normalized host string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Instance {
    type Err = InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl<'de> Deserialize<'de> for Instance {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: SmolStr = Deserialize::deserialize(deserializer)?;
        Self::normalize(&value).map_err(D::Error::custom)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance:{}", self.0)
    }
}

impl Deref for Instance {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for Instance {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<Instance> for SmolStr {
    fn from(value: Instance) -> Self {
        value.0
    }
}
