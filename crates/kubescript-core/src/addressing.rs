//! Canonical identifiers for registrations
//!
//! An [`Identifier`] is the only thing the build phase and the run phase agree
//! on. The gateway is wired to `POST /<identifier>` at build time and the
//! dispatcher serves exactly that path at run time.
//!
//! HTTP identifiers are `UPPER(method) + "-" + path` with the leading slash
//! removed. Slashes inside the path are kept; any other byte outside
//! `[A-Za-z0-9-._~]` is percent-encoded so the identifier never contains route
//! syntax (`:id`, `*rest`, spaces). Event identifiers are `"EVENT-" + name`
//! with the name taken verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every event identifier
pub const EVENT_PREFIX: &str = "EVENT-";

/// HTTP verbs accepted by the declarative surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Upper-case verb as it appears on the wire and in identifiers
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical identifier derived from a registration
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Identifier for an HTTP route.
    ///
    /// `path` is expected to start with `/`; validation happens when the
    /// registration set is finalised, so a missing slash is passed through
    /// unchanged here.
    pub fn http(method: HttpMethod, path: &str) -> Self {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        Self(format!("{}-{}", method.as_str(), encode_path(trimmed)))
    }

    /// Identifier for a named event
    pub fn event(name: &str) -> Self {
        Self(format!("{}{}", EVENT_PREFIX, name))
    }

    /// Raw identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Inbound endpoint path served by the dispatcher (`/<identifier>`)
    pub fn endpoint(&self) -> String {
        format!("/{}", self.0)
    }

    /// Whether this identifier was derived from an event registration
    pub fn is_event(&self) -> bool {
        self.0.starts_with(EVENT_PREFIX)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encode every byte outside the unreserved set, keeping `/`.
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        if is_unreserved(byte) || byte == b'/' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Whether `name` can be embedded verbatim in a URL path.
///
/// Event names are not escaped, so names containing characters that would
/// need escaping are rejected when the registration set is finalised.
pub fn is_valid_event_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            is_unreserved(b)
                || matches!(
                    b,
                    b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
                        | b':' | b'@'
                )
        })
}
