// Linkauth — Credential data models
//
// SECURITY: the password hash lives only in `CredentialRecord`, which is
// crate-private and never serialized. Everything handed to callers is a
// `CredentialView`, whose password slot is always null.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::HashReply;
use super::StoreError;

/// Field holding the password hash.
pub const PASSWORD_FIELD: &str = "password";

/// Field holding the username.
pub const USERNAME_FIELD: &str = "username";

/// Field holding the system-account flag.
pub const SYSTEM_FIELD: &str = "system";

/// Whether an incoming password is already hashed, unless the caller says so.
pub const DEFAULT_ENCRYPTED: bool = false;

/// Whether a new account is a system account, unless the caller says so.
pub const DEFAULT_SYSTEM: bool = false;

fn default_encrypted() -> bool {
    DEFAULT_ENCRYPTED
}

fn default_system() -> bool {
    DEFAULT_SYSTEM
}

/// Usernames are non-empty printable 7-bit ASCII; `/` is allowed,
/// whitespace and control characters are not.
pub fn validate_username(username: &str) -> bool {
    !username.is_empty() && username.bytes().all(|b| b.is_ascii_graphic())
}

/// Serialize a flag the way stored records spell it.
pub fn encode_flag(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}

/// Parse a stored flag. Anything other than a case-insensitive `true` is false.
pub fn parse_flag(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

/// Render a caller-supplied value for storage: strings verbatim, anything
/// else as its JSON text.
pub(crate) fn stored_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Response transform for safe reads: the password slot becomes null.
/// Empty replies (no such key) stay empty.
pub fn redact_password(mut reply: HashReply) -> HashReply {
    if !reply.is_empty() {
        reply.insert(PASSWORD_FIELD.to_string(), None);
    }
    reply
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input for creating a user. `username` and `password` are required.
#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    /// The password is already a hash and is stored verbatim. Never persisted.
    #[serde(default = "default_encrypted")]
    pub encrypted: bool,
    #[serde(default = "default_system")]
    pub system: bool,
    /// Any other fields, stored verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            encrypted: DEFAULT_ENCRYPTED,
            system: DEFAULT_SYSTEM,
            extra: BTreeMap::new(),
        }
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Validate a JSON document against the add schema.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Validation(e.to_string()))
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("encrypted", &self.encrypted)
            .field("system", &self.system)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Input for changing an existing user. Only `username` is required.
#[derive(Clone, Deserialize)]
pub struct UserChanges {
    pub username: String,
    pub password: Option<String>,
    #[serde(default = "default_encrypted")]
    pub encrypted: bool,
    pub system: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UserChanges {
    pub fn for_user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            encrypted: DEFAULT_ENCRYPTED,
            system: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = Some(system);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Validate a JSON document against the modify schema.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Validation(e.to_string()))
    }
}

impl fmt::Debug for UserChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserChanges")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("encrypted", &self.encrypted)
            .field("system", &self.system)
            .field("extra", &self.extra)
            .finish()
    }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// The unredacted stored record. Used only for the authentication comparison.
pub(crate) struct CredentialRecord {
    fields: BTreeMap<String, String>,
}

impl CredentialRecord {
    /// Build a record from a raw reply; `None` when the key does not exist.
    pub(crate) fn from_reply(reply: HashReply) -> Option<Self> {
        let fields: BTreeMap<String, String> = reply
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        if fields.is_empty() {
            None
        } else {
            Some(Self { fields })
        }
    }

    pub(crate) fn password_hash(&self) -> Option<&str> {
        self.fields.get(PASSWORD_FIELD).map(String::as_str)
    }

    /// The stored system flag; `None` if the record has no such field.
    pub(crate) fn system(&self) -> Option<bool> {
        self.fields.get(SYSTEM_FIELD).map(|raw| parse_flag(raw))
    }
}

/// Custom Debug implementation that NEVER reveals the hash.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.fields {
            if name == PASSWORD_FIELD {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

/// The safe view of a record: every stored field, with `password` null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CredentialView {
    fields: BTreeMap<String, Option<String>>,
}

impl CredentialView {
    /// Wrap a redacted reply; `None` when the key does not exist.
    pub(crate) fn from_reply(reply: HashReply) -> Option<Self> {
        if reply.values().all(Option::is_none) {
            None
        } else {
            Some(Self { fields: reply })
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.get(USERNAME_FIELD)
    }

    pub fn system(&self) -> bool {
        self.get(SYSTEM_FIELD).map(parse_flag).unwrap_or(false)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_deref())
    }

    pub fn fields(&self) -> &BTreeMap<String, Option<String>> {
        &self.fields
    }
}

impl fmt::Display for CredentialView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.username().unwrap_or("<unnamed>"),
            if self.system() { " (system)" } else { "" }
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
