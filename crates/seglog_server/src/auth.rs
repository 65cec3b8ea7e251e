//! Authentication and authorization.
//!
//! Authentication uses HMAC-SHA256 signed tokens carrying a subject and an
//! issue timestamp. Authorization is a pluggable [`Authorizer`] consulted on
//! every produce and consume.
//!
//! ## Token Format
//!
//! ```text
//! | issued_at (8, Unix millis, big-endian) | subject_len (2, big-endian) |
//! | subject (subject_len, UTF-8)           | HMAC-SHA256 (32)            |
//! ```

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const TIMESTAMP_LEN: usize = 8;
const SUBJECT_LEN_LEN: usize = 2;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = TIMESTAMP_LEN + SUBJECT_LEN_LEN;

/// Object name matching every object in a policy.
pub const WILDCARD: &str = "*";

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and checks subject tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for `subject`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject is longer than 65535 bytes.
    pub fn create_token(&self, subject: &str) -> ServerResult<Vec<u8>> {
        self.create_token_at(subject, now_millis())
    }

    fn create_token_at(&self, subject: &str, issued_at: u64) -> ServerResult<Vec<u8>> {
        let subject_len = u16::try_from(subject.len())
            .map_err(|_| ServerError::InvalidRequest("subject too long for token".into()))?;

        let mut token = Vec::with_capacity(HEADER_LEN + subject.len() + MAC_LEN);
        token.extend_from_slice(&issued_at.to_be_bytes());
        token.extend_from_slice(&subject_len.to_be_bytes());
        token.extend_from_slice(subject.as_bytes());

        let signature = self.mac(&token)?.finalize().into_bytes();
        token.extend_from_slice(&signature);
        Ok(token)
    }

    /// Validates a token and returns the subject it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AuthenticationFailed`] for malformed, forged
    /// or expired tokens.
    pub fn validate_token(&self, token: &[u8]) -> ServerResult<String> {
        let fail = |reason: &str| ServerError::AuthenticationFailed(reason.into());

        if token.len() < HEADER_LEN + MAC_LEN {
            return Err(fail("token too short"));
        }
        let (timestamp, rest) = token.split_at(TIMESTAMP_LEN);
        let (subject_len, rest) = rest.split_at(SUBJECT_LEN_LEN);

        let subject_len = usize::from(u16::from_be_bytes([subject_len[0], subject_len[1]]));
        if rest.len() != subject_len + MAC_LEN {
            return Err(fail("invalid token length"));
        }
        let (subject, signature) = rest.split_at(subject_len);

        self.mac(&token[..HEADER_LEN + subject_len])?
            .verify_slice(signature)
            .map_err(|_| fail("invalid signature"))?;

        let mut issued_at = [0u8; TIMESTAMP_LEN];
        issued_at.copy_from_slice(timestamp);
        let issued_at = u64::from_be_bytes(issued_at);
        let expiry = u64::try_from(self.config.token_expiry.as_millis()).unwrap_or(u64::MAX);
        if now_millis() > issued_at.saturating_add(expiry) {
            return Err(fail("token expired"));
        }

        String::from_utf8(subject.to_vec()).map_err(|_| fail("subject is not UTF-8"))
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("invalid HMAC key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("token_expiry", &self.config.token_expiry)
            .finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Decides whether a subject may perform an action on an object.
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(())` if `subject` may perform `action` on `object`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] otherwise.
    fn authorize(&self, subject: &str, object: &str, action: &str) -> ServerResult<()>;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _subject: &str, _object: &str, _action: &str) -> ServerResult<()> {
        Ok(())
    }
}

/// An access control list of `(subject, object, action)` rules.
///
/// Policies are text, one rule per line:
///
/// ```text
/// # subject, object, action
/// p, root, *, produce
/// p, root, *, consume
/// p, nobody, *, consume
/// ```
///
/// An object of `*` matches every object. Blank lines and lines starting
/// with `#` are ignored.
#[derive(Debug, Clone, Default)]
pub struct AclAuthorizer {
    rules: HashSet<(String, String, String)>,
}

impl AclAuthorizer {
    /// Creates an empty list that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    #[must_use]
    pub fn allow(
        mut self,
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.rules
            .insert((subject.into(), object.into(), action.into()));
        self
    }

    /// Parses policy text.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed line.
    pub fn parse(policy: &str) -> Result<Self, String> {
        let mut acl = Self::new();
        for (number, line) in policy.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            match fields.as_slice() {
                ["p", subject, object, action]
                    if !subject.is_empty() && !object.is_empty() && !action.is_empty() =>
                {
                    acl = acl.allow(*subject, *object, *action);
                }
                _ => {
                    return Err(format!(
                        "line {}: expected `p, subject, object, action`",
                        number + 1
                    ))
                }
            }
        }
        Ok(acl)
    }

    /// Loads a policy file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Policy`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let policy_error = |message: String| ServerError::Policy {
            path: path.to_path_buf(),
            message,
        };
        let policy = std::fs::read_to_string(path).map_err(|e| policy_error(e.to_string()))?;
        let acl = Self::parse(&policy).map_err(policy_error)?;
        tracing::info!(path = %path.display(), rules = acl.len(), "loaded access policy");
        Ok(acl)
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn permits(&self, subject: &str, object: &str, action: &str) -> bool {
        [object, WILDCARD].iter().any(|object| {
            self.rules
                .contains(&(subject.to_owned(), (*object).to_owned(), action.to_owned()))
        })
    }
}

impl Authorizer for AclAuthorizer {
    fn authorize(&self, subject: &str, object: &str, action: &str) -> ServerResult<()> {
        if self.permits(subject, object, action) {
            Ok(())
        } else {
            Err(ServerError::NotAuthorized(format!(
                "{subject} not permitted to {action} to {object}"
            )))
        }
    }
}
