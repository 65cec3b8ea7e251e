//! Request handling for the log service.

use crate::auth::{AuthConfig, Authorizer, TokenValidator, WILDCARD};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use seglog_core::{Log, LogFollower};
use seglog_protocol::{Record, Request, Response, PROTOCOL_VERSION};
use std::sync::Arc;

/// Subject used for connections that never said hello.
pub const ANONYMOUS: &str = "anonymous";

/// Action checked before appending.
pub const PRODUCE_ACTION: &str = "produce";

/// Action checked before reading or streaming.
pub const CONSUME_ACTION: &str = "consume";

/// Per-connection state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    subject: Option<String>,
}

impl Session {
    /// Creates a session that has not said hello yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the authenticated subject, if any.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

/// Produce, consume and stream operations over a shared log.
///
/// Every operation resolves the session's subject and asks the
/// [`Authorizer`] before touching the log.
pub struct LogService {
    log: Arc<Log>,
    authorizer: Arc<dyn Authorizer>,
    validator: Option<TokenValidator>,
}

impl LogService {
    /// Creates a service that does not require authentication.
    pub fn new(log: Arc<Log>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            log,
            authorizer,
            validator: None,
        }
    }

    /// Creates a service following the server configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication is required but no secret is set.
    pub fn from_config(
        log: Arc<Log>,
        authorizer: Arc<dyn Authorizer>,
        config: &ServerConfig,
    ) -> ServerResult<Self> {
        let service = Self::new(log, authorizer);
        if !config.require_auth {
            return Ok(service);
        }
        let secret = config.auth_secret.clone().ok_or_else(|| {
            ServerError::InvalidRequest("authentication required but no secret configured".into())
        })?;
        let auth = AuthConfig::new(secret).with_expiry(config.token_expiry);
        Ok(service.with_validator(TokenValidator::new(auth)))
    }

    /// Requires every connection to authenticate with a token.
    #[must_use]
    pub fn with_validator(mut self, validator: TokenValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Returns the served log.
    pub fn log(&self) -> &Arc<Log> {
        &self.log
    }

    /// Handles a hello and records the subject on the session.
    ///
    /// With authentication enabled the subject comes from the token and the
    /// claimed subject is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported versions and invalid tokens.
    pub fn hello(
        &self,
        session: &mut Session,
        version: u16,
        subject: String,
        token: Option<&[u8]>,
    ) -> ServerResult<String> {
        if version != PROTOCOL_VERSION {
            return Err(ServerError::InvalidRequest(format!(
                "unsupported protocol version: {version}"
            )));
        }

        let subject = match (&self.validator, token) {
            (Some(validator), Some(token)) => validator.validate_token(token)?,
            (Some(_), None) => {
                return Err(ServerError::AuthenticationFailed("token required".into()))
            }
            (None, _) => subject,
        };

        session.subject = Some(subject.clone());
        Ok(subject)
    }

    fn authorize(&self, session: &Session, action: &str) -> ServerResult<()> {
        let subject = match (session.subject(), &self.validator) {
            (Some(subject), _) => subject,
            (None, None) => ANONYMOUS,
            (None, Some(_)) => {
                return Err(ServerError::AuthenticationFailed("hello required".into()))
            }
        };
        self.authorizer.authorize(subject, WILDCARD, action)
    }

    /// Appends a record for the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session may not produce or the append fails.
    pub fn produce(&self, session: &Session, value: &[u8]) -> ServerResult<u64> {
        self.authorize(session, PRODUCE_ACTION)?;
        Ok(self.log.append(value)?)
    }

    /// Reads a record for the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session may not consume or the read fails.
    pub fn consume(&self, session: &Session, offset: u64) -> ServerResult<Record> {
        self.authorize(session, CONSUME_ACTION)?;
        let value = self.log.read(offset)?;
        Ok(Record {
            offset,
            value: value.into(),
        })
    }

    /// Opens a follower for a streaming consume.
    ///
    /// # Errors
    ///
    /// Returns an error if the session may not consume.
    pub fn follow(&self, session: &Session, offset: u64) -> ServerResult<LogFollower> {
        self.authorize(session, CONSUME_ACTION)?;
        Ok(self.log.follow(offset))
    }

    /// Answers a single-response request.
    ///
    /// Failures become [`Response::Error`] with the matching status.
    pub fn handle(&self, session: &mut Session, request: Request) -> Response {
        let result = match request {
            Request::Hello {
                version,
                subject,
                token,
            } => self
                .hello(session, version, subject, token.as_deref())
                .map(|subject| Response::Hello { subject }),
            Request::Produce { value } => self
                .produce(session, &value)
                .map(|offset| Response::Produce { offset }),
            Request::Consume { offset } => self
                .consume(session, offset)
                .map(|record| Response::Consume { record }),
            Request::ConsumeStream { .. } => Err(ServerError::InvalidRequest(
                "stream requests need a dedicated connection".into(),
            )),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "request failed");
            Response::error(e.status(), e.to_string())
        })
    }
}

impl std::fmt::Debug for LogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogService")
            .field("log", &self.log)
            .field("require_auth", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AclAuthorizer, AllowAll};
    use bytes::Bytes;
    use seglog_core::Config;
    use seglog_protocol::Status;
    use tempfile::tempdir;

    fn open_log(dir: &tempfile::TempDir) -> Arc<Log> {
        Arc::new(Log::open(dir.path(), Config::default()).unwrap())
    }

    fn produce(value: &'static [u8]) -> Request {
        Request::Produce {
            value: Bytes::from_static(value),
        }
    }

    #[test]
    fn produce_then_consume() {
        let dir = tempdir().unwrap();
        let service = LogService::new(open_log(&dir), Arc::new(AllowAll));
        let mut session = Session::new();

        let response = service.handle(&mut session, produce(b"hello world"));
        assert_eq!(response, Response::Produce { offset: 0 });

        let response = service.handle(&mut session, Request::Consume { offset: 0 });
        match response {
            Response::Consume { record } => {
                assert_eq!(record.offset, 0);
                assert_eq!(record.value, Bytes::from_static(b"hello world"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn consume_past_boundary_is_not_found() {
        let dir = tempdir().unwrap();
        let service = LogService::new(open_log(&dir), Arc::new(AllowAll));
        let mut session = Session::new();
        service.handle(&mut session, produce(b"only"));

        let response = service.handle(&mut session, Request::Consume { offset: 1 });
        assert!(matches!(
            response,
            Response::Error {
                status: Status::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn acl_limits_subjects() {
        let dir = tempdir().unwrap();
        let acl = AclAuthorizer::new()
            .allow("root", "*", PRODUCE_ACTION)
            .allow("root", "*", CONSUME_ACTION)
            .allow("nobody", "*", CONSUME_ACTION);
        let service = LogService::new(open_log(&dir), Arc::new(acl));

        let mut root = Session::new();
        service.handle(&mut root, Request::hello("root"));
        assert_eq!(root.subject(), Some("root"));
        assert!(matches!(
            service.handle(&mut root, produce(b"x")),
            Response::Produce { .. }
        ));

        let mut nobody = Session::new();
        service.handle(&mut nobody, Request::hello("nobody"));
        assert!(matches!(
            service.handle(&mut nobody, produce(b"x")),
            Response::Error {
                status: Status::PermissionDenied,
                ..
            }
        ));
        assert!(matches!(
            service.handle(&mut nobody, Request::Consume { offset: 0 }),
            Response::Consume { .. }
        ));

        let mut anonymous = Session::new();
        assert!(matches!(
            service.handle(&mut anonymous, Request::Consume { offset: 0 }),
            Response::Error {
                status: Status::PermissionDenied,
                ..
            }
        ));
    }

    #[test]
    fn tokens_required_when_configured() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::default().with_auth(b"secret".to_vec());
        let service = LogService::from_config(open_log(&dir), Arc::new(AllowAll), &config).unwrap();
        let issuer = TokenValidator::new(AuthConfig::new(b"secret".to_vec()));

        let mut session = Session::new();
        assert!(matches!(
            service.handle(&mut session, produce(b"x")),
            Response::Error {
                status: Status::Unauthenticated,
                ..
            }
        ));
        assert!(matches!(
            service.handle(&mut session, Request::hello("root")),
            Response::Error {
                status: Status::Unauthenticated,
                ..
            }
        ));

        let hello = Request::Hello {
            version: PROTOCOL_VERSION,
            subject: "claimed".into(),
            token: Some(issuer.create_token("root").unwrap().into()),
        };
        assert_eq!(
            service.handle(&mut session, hello),
            Response::Hello {
                subject: "root".into()
            }
        );
        assert!(matches!(
            service.handle(&mut session, produce(b"x")),
            Response::Produce { offset: 0 }
        ));
    }

    #[test]
    fn auth_without_secret_is_rejected() {
        let dir = tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.require_auth = true;
        let result = LogService::from_config(open_log(&dir), Arc::new(AllowAll), &config);
        assert!(result.is_err());
    }

    #[test]
    fn unsupported_version_is_bad_request() {
        let dir = tempdir().unwrap();
        let service = LogService::new(open_log(&dir), Arc::new(AllowAll));
        let hello = Request::Hello {
            version: PROTOCOL_VERSION + 1,
            subject: "root".into(),
            token: None,
        };
        assert!(matches!(
            service.handle(&mut Session::new(), hello),
            Response::Error {
                status: Status::BadRequest,
                ..
            }
        ));
    }
}
