use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{User, UserId};
use super::error::MarketplaceError;
use super::store::{MarketplaceStore, StoreRetry};
use crate::config::AuthConfig;

/// Authenticated subject as issued by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: UserId,
    pub email: String,
    pub session_valid: bool,
}

impl Identity {
    pub fn new(subject: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            subject: UserId(subject.into()),
            email: email.into(),
            session_valid: true,
        }
    }
}

/// Request-scoped caller context handed explicitly to every operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    identity: Option<Identity>,
    received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn anonymous(received_at: DateTime<Utc>) -> Self {
        Self {
            identity: None,
            received_at,
        }
    }

    pub fn authenticated(identity: Identity, received_at: DateTime<Utc>) -> Self {
        Self {
            identity: Some(identity),
            received_at,
        }
    }

    pub fn new(identity: Option<Identity>, received_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            received_at,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Timestamp stamped on every row this request writes.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn require_identity(&self) -> Result<&Identity, MarketplaceError> {
        match &self.identity {
            Some(identity) if identity.session_valid => Ok(identity),
            _ => Err(MarketplaceError::AuthenticationRequired),
        }
    }
}

/// Load the caller's user record, if they have registered one.
pub(crate) fn caller<S>(
    store: &S,
    retry: &StoreRetry,
    ctx: &RequestContext,
) -> Result<Option<User>, MarketplaceError>
where
    S: MarketplaceStore + ?Sized,
{
    let identity = ctx.require_identity()?;
    Ok(retry.call("fetch_caller", || store.fetch_user(&identity.subject))?)
}

/// Caller for read paths that also serve anonymous visitors.
pub(crate) fn viewer<S>(
    store: &S,
    retry: &StoreRetry,
    ctx: &RequestContext,
) -> Result<Option<User>, MarketplaceError>
where
    S: MarketplaceStore + ?Sized,
{
    match ctx.identity() {
        None => Ok(None),
        Some(_) => caller(store, retry, ctx),
    }
}

/// Like [`caller`], but only admins that are not suspended pass.
pub(crate) fn require_admin<S>(
    store: &S,
    retry: &StoreRetry,
    ctx: &RequestContext,
    action: &str,
) -> Result<User, MarketplaceError>
where
    S: MarketplaceStore + ?Sized,
{
    caller(store, retry, ctx)?
        .filter(User::is_active_admin)
        .ok_or_else(|| MarketplaceError::unauthorized(format!("{action} requires an admin")))
}

/// Resolves the caller from an inbound request.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity header '{header}' is malformed")]
    MalformedHeader { header: String },
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<IdentityError> for MarketplaceError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::MalformedHeader { .. } => MarketplaceError::AuthenticationRequired,
            IdentityError::Unavailable(detail) => MarketplaceError::ProviderUnavailable(detail),
        }
    }
}

/// Trusts subject headers injected by an authenticating reverse proxy.
#[derive(Debug, Clone)]
pub struct ProxyHeaderIdentity {
    config: AuthConfig,
}

impl ProxyHeaderIdentity {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, IdentityError> {
        match headers.get(name) {
            None => Ok(None),
            Some(value) => value
                .to_str()
                .map(|value| Some(value.trim()))
                .map_err(|_| IdentityError::MalformedHeader {
                    header: name.to_string(),
                }),
        }
    }
}

impl IdentityProvider for ProxyHeaderIdentity {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, IdentityError> {
        let subject = match Self::header(headers, &self.config.subject_header)? {
            Some(subject) if !subject.is_empty() => subject,
            _ => return Ok(None),
        };
        let email = Self::header(headers, &self.config.email_header)?.unwrap_or_default();
        let session_valid = match Self::header(headers, &self.config.session_header)? {
            None => true,
            Some(state) => !matches!(
                state.to_ascii_lowercase().as_str(),
                "expired" | "invalid" | "revoked" | "false"
            ),
        };

        Ok(Some(Identity {
            subject: UserId(subject.to_string()),
            email: email.to_string(),
            session_valid,
        }))
    }
}
