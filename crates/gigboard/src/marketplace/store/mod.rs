//! Persistent store contract.
//!
//! Every record carries a row `version`. `replace_*` only succeeds when the caller
//! hands back the version it read, so each core operation is a read-validate-write
//! loop and concurrent writers to one row serialize instead of overwriting each other.

mod memory;

pub use memory::InMemoryStore;

use tracing::warn;

use super::domain::{
    Application, ApplicationId, Category, CategoryId, Job, JobId, Service,
    ServiceId, User, UserId,
};
use super::error::MarketplaceError;

/// Storage abstraction so the engines can be exercised against any backend.
pub trait MarketplaceStore: Send + Sync {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn replace_user(&self, user: User) -> Result<User, RepositoryError>;
    fn users(&self) -> Result<Vec<User>, RepositoryError>;

    /// Category names are unique; a duplicate name is a `Conflict`.
    fn insert_category(&self, category: Category) -> Result<Category, RepositoryError>;
    fn fetch_category(&self, id: &CategoryId) -> Result<Option<Category>, RepositoryError>;
    fn categories(&self) -> Result<Vec<Category>, RepositoryError>;

    fn insert_service(&self, service: Service) -> Result<Service, RepositoryError>;
    fn fetch_service(&self, id: &ServiceId) -> Result<Option<Service>, RepositoryError>;
    fn replace_service(&self, service: Service) -> Result<Service, RepositoryError>;
    fn services(&self) -> Result<Vec<Service>, RepositoryError>;

    fn insert_job(&self, job: Job) -> Result<Job, RepositoryError>;
    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    fn replace_job(&self, job: Job) -> Result<Job, RepositoryError>;
    fn jobs(&self) -> Result<Vec<Job>, RepositoryError>;

    fn insert_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError>;
    /// Insert unless the same freelancer already has a `submitted` application for the
    /// same service; that case is a `Conflict`. Check and insert are one atomic step.
    fn insert_application_exclusive(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError>;
    fn fetch_application(&self, id: &ApplicationId)
        -> Result<Option<Application>, RepositoryError>;
    fn replace_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError>;
    fn applications(&self) -> Result<Vec<Application>, RepositoryError>;

    fn applications_for_service(
        &self,
        service_id: &ServiceId,
    ) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .applications()?
            .into_iter()
            .filter(|application| &application.service_id == service_id)
            .collect())
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("row version changed (expected {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Keyed, versioned row.
pub trait Record: Clone {
    type Key: Clone + Ord;

    fn key(&self) -> &Self::Key;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

macro_rules! versioned_record {
    ($record:ty, $key:ty) => {
        impl Record for $record {
            type Key = $key;

            fn key(&self) -> &Self::Key {
                &self.id
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

versioned_record!(User, UserId);
versioned_record!(Service, ServiceId);
versioned_record!(Job, JobId);
versioned_record!(Application, ApplicationId);

/// Result of a read-modify-write: either the new row was committed or the current
/// row already satisfied the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Committed<T> {
    Written(T),
    Unchanged(T),
}

impl<T> Committed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Committed::Written(value) | Committed::Unchanged(value) => value,
        }
    }

    pub fn was_written(&self) -> bool {
        matches!(self, Committed::Written(_))
    }
}

/// Bounded retry for transient store failures and lost row-version races.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRetry {
    attempts: u8,
}

impl Default for StoreRetry {
    fn default() -> Self {
        Self::new(3)
    }
}

impl StoreRetry {
    pub fn new(attempts: u8) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    /// Run a single store call, re-issuing it while the store reports `Unavailable`.
    pub fn call<T, F>(&self, operation: &'static str, mut call: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Result<T, RepositoryError>,
    {
        let mut attempt = 1;
        loop {
            match call() {
                Err(RepositoryError::Unavailable(detail)) if attempt < self.attempts => {
                    warn!(operation, attempt, %detail, "store unavailable, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Load the current row, validate and transform it, then write it back under the
    /// row-version check. A lost race re-runs the whole cycle against the winner's row,
    /// so `modify` always decides against committed state.
    pub fn read_modify_write<T, L, M, W>(
        &self,
        operation: &'static str,
        mut load: L,
        mut modify: M,
        mut write: W,
    ) -> Result<Committed<T>, MarketplaceError>
    where
        L: FnMut() -> Result<T, MarketplaceError>,
        M: FnMut(T) -> Result<Committed<T>, MarketplaceError>,
        W: FnMut(T) -> Result<T, RepositoryError>,
    {
        let mut unavailable = None;
        for attempt in 1..=self.attempts {
            let current = match load() {
                Ok(current) => current,
                Err(MarketplaceError::StoreUnavailable(detail)) => {
                    warn!(operation, attempt, %detail, "store unavailable during read, retrying");
                    unavailable = Some(detail);
                    continue;
                }
                Err(other) => return Err(other),
            };

            let next = match modify(current)? {
                Committed::Written(next) => next,
                unchanged @ Committed::Unchanged(_) => return Ok(unchanged),
            };

            match write(next) {
                Ok(stored) => return Ok(Committed::Written(stored)),
                Err(RepositoryError::VersionConflict { expected, found }) => {
                    warn!(operation, attempt, expected, found, "row changed underneath, retrying");
                    unavailable = None;
                }
                Err(RepositoryError::Unavailable(detail)) => {
                    warn!(operation, attempt, %detail, "store unavailable during write, retrying");
                    unavailable = Some(detail);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(match unavailable {
            Some(detail) => MarketplaceError::StoreUnavailable(detail),
            None => MarketplaceError::Internal(format!(
                "{operation} lost {} consecutive row-version races",
                self.attempts
            )),
        })
    }
}
