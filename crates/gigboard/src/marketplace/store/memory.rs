use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{MarketplaceStore, Record, RepositoryError};
use crate::marketplace::domain::{
    Application, ApplicationId, Category, CategoryId, Job, JobId, Service, ServiceId, User,
    UserId,
};

/// Mutex-guarded reference store. All tables share one lock, so multi-row checks
/// such as exclusive application inserts are atomic.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    outage: Arc<AtomicU32>,
}

#[derive(Default)]
struct Tables {
    users: Table<User>,
    categories: BTreeMap<CategoryId, Category>,
    services: Table<Service>,
    jobs: Table<Job>,
    applications: Table<Application>,
}

struct Table<R: Record> {
    rows: BTreeMap<R::Key, R>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<R: Record> Table<R> {
    fn insert(&mut self, mut row: R) -> Result<R, RepositoryError> {
        if self.rows.contains_key(row.key()) {
            return Err(RepositoryError::Conflict);
        }
        row.set_version(1);
        self.rows.insert(row.key().clone(), row.clone());
        Ok(row)
    }

    fn fetch(&self, key: &R::Key) -> Option<R> {
        self.rows.get(key).cloned()
    }

    fn replace(&mut self, mut row: R) -> Result<R, RepositoryError> {
        let stored = self.rows.get(row.key()).ok_or(RepositoryError::NotFound)?;
        if stored.version() != row.version() {
            return Err(RepositoryError::VersionConflict {
                expected: row.version(),
                found: stored.version(),
            });
        }
        row.set_version(row.version() + 1);
        self.rows.insert(row.key().clone(), row.clone());
        Ok(row)
    }

    fn scan(&self) -> Vec<R> {
        self.rows.values().cloned().collect()
    }
}

impl InMemoryStore {
    /// Make the next `calls` store operations fail with `Unavailable`.
    pub fn fail_next(&self, calls: u32) {
        self.outage.store(calls, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        let injected = self
            .outage
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(RepositoryError::Unavailable(
                "injected store outage".to_string(),
            ));
        }

        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl MarketplaceStore for InMemoryStore {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        self.tables()?.users.insert(user)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables()?.users.fetch(id))
    }

    fn replace_user(&self, user: User) -> Result<User, RepositoryError> {
        self.tables()?.users.replace(user)
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.tables()?.users.scan())
    }

    fn insert_category(&self, category: Category) -> Result<Category, RepositoryError> {
        let mut tables = self.tables()?;
        let duplicate = tables.categories.contains_key(&category.id)
            || tables
                .categories
                .values()
                .any(|existing| existing.name.eq_ignore_ascii_case(&category.name));
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables
            .categories
            .insert(category.id.clone(), category.clone());
        Ok(category)
    }

    fn fetch_category(&self, id: &CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.tables()?.categories.get(id).cloned())
    }

    fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(self.tables()?.categories.values().cloned().collect())
    }

    fn insert_service(&self, service: Service) -> Result<Service, RepositoryError> {
        self.tables()?.services.insert(service)
    }

    fn fetch_service(&self, id: &ServiceId) -> Result<Option<Service>, RepositoryError> {
        Ok(self.tables()?.services.fetch(id))
    }

    fn replace_service(&self, service: Service) -> Result<Service, RepositoryError> {
        self.tables()?.services.replace(service)
    }

    fn services(&self) -> Result<Vec<Service>, RepositoryError> {
        Ok(self.tables()?.services.scan())
    }

    fn insert_job(&self, job: Job) -> Result<Job, RepositoryError> {
        self.tables()?.jobs.insert(job)
    }

    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.tables()?.jobs.fetch(id))
    }

    fn replace_job(&self, job: Job) -> Result<Job, RepositoryError> {
        self.tables()?.jobs.replace(job)
    }

    fn jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        Ok(self.tables()?.jobs.scan())
    }

    fn insert_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        self.tables()?.applications.insert(application)
    }

    fn insert_application_exclusive(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let outstanding = tables.applications.rows.values().any(|existing| {
            existing.service_id == application.service_id
                && existing.freelancer_id == application.freelancer_id
                && existing.is_awaiting_decision()
        });
        if outstanding {
            return Err(RepositoryError::Conflict);
        }
        tables.applications.insert(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.tables()?.applications.fetch(id))
    }

    fn replace_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        self.tables()?.applications.replace(application)
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.tables()?.applications.scan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{ModerationStamp, ModerationStatus};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn service(id: &str) -> Service {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Service {
            id: ServiceId::from(id),
            freelancer_id: UserId::from("freelancer-1"),
            category_id: CategoryId::from("design"),
            title: "Logo Design".to_string(),
            description: "Vector logos".to_string(),
            price: 50.0,
            delivery_time: 3,
            skills: BTreeSet::new(),
            status: ModerationStatus::Pending,
            is_active: true,
            moderation: ModerationStamp::default(),
            created_at: at,
            updated_at: at,
            version: 0,
        }
    }

    #[test]
    fn replace_requires_the_version_that_was_read() {
        let store = InMemoryStore::default();
        let inserted = store.insert_service(service("svc_1")).expect("insert");
        assert_eq!(inserted.version, 1);

        let mut first = inserted.clone();
        first.status = ModerationStatus::Approved;
        let stored = store.replace_service(first).expect("first writer wins");
        assert_eq!(stored.version, 2);

        let mut second = inserted;
        second.status = ModerationStatus::Rejected;
        assert_eq!(
            store.replace_service(second),
            Err(RepositoryError::VersionConflict {
                expected: 1,
                found: 2
            })
        );
        let current = store
            .fetch_service(&ServiceId::from("svc_1"))
            .expect("fetch")
            .expect("present");
        assert_eq!(current.status, ModerationStatus::Approved);
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let store = InMemoryStore::default();
        store.insert_service(service("svc_1")).expect("insert");
        assert_eq!(
            store.insert_service(service("svc_1")),
            Err(RepositoryError::Conflict)
        );
    }

    #[test]
    fn category_names_are_unique_case_insensitively() {
        let store = InMemoryStore::default();
        let at = Utc::now();
        let category = |id: &str, name: &str| Category {
            id: CategoryId::from(id),
            name: name.to_string(),
            description: None,
            icon: None,
            created_at: at,
        };
        store
            .insert_category(category("cat_1", "Design"))
            .expect("insert");
        assert_eq!(
            store.insert_category(category("cat_2", "design")),
            Err(RepositoryError::Conflict)
        );
    }

    #[test]
    fn injected_outage_is_consumed() {
        let store = InMemoryStore::default();
        store.fail_next(1);
        assert!(matches!(
            store.services(),
            Err(RepositoryError::Unavailable(_))
        ));
        assert_eq!(store.services(), Ok(Vec::new()));
    }
}
