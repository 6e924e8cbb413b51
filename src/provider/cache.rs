//! A process-wide cache of the provider reference table.
//!
//! The table changes rarely and stale names only affect display, so readers
//! share one snapshot until it is older than the configured time-to-live.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use rusqlite::Connection;

use crate::{
    Error,
    provider::{Provider, get_all_providers},
};

#[derive(Debug)]
struct Snapshot {
    loaded_at: Instant,
    providers: Arc<Vec<Provider>>,
}

/// The provider list with a fixed time-to-live.
#[derive(Debug)]
pub struct ProviderCache {
    ttl: Duration,
    snapshot: Mutex<Option<Snapshot>>,
}

impl ProviderCache {
    /// Create an empty cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: Mutex::new(None),
        }
    }

    /// Get the provider list, reloading it from `connection` if the cached
    /// copy is missing or expired.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if the cache lock is poisoned, or
    /// any error from reading the provider table.
    pub fn providers(&self, connection: &Connection) -> Result<Arc<Vec<Provider>>, Error> {
        let mut snapshot = self
            .snapshot
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire provider cache lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        if let Some(cached) = snapshot
            .as_ref()
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
        {
            return Ok(Arc::clone(&cached.providers));
        }

        let providers = Arc::new(get_all_providers(connection)?);
        tracing::debug!("reloaded {} providers into the cache", providers.len());

        *snapshot = Some(Snapshot {
            loaded_at: Instant::now(),
            providers: Arc::clone(&providers),
        });

        Ok(providers)
    }

    /// Like [ProviderCache::providers], for a connection shared behind a mutex.
    ///
    /// The database lock is only taken when the cached copy must be reloaded.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if either lock is poisoned, or any
    /// error from reading the provider table.
    pub fn providers_shared(
        &self,
        connection: &Mutex<Connection>,
    ) -> Result<Arc<Vec<Provider>>, Error> {
        if let Some(providers) = self.fresh()? {
            return Ok(providers);
        }

        let connection = connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        self.providers(&connection)
    }

    fn fresh(&self) -> Result<Option<Arc<Vec<Provider>>>, Error> {
        let snapshot = self
            .snapshot
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire provider cache lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        Ok(snapshot
            .as_ref()
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.providers)))
    }

    /// A map from provider code to display name.
    pub fn names(&self, connection: &Connection) -> Result<HashMap<String, String>, Error> {
        Ok(self
            .providers(connection)?
            .iter()
            .map(|provider| (provider.code.to_string(), provider.name.clone()))
            .collect())
    }

    /// Drop the cached copy so the next read reloads the table.
    pub fn invalidate(&self) {
        match self.snapshot.lock() {
            Ok(mut snapshot) => *snapshot = None,
            Err(error) => tracing::error!("could not acquire provider cache lock: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use rusqlite::Connection;

    use crate::provider::{
        Provider, ProviderCache, ProviderCode, create_provider, create_provider_table,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_provider_table(&connection).expect("Could not create provider table");
        create_provider(
            &Provider::new(ProviderCode::new_unchecked("A"), "Bank A").unwrap(),
            &connection,
        )
        .expect("Could not create provider");
        connection
    }

    fn add_second_provider(connection: &Connection) {
        create_provider(
            &Provider::new(ProviderCode::new_unchecked("B"), "Bank B").unwrap(),
            connection,
        )
        .expect("Could not create provider");
    }

    #[test]
    fn serves_cached_list_until_expiry() {
        let connection = get_test_db_connection();
        let cache = ProviderCache::new(Duration::from_secs(3600));

        assert_eq!(cache.providers(&connection).unwrap().len(), 1);
        add_second_provider(&connection);

        assert_eq!(cache.providers(&connection).unwrap().len(), 1);
    }

    #[test]
    fn expired_entry_is_reloaded() {
        let connection = get_test_db_connection();
        let cache = ProviderCache::new(Duration::ZERO);

        assert_eq!(cache.providers(&connection).unwrap().len(), 1);
        add_second_provider(&connection);

        assert_eq!(cache.providers(&connection).unwrap().len(), 2);
    }

    #[test]
    fn invalidate_forces_reload() {
        let connection = get_test_db_connection();
        let cache = ProviderCache::new(Duration::from_secs(3600));
        cache.providers(&connection).unwrap();
        add_second_provider(&connection);

        cache.invalidate();

        assert_eq!(cache.providers(&connection).unwrap().len(), 2);
    }

    #[test]
    fn shared_connection_is_only_read_on_expiry() {
        let connection = Mutex::new(get_test_db_connection());
        let cache = ProviderCache::new(Duration::from_secs(3600));

        assert_eq!(cache.providers_shared(&connection).unwrap().len(), 1);
        add_second_provider(&connection.lock().unwrap());

        assert_eq!(cache.providers_shared(&connection).unwrap().len(), 1);
    }

    #[test]
    fn names_maps_code_to_name() {
        let connection = get_test_db_connection();
        let cache = ProviderCache::new(Duration::from_secs(3600));

        let names = cache.names(&connection).unwrap();

        assert_eq!(names.get("A").map(String::as_str), Some("Bank A"));
    }
}
