use std::sync::{Arc, RwLock};

use crate::config::ChangeSubscription;
use crate::errors::CoreError;
use crate::options::factory::{OptionsFactory, OptionsType};

#[derive(Debug)]
struct CachedValue<T> {
    version: u64,
    value: Arc<T>,
}

#[derive(Debug)]
struct MonitorInner<T> {
    factory: Arc<OptionsFactory<T>>,
    cache: RwLock<Option<CachedValue<T>>>,
}

impl<T: OptionsType> MonitorInner<T> {
    fn current_value(&self) -> Result<Arc<T>, CoreError> {
        let current = self.factory.section().configuration().version();
        {
            let cache = self.cache.read().map_err(|_| CoreError::lock("options_monitor"))?;
            if let Some(cached) = cache.as_ref().filter(|c| c.version >= current) {
                return Ok(cached.value.clone());
            }
        }

        let (value, version) = self.factory.create_versioned()?;
        let value = Arc::new(value);

        let mut cache = self.cache.write().map_err(|_| CoreError::lock("options_monitor"))?;
        match cache.as_ref() {
            // Another thread stored a value read from a newer tree meanwhile.
            Some(cached) if cached.version > version => Ok(cached.value.clone()),
            _ => {
                *cache = Some(CachedValue {
                    version,
                    value: value.clone(),
                });
                Ok(value)
            }
        }
    }
}

/// Live view of an options value that follows configuration changes
///
/// [`OptionsMonitor::current_value`] always reflects every change applied to
/// the configuration before the call; the bound value is cached per
/// configuration version and replaced as a whole, so readers never observe a
/// partially updated value.
#[derive(Debug)]
pub struct OptionsMonitor<T> {
    inner: Arc<MonitorInner<T>>,
}

impl<T: OptionsType> OptionsMonitor<T> {
    pub fn new(factory: Arc<OptionsFactory<T>>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                factory,
                cache: RwLock::new(None),
            }),
        }
    }

    /// Latest value, rebound if the configuration changed since the last read
    pub fn current_value(&self) -> Result<Arc<T>, CoreError> {
        self.inner.current_value()
    }

    /// Configuration version of the cached value, if any
    pub fn cached_version(&self) -> Option<u64> {
        self.inner
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.as_ref().map(|c| c.version))
    }

    /// Call `listener` with the new value after every configuration change
    ///
    /// The listener stops being called once the returned subscription is
    /// dropped. If the new value cannot be bound or fails validation the
    /// listener is not called for that change.
    pub fn on_change<F>(&self, listener: F) -> ChangeSubscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let inner = Arc::downgrade(&self.inner);
        let configuration = self.inner.factory.section().configuration().clone();

        configuration.subscribe(move |change| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            match inner.current_value() {
                Ok(value) => listener(&value),
                Err(error) => tracing::warn!(
                    options_type = std::any::type_name::<T>(),
                    version = change.version,
                    %error,
                    "options change listener skipped"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::options::factory::{ValidateOptions, ValidateOptionsResult};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Account {
        username: String,
    }

    struct NoRoot;

    impl ValidateOptions<Account> for NoRoot {
        fn validate(&self, _name: &str, options: &Account) -> ValidateOptionsResult {
            if options.username == "root" {
                ValidateOptionsResult::fail("root is not allowed")
            } else {
                ValidateOptionsResult::Success
            }
        }
    }

    fn monitor(config: &Configuration) -> OptionsMonitor<Account> {
        OptionsMonitor::new(Arc::new(OptionsFactory::new(
            config.section("Account"),
            Vec::new(),
            vec![Arc::new(NoRoot)],
        )))
    }

    #[test]
    fn test_current_value_is_cached_until_change() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let monitor = monitor(&config);

        let first = monitor.current_value().unwrap();
        let second = monitor.current_value().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(monitor.cached_version(), Some(0));

        config.set("Account:Username", Some("marge")).unwrap();
        let third = monitor.current_value().unwrap();
        assert_eq!(third.username, "marge");
        assert_eq!(first.username, "homers");
        assert_eq!(monitor.cached_version(), Some(1));
    }

    #[test]
    fn test_invalid_reload_surfaces_and_recovers() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let monitor = monitor(&config);
        monitor.current_value().unwrap();

        config.set("Account:Username", Some("root")).unwrap();
        let err = monitor.current_value().unwrap_err();
        assert_eq!(err.to_string(), "root is not allowed");

        config.set("Account:Username", Some("lisa")).unwrap();
        assert_eq!(monitor.current_value().unwrap().username, "lisa");
    }

    #[test]
    fn test_on_change_listener_receives_new_value() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let monitor = monitor(&config);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let subscription = {
            let seen = seen.clone();
            let calls = calls.clone();
            monitor.on_change(move |account| {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(account.username.clone());
            })
        };

        config.set("Account:Username", Some("bart")).unwrap();
        // Invalid values are not delivered.
        config.set("Account:Username", Some("root")).unwrap();
        config.set("Account:Username", Some("maggie")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["bart", "maggie"]);

        drop(subscription);
        config.set("Account:Username", Some("lisa")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_outliving_monitor_is_inert() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let subscription = {
            let monitor = monitor(&config);
            let calls = calls.clone();
            monitor.on_change(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        config.set("Account:Username", Some("bart")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(subscription);
    }
}
