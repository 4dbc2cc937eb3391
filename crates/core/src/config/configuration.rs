//! Reloadable, in-memory configuration tree
//!
//! A [`Configuration`] holds a `serde_json::Value` tree addressed with
//! colon-separated paths (`"Account:Username"`). Every mutation bumps a
//! monotonic version and notifies subscribers after the new tree is in place,
//! so a reader that starts after a notification always sees the new data.
//!
//! ```rust
//! use bridged_options_core::config::Configuration;
//!
//! let config = Configuration::from_pairs([
//!     ("Account:Username", Some("homers")),
//!     ("Account:Password", None),
//! ]).unwrap();
//!
//! let section = config.section("Account");
//! assert!(section.exists());
//! assert_eq!(section.value().unwrap()["Username"], "homers");
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::{ConfigError, ConfigSource};
use crate::errors::short_type_name;

/// Separator between path segments
pub const KEY_DELIMITER: char = ':';

/// Separator between path segments in environment variable names
pub const ENV_DELIMITER: &str = "__";

/// Notification sent to subscribers after the tree changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChange {
    /// Version of the tree after the change
    pub version: u64,
    /// Path that was set, `None` for a full reload
    pub path: Option<String>,
    pub changed_at: DateTime<Utc>,
}

type ChangeCallback = Arc<dyn Fn(&ConfigurationChange) + Send + Sync>;

#[derive(Debug)]
struct ConfigState {
    root: Value,
    version: u64,
    sources: Vec<ConfigSource>,
}

struct ConfigurationInner {
    state: RwLock<ConfigState>,
    listeners: RwLock<HashMap<u64, ChangeCallback>>,
    next_listener_id: AtomicU64,
}

/// Shared handle to a configuration tree
///
/// Cloning the handle is cheap; all clones observe the same tree.
#[derive(Clone)]
pub struct Configuration {
    inner: Arc<ConfigurationInner>,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Configuration");
        match self.inner.state.read() {
            Ok(state) => s
                .field("version", &state.version)
                .field("sources", &state.sources)
                .finish(),
            Err(_) => s.field("state", &"<poisoned>").finish(),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::with_root(Value::Object(Map::new()), Vec::new())
    }

    fn with_root(root: Value, sources: Vec<ConfigSource>) -> Self {
        Self {
            inner: Arc::new(ConfigurationInner {
                state: RwLock::new(ConfigState {
                    root,
                    version: 0,
                    sources,
                }),
                listeners: RwLock::new(HashMap::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Create a configuration from an existing value tree
    pub fn from_value(root: Value) -> Self {
        Self::with_root(root, vec![ConfigSource::Programmatic])
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(json)?;
        Ok(Self::with_root(root, vec![ConfigSource::Json]))
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_yaml::from_str(yaml)?;
        Ok(Self::with_root(root, vec![ConfigSource::Yaml]))
    }

    /// Build a tree from colon-separated keys; `None` values become null
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut root = Value::Object(Map::new());
        for (key, value) in pairs {
            let value = value.map(|v| Value::String(v.into())).unwrap_or(Value::Null);
            insert_at(&mut root, key.as_ref(), value)?;
        }
        Ok(Self::with_root(root, vec![ConfigSource::Pairs]))
    }

    /// Build a tree from the process environment
    ///
    /// Only variables starting with `prefix` are used; the prefix is stripped
    /// and `__` separates levels (`APP_Account__Username`).
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_vars(prefix, std::env::vars())
    }

    /// Same as [`Configuration::from_env`] over an explicit variable list
    pub fn from_env_vars<I>(prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut root = Value::Object(Map::new());
        for (name, value) in vars {
            let Some(stripped) = name.strip_prefix(prefix) else {
                continue;
            };
            let path = stripped.replace(ENV_DELIMITER, &KEY_DELIMITER.to_string());
            insert_at(&mut root, &path, Value::String(value))?;
        }
        Ok(Self::with_root(root, vec![ConfigSource::EnvVar(prefix.to_string())]))
    }

    /// Current version; bumped by every `set` and `reload`
    pub fn version(&self) -> u64 {
        self.inner
            .state
            .read()
            .map(|state| state.version)
            .unwrap_or_else(|poisoned| poisoned.into_inner().version)
    }

    /// Sources that contributed to this tree, oldest first
    pub fn sources(&self) -> Vec<ConfigSource> {
        match self.inner.state.read() {
            Ok(state) => state.sources.clone(),
            Err(poisoned) => poisoned.into_inner().sources.clone(),
        }
    }

    /// Get a copy of the value at `path`
    pub fn get(&self, path: &str) -> Option<Value> {
        self.read_at(path).0
    }

    /// Get a handle to the section at `path`
    pub fn section(&self, path: impl Into<String>) -> ConfigSection {
        ConfigSection {
            configuration: self.clone(),
            path: path.into(),
        }
    }

    /// Set (or clear, with `None`) the value at `path` and notify subscribers
    pub fn set(&self, path: &str, value: Option<&str>) -> Result<u64, ConfigError> {
        self.set_value(path, value.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null))
    }

    /// Set an arbitrary JSON value at `path` and notify subscribers
    pub fn set_value(&self, path: &str, value: Value) -> Result<u64, ConfigError> {
        let version = {
            let mut state = self.write_state()?;
            insert_at(&mut state.root, path, value)?;
            if !state.sources.contains(&ConfigSource::Programmatic) {
                state.sources.push(ConfigSource::Programmatic);
            }
            state.version += 1;
            state.version
        };

        tracing::debug!(path, version, "configuration value updated");
        self.notify(ConfigurationChange {
            version,
            path: Some(path.to_string()),
            changed_at: Utc::now(),
        });
        Ok(version)
    }

    /// Replace the whole tree and notify subscribers
    pub fn reload(&self, root: Value) -> Result<u64, ConfigError> {
        let version = {
            let mut state = self.write_state()?;
            state.root = root;
            state.version += 1;
            state.version
        };

        tracing::debug!(version, "configuration reloaded");
        self.notify(ConfigurationChange {
            version,
            path: None,
            changed_at: Utc::now(),
        });
        Ok(version)
    }

    /// Register a callback invoked after every change
    ///
    /// The callback stays registered until the returned subscription is dropped.
    /// A callback that panics is logged and skipped; the remaining callbacks
    /// still run. Builds with `panic = "abort"` terminate instead.
    pub fn subscribe<F>(&self, callback: F) -> ChangeSubscription
    where
        F: Fn(&ConfigurationChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        match self.inner.listeners.write() {
            Ok(mut listeners) => {
                listeners.insert(id, Arc::new(callback));
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id, Arc::new(callback));
            }
        }

        ChangeSubscription {
            configuration: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of active change subscriptions
    pub fn subscriber_count(&self) -> usize {
        match self.inner.listeners.read() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, ConfigState>, ConfigError> {
        self.inner
            .state
            .write()
            .map_err(|_| ConfigError::lock("configuration_state"))
    }

    fn read_at(&self, path: &str) -> (Option<Value>, u64) {
        let state = match self.inner.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        (lookup(&state.root, path).cloned(), state.version)
    }

    fn notify(&self, change: ConfigurationChange) {
        // Listeners run without any lock held so they may read the tree.
        let listeners: Vec<ChangeCallback> = match self.inner.listeners.read() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        for listener in listeners {
            // A panicking listener must not starve the ones after it.
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(&change))).is_err() {
                tracing::warn!(version = change.version, "configuration change listener panicked");
            }
        }
    }
}

/// Handle keeping a change callback registered
///
/// Dropping the handle unregisters the callback.
#[must_use = "the callback is unregistered when the subscription is dropped"]
pub struct ChangeSubscription {
    configuration: Weak<ConfigurationInner>,
    id: u64,
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription").field("id", &self.id).finish()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.configuration.upgrade() {
            match inner.listeners.write() {
                Ok(mut listeners) => {
                    listeners.remove(&self.id);
                }
                Err(poisoned) => {
                    poisoned.into_inner().remove(&self.id);
                }
            }
        }
    }
}

/// A named section of a [`Configuration`]
#[derive(Debug, Clone)]
pub struct ConfigSection {
    configuration: Configuration,
    path: String,
}

impl ConfigSection {
    /// Full path of the section
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path
    pub fn key(&self) -> &str {
        self.path.rsplit(KEY_DELIMITER).next().unwrap_or("")
    }

    /// The configuration this section belongs to
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Whether the section currently holds a non-null value
    pub fn exists(&self) -> bool {
        !matches!(self.value(), None | Some(Value::Null))
    }

    /// Copy of the section's current value
    pub fn value(&self) -> Option<Value> {
        self.configuration.get(&self.path)
    }

    /// Child section below this one
    pub fn section(&self, key: &str) -> ConfigSection {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.path, KEY_DELIMITER, key)
        };
        self.configuration.section(path)
    }

    /// Deserialize the section into `T`
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        self.bind_versioned().map(|(value, _)| value)
    }

    /// Deserialize the section into `T`, with the tree version it was read at
    ///
    /// The value and the version come from the same read, so a caller caching
    /// by version never pairs new data with an old version.
    pub fn bind_versioned<T: DeserializeOwned>(&self) -> Result<(T, u64), ConfigError> {
        let (value, version) = self.configuration.read_at(&self.path);
        let value = match value {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value) => value,
        };

        let bound = serde_json::from_value::<T>(value).map_err(|e| {
            ConfigError::bind_failed(
                &self.path,
                short_type_name(std::any::type_name::<T>()),
                e.to_string(),
            )
        })?;
        Ok((bound, version))
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(KEY_DELIMITER).filter(|s| !s.is_empty())
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn insert_at(root: &mut Value, path: &str, value: Value) -> Result<(), ConfigError> {
    let parts: Vec<&str> = path.split(KEY_DELIMITER).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::invalid_path(path, "empty path segment"));
    }

    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| ConfigError::invalid_path(path, "empty path"))?;

    // Existing values are never overwritten by a section; null counts as empty.
    let mut node = root;
    for part in parents {
        node = section_map(node, path)?
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    section_map(node, path)?.insert(last.to_string(), value);
    Ok(())
}

fn section_map<'a>(node: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>, ConfigError> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::invalid_path(path, "parent is not a section")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Account {
        username: Option<String>,
        password: Option<String>,
    }

    #[test]
    fn test_pairs_build_nested_sections() {
        let config = Configuration::from_pairs([
            ("Account:Username", Some("homers")),
            ("Account:Password", None),
            ("Logging:Level", Some("debug")),
        ])
        .unwrap();

        let account: Account = config.section("Account").bind().unwrap();
        assert_eq!(account.username.as_deref(), Some("homers"));
        assert_eq!(account.password, None);
        assert_eq!(config.get("Logging:Level"), Some(Value::String("debug".into())));
        assert_eq!(config.sources(), vec![ConfigSource::Pairs]);
    }

    #[test]
    fn test_empty_segment_is_rejected() {
        let err = Configuration::from_pairs([("Account::Username", Some("x"))]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
    }

    #[test]
    fn test_scalar_parent_is_not_replaced() {
        let err = Configuration::from_pairs([("Account", Some("x")), ("Account:Username", Some("y"))]).unwrap_err();
        match err {
            ConfigError::InvalidPath { path, reason } => {
                assert_eq!(path, "Account:Username");
                assert_eq!(reason, "parent is not a section");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let config = Configuration::from_pairs([("Logging:Level", Some("debug"))]).unwrap();
        assert!(config.set("Logging:Level:Target", Some("stdout")).is_err());
        assert_eq!(config.get("Logging:Level"), Some(Value::String("debug".into())));
        assert_eq!(config.version(), 0);
    }

    #[test]
    fn test_null_parent_becomes_section() {
        let config =
            Configuration::from_pairs([("Account", None), ("Account:Username", Some("homers"))]).unwrap();
        let account: Account = config.section("Account").bind().unwrap();
        assert_eq!(account.username.as_deref(), Some("homers"));
    }

    #[test]
    fn test_missing_section_binds_defaults() {
        let config = Configuration::new();
        let section = config.section("Account");

        assert!(!section.exists());
        let account: Account = section.bind().unwrap();
        assert_eq!(account, Account { username: None, password: None });
    }

    #[test]
    fn test_bind_failure_names_section_and_type() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Strict {
            port: u16,
        }

        let config = Configuration::from_json_str(r#"{"Server": {"port": "not a number"}}"#).unwrap();
        let err = config.section("Server").bind::<Strict>().unwrap_err();

        match err {
            ConfigError::BindFailed { section, target_type, .. } => {
                assert_eq!(section, "Server");
                assert_eq!(target_type, "Strict");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_yaml_and_env_sources() {
        let config = Configuration::from_yaml_str("Account:\n  Username: homers\n").unwrap();
        assert_eq!(config.get("Account:Username"), Some(Value::String("homers".into())));

        let config = Configuration::from_env_vars(
            "APP_",
            vec![
                ("APP_Account__Username".to_string(), "homers".to_string()),
                ("OTHER_Account__Username".to_string(), "ignored".to_string()),
            ],
        )
        .unwrap();
        let account: Account = config.section("Account").bind().unwrap();
        assert_eq!(account.username.as_deref(), Some("homers"));
        assert!(config.sources()[0].is_env_var());
    }

    #[test]
    fn test_set_bumps_version_and_notifies() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let observed = Arc::new(RwLock::new(None));

        let subscription = {
            let seen = seen.clone();
            let observed = observed.clone();
            let reader = config.clone();
            config.subscribe(move |change| {
                seen.fetch_add(1, Ordering::SeqCst);
                // The new value is already visible to listeners.
                *observed.write().unwrap() = reader.get("Account:Username");
                assert_eq!(reader.version(), change.version);
            })
        };

        assert_eq!(config.version(), 0);
        let version = config.set("Account:Username", Some("marge")).unwrap();
        assert_eq!(version, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(*observed.read().unwrap(), Some(Value::String("marge".into())));

        drop(subscription);
        assert_eq!(config.subscriber_count(), 0);
        config.reload(serde_json::json!({})).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(config.version(), 2);
    }

    #[test]
    fn test_panicking_listener_does_not_skip_others() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));

        let _failing = config.subscribe(|_| panic!("listener failed"));
        let _counting = {
            let seen = seen.clone();
            config.subscribe(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert_eq!(config.set("Account:Username", Some("marge")).unwrap(), 1);
        assert_eq!(config.reload(serde_json::json!({})).unwrap(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(config.subscriber_count(), 2);
    }

    #[test]
    fn test_poisoned_state_reports_lock_error() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let poisoner = config.clone();
        let _ = std::thread::spawn(move || {
            let _state = poisoner.inner.state.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        match config.set("Account:Username", Some("marge")).unwrap_err() {
            ConfigError::LockError { resource } => assert_eq!(resource, "configuration_state"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(
            config.reload(serde_json::json!({})),
            Err(ConfigError::LockError { .. })
        ));
        // Readers keep working on the last written tree.
        assert_eq!(config.get("Account:Username"), Some(Value::String("homers".into())));
    }

    #[test]
    fn test_bind_versioned_pairs_value_with_version() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        config.set("Account:Username", Some("bart")).unwrap();

        let (account, version) = config.section("Account").bind_versioned::<Account>().unwrap();
        assert_eq!(account.username.as_deref(), Some("bart"));
        assert_eq!(version, 1);
    }

    #[test]
    fn test_child_section_paths() {
        let config = Configuration::new();
        let child = config.section("Services").section("Account");
        assert_eq!(child.path(), "Services:Account");
        assert_eq!(child.key(), "Account");
    }
}
