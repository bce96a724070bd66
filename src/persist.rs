//! Persisted-state key derivation.
//!
//! The host's own persistence facility (a generic keyed store) is out of
//! scope; this module defines the stable keys and the trait the worker
//! reads/writes through, plus the legacy-key migration for the queue
//! handle.

use crate::config::DestinationConfig;

/// A host-provided keyed persistence facility.
pub trait PersistenceStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str);
}

/// The `seq_num` checkpoint key for `config`.
pub fn sequence_number_key(config: &DestinationConfig) -> String {
    let (dialect, host, port, database, table_template) = config.persistence_key();
    format!("afsql_dd_sequence_number({dialect},{host},{port},{database},{table_template})")
}

/// The queue-handle key for `config`, in its current 5-tuple form.
pub fn queue_file_key(config: &DestinationConfig) -> String {
    let (dialect, host, port, database, table_template) = config.persistence_key();
    format!("afsql_dd_qfile({dialect},{host},{port},{database},{table_template})")
}

/// The legacy 4-tuple queue-handle key (without `table_template`), kept
/// only to migrate old persisted state to [`queue_file_key`] on first open.
pub fn legacy_queue_file_key(config: &DestinationConfig) -> String {
    let (dialect, host, port, database, _table_template) = config.persistence_key();
    format!("afsql_dd_qfile({dialect},{host},{port},{database})")
}

/// Resolve the queue handle key for `config`, migrating a legacy 4-tuple
/// entry to the 5-tuple form if that's all that is present.
pub fn resolve_queue_key(store: &dyn PersistenceStore, config: &DestinationConfig) -> String {
    let current = queue_file_key(config);
    if store.load(&current).is_some() {
        return current;
    }
    let legacy = legacy_queue_file_key(config);
    if let Some(value) = store.load(&legacy) {
        store.store(&current, &value);
    }
    current
}

/// Load the persisted sequence number for `config`, defaulting to 0.
pub fn load_sequence_number(store: &dyn PersistenceStore, config: &DestinationConfig) -> u64 {
    store
        .load(&sequence_number_key(config))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Persist `seq_num` for `config`.
pub fn store_sequence_number(store: &dyn PersistenceStore, config: &DestinationConfig, seq_num: u64) {
    store.store(&sequence_number_key(config), &seq_num.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryStore(Mutex<HashMap<String, String>>);

    impl MemoryStore {
        fn new() -> Self {
            Self(Mutex::new(HashMap::new()))
        }
    }

    impl PersistenceStore for MemoryStore {
        fn load(&self, key: &str) -> Option<String> {
            self.0.lock().unwrap().get(key).cloned()
        }

        fn store(&self, key: &str, value: &str) {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
        }
    }

    fn config() -> DestinationConfig {
        use crate::config::{EndpointConfig, Flags, PortValue};
        use crate::dialect::Dialect;
        use std::time::Duration;

        DestinationConfig::new(
            Dialect::Mysql,
            EndpointConfig {
                host: "db.example.com".into(),
                port: PortValue::Numeric(3306),
                user: "u".into(),
                password: "p".into(),
                database: "logs".into(),
                encoding: None,
            },
            "messages",
            vec![crate::config::FieldConfig::templated("msg", "TEXT")],
            vec![],
            None,
            Flags::default(),
            -1,
            3,
            Duration::from_secs(10),
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn sequence_number_round_trips() {
        let store = MemoryStore::new();
        let cfg = config();
        assert_eq!(load_sequence_number(&store, &cfg), 0);
        store_sequence_number(&store, &cfg, 42);
        assert_eq!(load_sequence_number(&store, &cfg), 42);
    }

    #[test]
    fn legacy_queue_key_migrates_to_five_tuple() {
        let store = MemoryStore::new();
        let cfg = config();
        store.store(&legacy_queue_file_key(&cfg), "queue-handle-123");

        let resolved = resolve_queue_key(&store, &cfg);
        assert_eq!(resolved, queue_file_key(&cfg));
        assert_eq!(store.load(&queue_file_key(&cfg)).as_deref(), Some("queue-handle-123"));
    }
}
