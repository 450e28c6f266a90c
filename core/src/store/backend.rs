use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// Abstract keyed persistence used by [`super::TaskStore`].
///
/// Reads must reflect the most recent write made through the same instance.
pub trait StateBackend: Send + Sync {
    fn name(&self) -> &str;
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let keys = self.keys_with_prefix(prefix)?;
        for key in &keys {
            self.delete(key)?;
        }
        Ok(keys.len())
    }
}

/// Process-local backend, used for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StateBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_scan_and_delete() {
        let backend = MemoryBackend::new();
        backend.set("workflow:a:task:1", "x".into()).unwrap();
        backend.set("workflow:a:task:2", "y".into()).unwrap();
        backend.set("workflow:b:task:1", "z".into()).unwrap();

        let keys = backend.keys_with_prefix("workflow:a:").unwrap();
        assert_eq!(keys, vec!["workflow:a:task:1", "workflow:a:task:2"]);

        assert_eq!(backend.delete_prefix("workflow:a:").unwrap(), 2);
        assert!(backend.get("workflow:a:task:1").unwrap().is_none());
        assert_eq!(backend.get("workflow:b:task:1").unwrap().as_deref(), Some("z"));
    }
}
