use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

use crate::prelude::*;
use crate::trainer::codec;
use crate::trainer::models::Entry;

/// Read-only point lookups of the model state.
pub trait View {
    fn get(&self, key: &str) -> Result<Option<Entry>>;
}

impl<V: View + ?Sized> View for Arc<V> {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        (**self).get(key)
    }
}

impl View for AHashMap<String, Entry> {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        Ok(HashMap::get(self, key).cloned())
    }
}

/// Encoded entries of a learner group.
///
/// A key is only written by the partition it belongs to, and anyone may read it.
#[derive(Clone, Default)]
pub struct Table(Arc<RwLock<AHashMap<String, Bytes>>>);

impl Table {
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<Bytes> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: &str, entry: &Entry) -> Result {
        let bytes = codec::encode(entry)?;
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), bytes);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl View for Table {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        self.get_raw(key)
            .map(|bytes| codec::decode(&bytes))
            .transpose()
            .with_context(|| format!("failed to read the entry of `{}`", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::features::Features;

    #[test]
    fn table_ok() -> Result {
        let table = Table::default();
        assert!(table.get("1")?.is_none());

        let entry = Entry {
            u: Some(Features::from(vec![0.5, 0.25])),
            p: None,
        };
        table.insert("1", &entry)?;
        assert_eq!(table.get("1")?, Some(entry));
        assert_eq!(table.len(), 1);
        Ok(())
    }
}
