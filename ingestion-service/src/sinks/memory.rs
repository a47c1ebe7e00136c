use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use seismic_client::domain::SeismicRecord;

use super::{PutOutcome, RecordStore, StoreError};

/// Test double with the same conditional-write contract as the real tables.
#[derive(Default)]
pub(crate) struct InMemoryStore {
    items: Mutex<HashMap<String, SeismicRecord>>,
    failing_ids: HashSet<String>,
    put_calls: AtomicUsize,
}

impl InMemoryStore {
    pub(crate) fn seeded(records: impl IntoIterator<Item = SeismicRecord>) -> Self {
        let items = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    /// Every write for `id` fails with a backend error.
    pub(crate) fn failing_on(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
        self
    }

    pub(crate) fn get(&self, id: &str) -> Option<SeismicRecord> {
        self.items.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub(crate) fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryStore {
    fn table(&self) -> &str {
        "memory"
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn put_if_absent(&self, record: &SeismicRecord) -> Result<PutOutcome, StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_ids.contains(&record.id) {
            return Err(StoreError::Backend(format!("injected failure for {}", record.id)));
        }

        let mut items = self.items.lock().unwrap();
        if items.contains_key(&record.id) {
            return Ok(PutOutcome::AlreadyExists);
        }
        items.insert(record.id.clone(), record.clone());
        Ok(PutOutcome::Written)
    }
}
