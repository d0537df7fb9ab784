use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use radiant_core::types::StudyId;
use tokio::sync::OwnedMutexGuard;

type StudyMutex = tokio::sync::Mutex<()>;

/// In-process mutual exclusion per study.
///
/// Holding the guard for a study serializes every mutation of it made
/// through this process. Entries are weak; a study's slot is reclaimed
/// lazily once nobody holds or waits on it.
#[derive(Default)]
pub struct StudyLocks {
    slots: Mutex<HashMap<StudyId, Weak<StudyMutex>>>,
}

impl StudyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `study_id`.
    pub async fn lock(&self, study_id: StudyId) -> OwnedMutexGuard<()> {
        let mutex = self.slot(study_id);
        mutex.lock_owned().await
    }

    fn slot(&self, study_id: StudyId) -> Arc<StudyMutex> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = slots.get(&study_id).and_then(Weak::upgrade) {
            return existing;
        }

        slots.retain(|_, weak| weak.strong_count() > 0);
        let fresh = Arc::new(StudyMutex::new(()));
        slots.insert(study_id, Arc::downgrade(&fresh));
        fresh
    }

    /// Number of studies with a live lock slot.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
