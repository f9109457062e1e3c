use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

type Registry = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// One async mutex per program id, serializing runners inside this process.
/// An entry lives only while someone holds or waits for it.
#[derive(Default)]
pub struct ProgramLocks {
    inner: Registry,
}

/// Held while a program runs. Dropping it releases the lock and forgets the
/// entry when no other task is waiting on it.
pub struct ProgramGuard<'a> {
    locks: &'a ProgramLocks,
    program_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ProgramLocks {
    pub async fn lock(&self, program_id: &str) -> ProgramGuard<'_> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(program_id.to_string()).or_default().clone()
        };
        ProgramGuard {
            locks: self,
            program_id: program_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, program_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters clone the Arc under this mutex, so a count of one means
        // only the registry still refers to it.
        if map
            .get(program_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(program_id);
        }
    }
}

impl Drop for ProgramGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.program_id);
    }
}
