use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Journal, JournalEntry, JournalError, JournalSeq, OwnedJournalEntry};

/// In-memory journal; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct MemJournal {
    entries: Arc<Mutex<Vec<OwnedJournalEntry>>>,
}

impl MemJournal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<OwnedJournalEntry>>, JournalError> {
        self.entries.lock().map_err(|_| JournalError::Poisoned)
    }
}

impl Journal for MemJournal {
    fn append(&mut self, entry: JournalEntry<'_>) -> Result<JournalSeq, JournalError> {
        let mut guard = self.lock()?;
        let seq = guard.len() as JournalSeq;
        guard.push(OwnedJournalEntry {
            seq,
            kind: entry.kind,
            payload: entry.payload.to_vec(),
        });
        Ok(seq)
    }

    fn load_from(&self, from: JournalSeq) -> Result<Vec<OwnedJournalEntry>, JournalError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|entry| entry.seq >= from)
            .cloned()
            .collect())
    }

    /// Entries already written stay countable after a writer panicked.
    fn next_seq(&self) -> JournalSeq {
        let guard = self.entries.lock().unwrap_or_else(|poisoned| {
            log::warn!("mem journal lock poisoned; reading its length anyway");
            PoisonError::into_inner(poisoned)
        });
        guard.len() as JournalSeq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalKind;

    #[test]
    fn append_and_load_round_trip() {
        let mut journal = MemJournal::new();
        journal
            .append(JournalEntry::new(JournalKind::PassCommitted, b"first"))
            .unwrap();
        journal
            .append(JournalEntry::new(JournalKind::DeferredCanceled, b"second"))
            .unwrap();

        let all = journal.load_from(0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].seq, 0);
        assert_eq!(all[0].payload, b"first");
        assert_eq!(all[1].kind, JournalKind::DeferredCanceled);
        assert_eq!(journal.next_seq(), 2);

        let tail = journal.load_from(1).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].payload, b"second");

        let shared = journal.clone();
        assert_eq!(shared.load_from(0).unwrap().len(), 2);
    }

    #[test]
    fn poisoned_lock_keeps_its_length() {
        let mut journal = MemJournal::new();
        journal
            .append(JournalEntry::new(JournalKind::PassCommitted, b"kept"))
            .unwrap();
        let shared = journal.clone();
        let writer = std::thread::spawn(move || {
            let _guard = shared.entries.lock().unwrap();
            panic!("writer died holding the lock");
        });
        assert!(writer.join().is_err());

        assert_eq!(journal.next_seq(), 1);
        assert!(matches!(
            journal.append(JournalEntry::new(JournalKind::PassAborted, b"lost")),
            Err(JournalError::Poisoned)
        ));
        assert!(matches!(journal.load_from(0), Err(JournalError::Poisoned)));
    }
}
