//! Coverage Aggregator
//!
//! Process-wide coverage state: a per-document ordered list of coverage
//! units with an index-aligned hit-count array. Traces from many test
//! invocations merge into the same state; flushing serializes it without
//! clearing, so tests can flush and continue.
//!
//! Every mutating access locks the whole state. Contention is test-suite
//! scale; no lost counter update is the invariant that matters.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::debug::{CoverBlock, DebugInfo, DocumentBlock};
use crate::invoke::MethodInvocation;
use crate::report::{flush_replace, ProfileLine};
use crate::result::CubrirResult;
use crate::tracer::InstructionRecord;

/// Aggregated coverage for one process.
///
/// Invariant: `counters[d].len() == documents[d].len()` for every document
/// `d`, after every mutation. Counters never decrease; they are reset only
/// by process restart.
#[derive(Debug, Default)]
pub struct CoverageState {
    /// Ordered coverage units per resolved document name
    documents: BTreeMap<String, Vec<CoverBlock>>,
    /// Hit counters, index-aligned with `documents`
    counters: BTreeMap<String, Vec<u32>>,
}

impl CoverageState {
    fn register(&mut self, blocks: Vec<DocumentBlock>) {
        for entry in blocks {
            self.documents
                .entry(entry.document)
                .or_default()
                .push(entry.block);
        }
        // Re-align: extend counters with zeros wherever a document grew,
        // preserving counts already accumulated.
        for (document, blocks) in &self.documents {
            self.counters
                .entry(document.clone())
                .or_default()
                .resize(blocks.len(), 0);
        }
    }

    fn record(&mut self, document: &str, records: &[InstructionRecord]) {
        let Some(blocks) = self.documents.get(document) else {
            return;
        };
        let Some(counts) = self.counters.get_mut(document) else {
            return;
        };
        for record in records {
            for (index, block) in blocks.iter().enumerate() {
                if block.offset == record.offset {
                    counts[index] += 1;
                }
            }
        }
    }

    fn lines(&self) -> Vec<ProfileLine> {
        let mut lines = Vec::new();
        for (document, blocks) in &self.documents {
            let counts = self.counters.get(document);
            for (index, block) in blocks.iter().enumerate() {
                lines.push(ProfileLine {
                    document: document.clone(),
                    block: *block,
                    hits: counts.and_then(|c| c.get(index)).copied().unwrap_or(0),
                });
            }
        }
        lines
    }

    fn is_aligned(&self) -> bool {
        self.documents.len() == self.counters.len()
            && self.documents.iter().all(|(document, blocks)| {
                self.counters
                    .get(document)
                    .is_some_and(|counts| counts.len() == blocks.len())
            })
    }
}

/// Shared coverage accumulator for a whole test process.
///
/// Explicitly constructed and passed around (usually as `Arc<Coverage>`)
/// rather than hidden in a global; a single mutex guards the full state.
#[derive(Debug, Default)]
pub struct Coverage {
    state: Mutex<CoverageState>,
}

impl Coverage {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CoverageState> {
        // A panicking test must not discard coverage the rest of the suite
        // already accumulated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge the selected documents' coverage units into the state.
    ///
    /// New units for an already-registered document are appended; there is
    /// no dedup across registration calls. Each document is expected to be
    /// registered once per process. Hit-count arrays are extended with
    /// zeros to stay index-aligned; existing counts are preserved.
    pub fn register(&self, debug_info: &DebugInfo, selected: &[usize]) {
        let blocks = debug_info.extract_blocks(selected);
        debug!(blocks = blocks.len(), "registering coverage units");
        self.lock().register(blocks);
    }

    /// Merge one instruction trace into the counters.
    ///
    /// Every registered unit of a selected document whose offset equals a
    /// record's offset is incremented once per matching record. Units that
    /// share an offset each count independently. Units with no match keep
    /// whatever hits earlier invocations gave them.
    pub fn record_trace(
        &self,
        debug_info: &DebugInfo,
        selected: &[usize],
        records: &[InstructionRecord],
    ) {
        let mut state = self.lock();
        for &index in selected {
            if let Some(document) = debug_info.documents.get(index) {
                state.record(document, records);
            }
        }
    }

    /// Merge the traces of a batch of method invocations
    pub fn record_invocations(
        &self,
        debug_info: &DebugInfo,
        selected: &[usize],
        invocations: &[MethodInvocation],
    ) {
        for invocation in invocations {
            self.record_trace(debug_info, selected, &invocation.instructions);
        }
    }

    /// Serialize the accumulated state to `path`, truncating any previous
    /// contents. The in-memory state is not cleared; repeated flushes with
    /// unchanged state produce identical files.
    pub fn flush(&self, path: impl AsRef<Path>) -> CubrirResult<()> {
        let lines = self.lock().lines();
        flush_replace(path, &lines)
    }

    /// Hit counters for one document, if registered
    #[must_use]
    pub fn hit_counts(&self, document: &str) -> Option<Vec<u32>> {
        self.lock().counters.get(document).cloned()
    }

    /// Number of coverage units registered for one document
    #[must_use]
    pub fn document_len(&self, document: &str) -> Option<usize> {
        self.lock().documents.get(document).map(Vec::len)
    }

    /// Whether every document's counter array matches its unit list in length
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.lock().is_aligned()
    }
}
