//! Debug Metadata Index
//!
//! Consumes the compiler-emitted debug metadata (source documents, method
//! ranges, sequence points) as an opaque, already-produced JSON artifact and
//! answers the two questions coverage needs: which documents are under test,
//! and which sequence points belong to them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::result::{CubrirError, CubrirResult};

/// One source-level coverage unit: a binding between a bytecode offset and a
/// source-code span, emitted by the compiler.
///
/// Offsets are unique within a method's range and strictly increasing in
/// declaration order; a point's span lies within its declaring method's
/// line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePoint {
    /// Index into the program's document table
    pub document: usize,
    /// Program offset at which this source region begins
    pub offset: u32,
    /// First line of the span (inclusive)
    pub start_line: u32,
    /// First column of the span (inclusive)
    pub start_col: u32,
    /// Last line of the span
    pub end_line: u32,
    /// Last column of the span (exclusive)
    pub end_col: u32,
}

/// Bytecode range of a compiled method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRange {
    /// Offset of the method's first instruction
    pub start: u32,
    /// Offset one past the method's last instruction
    pub end: u32,
}

/// Whether a method leaves a result on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReturnKind {
    /// No result
    #[default]
    Void,
    /// One result value
    Value,
}

/// Debug metadata for one compiled method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDebugInfo {
    /// Method id as the compiler names it
    pub id: String,
    /// Bytecode range of the method body
    pub range: MethodRange,
    /// Return kind of the method
    #[serde(default)]
    pub return_kind: ReturnKind,
    /// Sequence points in declaration order
    #[serde(default)]
    pub sequence_points: Vec<SequencePoint>,
}

/// Debug metadata for a whole compiled program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    /// Source documents, ordered; sequence points index into this table
    pub documents: Vec<String>,
    /// Compiled methods in declaration order
    pub methods: Vec<MethodDebugInfo>,
}

/// One extracted coverage unit with its document resolved to a name.
///
/// Extraction order over methods, then points within a method, defines the
/// index space for the aggregator's hit-count arrays, so it is stable and
/// deterministic given the same metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentBlock {
    /// Resolved source document name
    pub document: String,
    /// The coverage unit itself
    pub block: CoverBlock,
}

/// A registered coverage unit: source span plus the offset that marks it hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverBlock {
    /// Program offset at which this region begins
    pub offset: u32,
    /// First line of the span
    pub start_line: u32,
    /// First column of the span
    pub start_col: u32,
    /// Last line of the span
    pub end_line: u32,
    /// Last column of the span
    pub end_col: u32,
    /// Number of statements represented, derived from the line span
    pub statements: u32,
}

impl DebugInfo {
    /// Parse debug metadata from its JSON form
    pub fn from_json(text: &str) -> CubrirResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load debug metadata from a JSON file emitted by the compiler
    pub fn from_json_file(path: impl AsRef<Path>) -> CubrirResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Indices of documents whose name contains `substr`.
    ///
    /// Zero matches is a hard test-setup error, not a soft empty result.
    pub fn select_documents(&self, substr: &str) -> CubrirResult<Vec<usize>> {
        let selected: Vec<usize> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.contains(substr))
            .map(|(index, _)| index)
            .collect();
        if selected.is_empty() {
            return Err(CubrirError::NoMatchingDocument {
                pattern: substr.to_string(),
            });
        }
        Ok(selected)
    }

    /// Extract the coverage units belonging to the selected documents.
    ///
    /// Walks every method's sequence points in declaration order, retaining
    /// points in a selected document that lie strictly before the method's
    /// range end. Legacy metadata can place spurious points past the method
    /// body; those are dropped. A method whose points all fall outside the
    /// selection yields nothing and is skipped silently.
    #[must_use]
    pub fn extract_blocks(&self, selected: &[usize]) -> Vec<DocumentBlock> {
        let mut blocks = Vec::new();
        for method in &self.methods {
            for point in &method.sequence_points {
                if !selected.contains(&point.document) || point.offset >= method.range.end {
                    continue;
                }
                let Some(document) = self.documents.get(point.document) else {
                    continue;
                };
                blocks.push(DocumentBlock {
                    document: document.clone(),
                    block: CoverBlock {
                        offset: point.offset,
                        start_line: point.start_line,
                        start_col: point.start_col,
                        end_line: point.end_line,
                        end_col: point.end_col,
                        statements: point.end_line - point.start_line + 1,
                    },
                });
            }
        }
        blocks
    }

    /// Offset of the first instruction of the named method
    pub fn start_offset(&self, method_id: &str) -> CubrirResult<u32> {
        Ok(self.method(method_id)?.range.start)
    }

    /// Whether the named method leaves a result on the stack
    pub fn has_result(&self, method_id: &str) -> CubrirResult<bool> {
        Ok(self.method(method_id)?.return_kind == ReturnKind::Value)
    }

    fn method(&self, method_id: &str) -> CubrirResult<&MethodDebugInfo> {
        self.methods
            .iter()
            .find(|method| method.id == method_id)
            .ok_or_else(|| CubrirError::MethodNotFound {
                method: method_id.to_string(),
            })
    }
}
