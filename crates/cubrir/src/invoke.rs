//! Invocation Driver
//!
//! Thin orchestration of one logical test invocation: run the prepared unit
//! of work once through the tracer to learn its resource cost, keep the
//! resulting trace tagged with the method name, and later hand all retained
//! traces to the aggregator.
//!
//! Transaction construction, signing and ledger state are collaborator
//! concerns; the driver only sees a loaded, metered program.

use std::path::Path;

use tracing::warn;

use crate::aggregate::Coverage;
use crate::debug::DebugInfo;
use crate::report::{flush_append, ProfileLine};
use crate::result::{CubrirError, CubrirResult};
use crate::tracer::{trace, InstructionRecord};
use crate::vm::{MeteredProgram, VmFault};

/// One exercised method with the instructions its measurement run executed.
///
/// `instructions` is empty when the invocation cost was fixed rather than
/// measured, in which case there is nothing to cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInvocation {
    /// Name of the invoked method
    pub method: String,
    /// Instructions executed by the measurement run, in order
    pub instructions: Vec<InstructionRecord>,
}

/// Result of one cost-measurement run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// Fee the measurement run consumed; fixes the real invocation's cost
    pub fee: i64,
    /// Number of instructions executed
    pub steps: usize,
    /// Fault the run ended with, if it did not halt normally
    pub fault: Option<VmFault>,
}

impl Measurement {
    /// Surface a measurement fault as an error.
    ///
    /// The driver swallows faults while measuring — a failing invocation
    /// still has a coverable trace — but callers asserting a successful
    /// real execution check here.
    pub fn check(&self) -> CubrirResult<()> {
        match &self.fault {
            Some(fault) => Err(CubrirError::ExecutionFailed {
                fault: fault.message().to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Collects one [`MethodInvocation`] per test call and turns them into
/// coverage.
#[derive(Debug, Default)]
pub struct Invoker {
    methods: Vec<MethodInvocation>,
}

impl Invoker {
    /// Create an empty invoker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `program` once through the tracer to measure the cost of
    /// `method`, retaining the trace whether or not the run faulted.
    ///
    /// # Errors
    ///
    /// Setup errors (`NotLoaded`, `AlreadyFailed`, `UnknownState`)
    /// propagate: there is no trace to keep. A runtime fault does not —
    /// it is reported through [`Measurement::fault`].
    pub fn measure<P: MeteredProgram>(
        &mut self,
        method: &str,
        program: &mut P,
    ) -> CubrirResult<Measurement> {
        let traced = trace(program)?;
        let fault = traced.fault().cloned();
        if let Some(f) = &fault {
            warn!(method, fault = %f, "measurement run faulted; keeping partial trace");
        }
        let steps = traced.records.len();
        self.methods.push(MethodInvocation {
            method: method.to_string(),
            instructions: traced.records,
        });
        Ok(Measurement {
            fee: program.fee_consumed(),
            steps,
            fault,
        })
    }

    /// Record an invocation whose cost was fixed up front; no measurement
    /// run happened, so it contributes no instructions.
    pub fn record_fixed(&mut self, method: &str) {
        self.methods.push(MethodInvocation {
            method: method.to_string(),
            instructions: Vec::new(),
        });
    }

    /// The invocations recorded so far, in call order
    #[must_use]
    pub fn methods(&self) -> &[MethodInvocation] {
        &self.methods
    }

    /// One-shot append-mode coverage: select the documents matching
    /// `substr`, count this invoker's instructions against their coverage
    /// units, and append the resulting lines to `path`.
    ///
    /// The output file itself accumulates across calls and across test
    /// binary invocations; no shared in-memory aggregator is involved.
    pub fn make_coverage(
        &self,
        debug_info: &DebugInfo,
        substr: &str,
        path: impl AsRef<Path>,
    ) -> CubrirResult<()> {
        let selected = debug_info.select_documents(substr)?;
        let mut lines: Vec<ProfileLine> = debug_info
            .extract_blocks(&selected)
            .into_iter()
            .map(|entry| ProfileLine {
                document: entry.document,
                block: entry.block,
                hits: 0,
            })
            .collect();
        for invocation in &self.methods {
            for record in &invocation.instructions {
                for line in &mut lines {
                    if line.block.offset == record.offset {
                        line.hits += 1;
                    }
                }
            }
        }
        flush_append(path, &lines)
    }

    /// Merged-mode coverage: register the matching documents with a shared
    /// accumulator and merge this invoker's traces into it. The caller
    /// flushes the accumulator when the suite is done.
    pub fn contribute(
        &self,
        coverage: &Coverage,
        debug_info: &DebugInfo,
        substr: &str,
    ) -> CubrirResult<()> {
        let selected = debug_info.select_documents(substr)?;
        coverage.register(debug_info, &selected);
        coverage.record_invocations(debug_info, &selected, &self.methods);
        Ok(())
    }
}
