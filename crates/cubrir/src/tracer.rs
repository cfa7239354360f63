//! Execution Tracer
//!
//! Single-steps a loaded VM program to completion, yielding the ordered
//! sequence of executed instructions. Tracing only observes the program:
//! the trace reflects exactly the instructions that would have executed
//! under ordinary, non-instrumented execution.
//!
//! No knowledge of source code or debug metadata lives here.

use tracing::debug;

use crate::result::{CubrirError, CubrirResult};
use crate::vm::{Opcode, ScriptHash, SteppableProgram, VmFault, VmState};

/// One step of execution: the instruction that was about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionRecord {
    /// Byte offset within the executing script, unique per script
    pub offset: u32,
    /// Decoded operation at that offset
    pub opcode: Opcode,
    /// Hash of the script the instruction belongs to
    pub script: ScriptHash,
}

/// How a traced execution terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    /// Execution finished normally
    Halted,
    /// Execution stopped at a breakpoint; treated as successful termination
    /// for coverage purposes
    Breakpoint,
    /// Execution raised a runtime fault mid-run. The records collected up to
    /// and including the faulting instruction are preserved — coverage of
    /// executed-but-faulting code is still valid.
    Faulted(VmFault),
}

impl TraceOutcome {
    /// Whether the traced execution ended in a fault
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }
}

/// Ordered record of one traced execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// Every instruction executed, in execution order
    pub records: Vec<InstructionRecord>,
    /// Terminal condition of the run
    pub outcome: TraceOutcome,
}

impl Trace {
    /// The fault this run ended with, if any
    #[must_use]
    pub fn fault(&self) -> Option<&VmFault> {
        match &self.outcome {
            TraceOutcome::Faulted(fault) => Some(fault),
            _ => None,
        }
    }

    /// Iterate over the executed offsets in execution order
    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.records.iter().map(|record| record.offset)
    }

    /// Convert into the records, treating a faulted run as an error.
    ///
    /// Callers that want the partial trace of a faulting run should read
    /// [`records`](Self::records) directly instead.
    pub fn into_result(self) -> CubrirResult<Vec<InstructionRecord>> {
        match self.outcome {
            TraceOutcome::Faulted(fault) => Err(CubrirError::ExecutionFailed {
                fault: fault.message().to_string(),
            }),
            TraceOutcome::Halted | TraceOutcome::Breakpoint => Ok(self.records),
        }
    }
}

/// Step the loaded program to completion, recording every executed
/// instruction together with its owning script.
///
/// Halting conditions, failure propagation and instruction ordering mirror
/// the VM's ordinary execution loop; tracing adds observation only.
///
/// # Errors
///
/// - [`CubrirError::NotLoaded`] if the VM has no program loaded
/// - [`CubrirError::AlreadyFailed`] if a prior run left the VM failed; its
///   state is undefined and stepping is not attempted
/// - [`CubrirError::UnknownState`] if the VM reports a state tag this crate
///   does not recognize
///
/// A runtime fault during the run is not an `Err`: the partial trace is
/// returned with [`TraceOutcome::Faulted`].
pub fn trace<P: SteppableProgram>(program: &mut P) -> CubrirResult<Trace> {
    if !program.is_ready() {
        return Err(CubrirError::NotLoaded);
    }
    if program.has_failed() {
        return Err(CubrirError::AlreadyFailed);
    }

    let mut records = Vec::new();
    loop {
        if program.has_failed() {
            // step() reports faults itself; this catches VMs that flip to
            // failed between steps.
            debug!(steps = records.len(), "trace ended in VM failure");
            return Ok(Trace {
                records,
                outcome: TraceOutcome::Faulted(VmFault::new("VM entered failed state")),
            });
        }
        if program.has_halted() || program.at_breakpoint() {
            debug!(steps = records.len(), state = %program.state(), "trace finished");
            return Ok(Trace {
                records,
                outcome: if program.has_halted() {
                    TraceOutcome::Halted
                } else {
                    TraceOutcome::Breakpoint
                },
            });
        }
        match program.state() {
            VmState::Runnable => {
                let (offset, opcode) = program.next_instruction();
                records.push(InstructionRecord {
                    offset,
                    opcode,
                    script: program.script_identity(),
                });
                if let Err(fault) = program.step() {
                    debug!(steps = records.len(), %fault, "step faulted");
                    return Ok(Trace {
                        records,
                        outcome: TraceOutcome::Faulted(fault),
                    });
                }
            }
            state => {
                return Err(CubrirError::UnknownState {
                    state: state.to_string(),
                })
            }
        }
    }
}
