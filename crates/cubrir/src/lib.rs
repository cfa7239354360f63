//! Cubrir: source-level statement coverage for stack-machine VM tests
//!
//! Instruments test execution of a bytecode program to produce statement
//! coverage reports. For every invocation a test exercises, Cubrir records
//! the bytecode offsets actually executed, maps them back to source regions
//! using compiler-emitted debug metadata, and aggregates the results into a
//! `mode: set` line-coverage file consumable by standard tooling.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  CUBRIR COVERAGE PIPELINE                                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Invoker → SteppableProgram → Tracer → Coverage ← DebugInfo      │
//! │                                  ↓                               │
//! │                         mode: set profile                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The VM and the compiler are collaborators, reached only through the
//! [`SteppableProgram`] capability trait and the [`DebugInfo`] artifact.
//! Tracing mirrors ordinary execution exactly — same halting conditions,
//! same failure propagation, same instruction order — and only observes.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod aggregate;
mod debug;
mod invoke;
mod report;
mod result;
mod tracer;
mod vm;

pub use aggregate::{Coverage, CoverageState};
pub use debug::{
    CoverBlock, DebugInfo, DocumentBlock, MethodDebugInfo, MethodRange, ReturnKind, SequencePoint,
};
pub use invoke::{Invoker, Measurement, MethodInvocation};
pub use report::{flush_append, flush_replace, write_profile, ProfileLine, PROFILE_HEADER};
pub use result::{CubrirError, CubrirResult};
pub use tracer::{trace, InstructionRecord, Trace, TraceOutcome};
pub use vm::{MeteredProgram, Opcode, ScriptHash, SteppableProgram, VmFault, VmState};
