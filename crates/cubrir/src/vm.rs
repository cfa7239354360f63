//! VM collaborator capability surface.
//!
//! The virtual machine itself is out of scope: program loading, opcode
//! semantics and stack management all live behind [`SteppableProgram`].
//! The tracer only needs to inspect the current state, peek at the next
//! instruction and advance by exactly one step.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque decoded operation from the VM's instruction set.
///
/// Cubrir never interprets opcodes; it only carries them through the trace
/// so reports and dumps can show what executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Opcode(u8);

impl Opcode {
    /// Wrap a raw opcode byte
    #[inline]
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Get the raw opcode byte
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Identity of the script currently executing.
///
/// A program may call into other scripts; every traced instruction is tagged
/// with the 160-bit hash of the script it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptHash([u8; 20]);

impl ScriptHash {
    /// Wrap a raw 160-bit script hash
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The all-zero hash, used by tests and unattributed scripts
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self([0; 20])
    }

    /// Get the raw hash bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// State tag reported by the VM for the loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmState {
    /// No terminal condition applies; the next instruction can execute
    Runnable,
    /// Execution finished normally
    Halted,
    /// Execution raised a fault; VM state is no longer well-defined
    Faulted,
    /// Execution stopped at a breakpoint
    Break,
    /// A state tag this crate does not recognize (version mismatch)
    Other(u8),
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runnable => write!(f, "runnable"),
            Self::Halted => write!(f, "halted"),
            Self::Faulted => write!(f, "faulted"),
            Self::Break => write!(f, "break"),
            Self::Other(tag) => write!(f, "other({tag})"),
        }
    }
}

/// Runtime fault raised by the VM while stepping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct VmFault(String);

impl VmFault {
    /// Create a fault from the VM's description of what went wrong
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The fault description
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// A loaded VM program that can be single-stepped.
///
/// The predicate methods default to deriving from [`state`](Self::state);
/// implementations wrapping a VM that exposes its own predicates should
/// override them so tracing sees exactly what plain execution would see.
pub trait SteppableProgram {
    /// Whether a program is loaded and the VM can be run
    fn is_ready(&self) -> bool;

    /// Current state tag of the loaded program
    fn state(&self) -> VmState;

    /// Whether a prior or current execution raised a fault
    fn has_failed(&self) -> bool {
        self.state() == VmState::Faulted
    }

    /// Whether execution finished normally
    fn has_halted(&self) -> bool {
        self.state() == VmState::Halted
    }

    /// Whether execution is stopped at a breakpoint
    fn at_breakpoint(&self) -> bool {
        self.state() == VmState::Break
    }

    /// Offset and opcode of the instruction about to execute, read from the
    /// current execution context without advancing it
    fn next_instruction(&self) -> (u32, Opcode);

    /// Hash of the script the current execution context belongs to
    fn script_identity(&self) -> ScriptHash;

    /// Advance the program by exactly one instruction
    fn step(&mut self) -> Result<(), VmFault>;
}

/// A steppable program that also meters resource consumption.
///
/// The invocation driver runs a measurement trace to fix the invocation cost
/// deterministically before real execution.
pub trait MeteredProgram: SteppableProgram {
    /// Total fee consumed by execution so far
    fn fee_consumed(&self) -> i64;
}
