//! Coverage profile writer
//!
//! Serializes accumulated coverage in the line-coverage text format consumed
//! by existing visualization tooling:
//!
//! ```text
//! mode: set
//! <document>:<startLine>.<startCol>,<endLine>.<endCol> <statements> <hit>
//! ```
//!
//! `hit` is `1` if the region executed at least once across all aggregated
//! invocations, else `0`; raw counts are kept in memory and normalized only
//! here. Two accumulation modes exist:
//!
//! - *replace-on-flush* ([`flush_replace`]): the in-memory aggregator is the
//!   unit of accumulation; every flush rewrites the file in full.
//! - *append-on-flush* ([`flush_append`]): the file itself is the unit of
//!   accumulation; each call appends its raw lines, and the header is
//!   written only when the file is newly created.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::debug::CoverBlock;
use crate::result::CubrirResult;

/// Header line, written exactly once per file
pub const PROFILE_HEADER: &str = "mode: set";

/// One serializable report line: a coverage unit with its accumulated hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLine {
    /// Resolved source document name
    pub document: String,
    /// The coverage unit
    pub block: CoverBlock,
    /// Raw hit count accumulated so far
    pub hits: u32,
}

impl ProfileLine {
    /// `mode: set` flag: covered or not, irrespective of hit count
    #[must_use]
    pub fn hit_flag(&self) -> u32 {
        u32::from(self.hits > 0)
    }
}

impl fmt::Display for ProfileLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{},{}.{} {} {}",
            self.document,
            self.block.start_line,
            self.block.start_col,
            self.block.end_line,
            self.block.end_col,
            self.block.statements,
            self.hit_flag()
        )
    }
}

/// Write profile lines, without the header, to any writer
pub fn write_profile<W: Write>(writer: &mut W, lines: &[ProfileLine]) -> io::Result<()> {
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

/// Truncate `path` and write the header plus all lines.
///
/// Idempotent in content for unchanged state; used by the merged in-memory
/// aggregator, which rewrites its whole view on every flush.
pub fn flush_replace(path: impl AsRef<Path>, lines: &[ProfileLine]) -> CubrirResult<()> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{PROFILE_HEADER}")?;
    write_profile(&mut writer, lines)?;
    writer.flush()?;
    debug!(path = %path.display(), lines = lines.len(), "replaced coverage profile");
    Ok(())
}

/// Append this call's lines to `path`, writing the header only when the file
/// is newly created (size zero at open time).
pub fn flush_append(path: impl AsRef<Path>, lines: &[ProfileLine]) -> CubrirResult<()> {
    let path = path.as_ref();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let fresh = file.metadata()?.len() == 0;
    let mut writer = BufWriter::new(file);
    if fresh {
        writeln!(writer, "{PROFILE_HEADER}")?;
    }
    write_profile(&mut writer, lines)?;
    writer.flush()?;
    debug!(path = %path.display(), lines = lines.len(), fresh, "appended coverage profile");
    Ok(())
}
