//! JSON rendering of target reports

use crate::types::ScanReport;
use std::io::{self, Write};

/// Write the report as indented JSON followed by a newline
///
/// Results with nothing to say are still written; consumers rely on seeing
/// every scanned target.
pub fn write(out: &mut dyn Write, report: &ScanReport) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}
