//! Trace sink: human-readable simulation output.
//!
//! A single text stream. Every line is prefixed with the simulated time it
//! was emitted at, printed to stdout and, when a trace path is configured,
//! mirrored to that file. The format carries no machine-parseable
//! guarantees.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Console sink with an optional file mirror.
pub struct TraceSink {
    file: Option<BufWriter<File>>,
    /// Suppresses stdout echo; the file mirror (if any) still receives
    /// every line. Used by tests that only care about the file contents.
    quiet: bool,
}

impl TraceSink {
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(BufWriter::new(File::create(p)?)),
            None => None,
        };
        Ok(TraceSink { file, quiet: false })
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Emit one line, prefixed with the simulated time.
    pub fn emit(&mut self, time: f64, args: fmt::Arguments<'_>) {
        let line = format!("time={time:.6} {args}");
        if !self.quiet {
            println!("{line}");
        }
        if let Some(f) = self.file.as_mut() {
            // A failed mirror write is not worth killing the run for.
            if writeln!(f, "{line}").is_err() {
                tracing::warn!("trace file write failed; mirroring disabled");
                self.file = None;
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(f) = self.file.as_mut() {
            let _ = f.flush();
        }
    }
}

impl Drop for TraceSink {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_lines_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        {
            let mut sink = TraceSink::new(Some(&path)).unwrap();
            sink.set_quiet(true);
            sink.emit(0.0, format_args!("hello"));
            sink.emit(1.5, format_args!("truck {} departs", 3));
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "time=0.000000 hello\ntime=1.500000 truck 3 departs\n");
    }

    #[test]
    fn works_without_file() {
        let mut sink = TraceSink::new(None).unwrap();
        sink.set_quiet(true);
        sink.emit(2.0, format_args!("no mirror"));
    }
}
