//! Line-oriented sources and sinks.
//!
//! Every stage reads from a `BufRead` and writes to a `Write`; this module
//! only decides where those come from. A path of `-` means stdin/stdout.
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// Open a path as a buffered line source.
pub fn open_source(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file =
        File::open(path).with_context(|| format!("failed to open input: {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Create (or truncate) a path as a buffered line sink.
pub fn create_sink(path: &Path) -> Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create output: {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Iterate over the lines of a source with line terminators removed.
///
/// Unlike `BufRead::lines`, only `\n` and a preceding `\r` are stripped, so
/// other trailing whitespace inside a record survives.
pub fn lines<R: BufRead>(reader: R) -> Lines<R> {
    Lines { reader }
}

pub struct Lines<R> {
    reader: R,
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => {
                if buf.ends_with('\n') {
                    buf.pop();
                    if buf.ends_with('\r') {
                        buf.pop();
                    }
                }
                Some(Ok(buf))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
