use crate::error::Result;
use std::io::{BufRead, BufReader, Read};

/// Reads inbound requests, one JSON document per line.
///
/// Blank lines are skipped. Each item is the raw request body as accepted by
/// `MessageGateway::process_request`, paired with its 1-based line number.
pub struct RequestReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> RequestReader<R> {
    /// Creates a new `RequestReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Returns an iterator that lazily reads request lines.
    pub fn requests(self) -> impl Iterator<Item = Result<(usize, String)>> {
        self.reader
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(Ok((index + 1, line))),
                Err(e) => Some(Err(e.into())),
            })
    }
}
