// storage/replay.rs
//! Lazy sequential scan over a collection's chunks

use std::vec::IntoIter;

use super::{complete_lines, decode_record, ChunkBackend, ChunkStore, Location};
use crate::document::Document;
use crate::error::Result;

/// Iterator over every record of a collection in (chunk, line) order
///
/// Holds at most one chunk in memory. After the last known chunk the chunk
/// count is read again, so chunks opened by rollovers during the scan are
/// visited too. A record relocated past the scan position is therefore
/// still reached in its new chunk.
pub struct ReplayIter<'a, B: ChunkBackend> {
    store: &'a ChunkStore<B>,
    next_chunk: u32,
    last_chunk: u32,
    current: Option<ChunkLines>,
}

struct ChunkLines {
    sequence: u32,
    name: String,
    lines: IntoIter<Vec<u8>>,
    next_line: usize,
}

impl<'a, B: ChunkBackend> ReplayIter<'a, B> {
    pub(super) fn new(store: &'a ChunkStore<B>, last_chunk: u32) -> Self {
        ReplayIter {
            store,
            next_chunk: 1,
            last_chunk,
            current: None,
        }
    }

    fn load_next_chunk(&mut self) -> Option<Result<()>> {
        if self.next_chunk > self.last_chunk {
            self.last_chunk = self.store.chunk_count();
            if self.next_chunk > self.last_chunk {
                return None;
            }
        }
        let sequence = self.next_chunk;
        self.next_chunk += 1;

        let bytes = match self.store.read_chunk(sequence) {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(e)),
        };
        let lines: Vec<Vec<u8>> = complete_lines(&bytes)
            .into_iter()
            .map(|line| line.to_vec())
            .collect();

        self.current = Some(ChunkLines {
            sequence,
            name: self.store.chunk_name(sequence),
            lines: lines.into_iter(),
            next_line: 0,
        });
        Some(Ok(()))
    }
}

impl<'a, B: ChunkBackend> Iterator for ReplayIter<'a, B> {
    type Item = Result<(Location, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.current.as_mut() {
                if let Some(line) = chunk.lines.next() {
                    let line_no = chunk.next_line;
                    chunk.next_line += 1;
                    let location = Location {
                        collection: self.store.collection().to_string(),
                        chunk: chunk.sequence,
                        line: line_no,
                    };
                    return Some(
                        decode_record(&chunk.name, line_no, &line).map(|doc| (location, doc)),
                    );
                }
                self.current = None;
            }

            match self.load_next_chunk()? {
                Ok(()) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
