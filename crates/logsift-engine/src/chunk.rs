use logsift_types::{Chunk, ClassifiedRecord, LineRange};

/// Default chunk size in characters
pub const DEFAULT_CHUNK_CHARS: usize = 3500;

/// Packs whole records into size-bounded chunks for a downstream summarizer
#[derive(Clone, Copy, Debug)]
pub struct Chunker {
    max_chars: usize,
    max_chunks: Option<usize>,
}

impl Chunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            max_chunks: None,
        }
    }

    /// Stop after `max` chunks
    pub fn with_max_chunks(mut self, max: Option<usize>) -> Self {
        self.max_chunks = max;
        self
    }

    /// Records are never split; one longer than the limit gets a chunk of its own
    pub fn chunk(&self, records: &[ClassifiedRecord]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut pending: Option<Pending> = None;

        for record in records {
            let len = record.raw_text().chars().count();
            if let Some(current) = pending.as_mut()
                && current.length + 1 + len <= self.max_chars
            {
                current.push(record, len);
                continue;
            }

            if let Some(done) = pending.take() {
                chunks.push(done.finish(chunks.len()));
                if self.is_full(&chunks) {
                    return chunks;
                }
            }
            pending = Some(Pending::start(record, len));
        }

        if let Some(done) = pending
            && !self.is_full(&chunks)
        {
            chunks.push(done.finish(chunks.len()));
        }
        chunks
    }

    fn is_full(&self, chunks: &[Chunk]) -> bool {
        self.max_chunks.is_some_and(|max| chunks.len() >= max)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_CHARS)
    }
}

struct Pending {
    text: String,
    length: usize,
    line_range: LineRange,
    record_count: usize,
    error_count: usize,
}

impl Pending {
    fn start(record: &ClassifiedRecord, len: usize) -> Self {
        Self {
            text: record.raw_text().to_string(),
            length: len,
            line_range: record.line_range(),
            record_count: 1,
            error_count: usize::from(record.error_type.is_error()),
        }
    }

    fn push(&mut self, record: &ClassifiedRecord, len: usize) {
        self.text.push('\n');
        self.text.push_str(record.raw_text());
        self.length += 1 + len;
        self.line_range = self.line_range.union(record.line_range());
        self.record_count += 1;
        self.error_count += usize::from(record.error_type.is_error());
    }

    fn finish(self, id: usize) -> Chunk {
        Chunk {
            id,
            text: self.text,
            length: self.length,
            line_range: self.line_range,
            record_count: self.record_count,
            error_count: self.error_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsift_types::{Confidence, ErrorType, RawRecord, StructuredRecord};

    fn record(line: usize, error_type: ErrorType, text: &str) -> ClassifiedRecord {
        let raw = RawRecord::new(text.to_string(), LineRange::single(line));
        ClassifiedRecord {
            record: StructuredRecord::plain(raw),
            error_type,
            sub_tag: None,
            confidence: Confidence::Explicit,
        }
    }

    #[test]
    fn test_packs_records_under_limit() {
        let records = vec![
            record(1, ErrorType::Error, "aaaa"),
            record(2, ErrorType::Info, "bbbb"),
            record(3, ErrorType::Fatal, "cccc"),
        ];
        let chunks = Chunker::new(9).chunk(&records);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaa\nbbbb");
        assert_eq!(chunks[0].length, 9);
        assert_eq!(chunks[0].line_range, LineRange::new(1, 2));
        assert_eq!(chunks[0].error_count, 1);
        assert_eq!(chunks[1].id, 1);
        assert_eq!(chunks[1].error_count, 1);
        assert!(chunks.iter().all(|c| c.length <= 9));
    }

    #[test]
    fn test_oversized_record_gets_own_chunk() {
        let records = vec![
            record(1, ErrorType::Info, "ok"),
            record(2, ErrorType::Error, "a very long stack trace"),
            record(3, ErrorType::Info, "ok"),
        ];
        let chunks = Chunker::new(5).chunk(&records);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].record_count, 1);
        assert_eq!(chunks[1].text, "a very long stack trace");
    }

    #[test]
    fn test_max_chunks() {
        let records: Vec<_> = (1..=10)
            .map(|i| record(i, ErrorType::Error, "xxxx"))
            .collect();
        let chunks = Chunker::new(4).with_max_chunks(Some(3)).chunk(&records);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].line_range, LineRange::single(3));
    }

    #[test]
    fn test_no_records() {
        assert!(Chunker::default().chunk(&[]).is_empty());
    }
}
