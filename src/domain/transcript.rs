//! Transcript types and subtitle assembly.
//!
//! Assembly is a pure function from per-chunk segment lists to a single
//! subtitle-formatted document with globally adjusted timestamps and strictly
//! increasing block ids. No I/O, fully deterministic.
//!
//! Known limitation: when chunking is configured with an overlap, text falling
//! in the overlap region is transcribed by both chunks and is not deduplicated
//! here.

use serde::{Deserialize, Serialize};

/// One timestamped segment as returned by the speech-to-text service.
/// Offsets are in seconds, relative to the start of the chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Transcription result for one audio chunk, tagged with the chunk's position
/// in the source recording.
#[derive(Debug, Clone)]
pub struct ChunkTranscript {
    /// Position of the chunk in ascending start-offset order
    pub ordinal: usize,

    /// Chunk start offset from the beginning of the recording, in ms
    pub start_ms: u64,

    /// Plain-text transcription of the whole chunk
    pub text: String,

    /// Timestamped segments, in chunk order
    pub segments: Vec<TranscriptSegment>,
}

/// One subtitle block of the assembled document
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleBlock {
    pub id: u64,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// The assembled, time-ordered transcript
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub blocks: Vec<SubtitleBlock>,
}

impl Transcript {
    /// Render the subtitle document: per block a sequence-number line, a
    /// `start --> end` timestamp line, and the segment text, with blocks
    /// separated by a blank line.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for block in &self.blocks {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n",
                block.id,
                format_timestamp(block.start_ms),
                format_timestamp(block.end_ms),
                block.text.trim()
            ));
        }

        out
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Merge per-chunk transcripts into one globally ordered transcript.
///
/// Chunks are processed in ordinal order; within a chunk, segments keep their
/// order. Global offsets are `chunk.start_ms + segment offset`. Block ids are
/// `ordinal * stride + index + 1`, so the id encodes the chunk a block came
/// from and stays strictly increasing across the document.
pub fn assemble(chunks: &[ChunkTranscript]) -> Transcript {
    let mut ordered: Vec<&ChunkTranscript> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.ordinal);

    let stride = block_stride(chunks);
    let mut blocks = Vec::new();

    for chunk in ordered {
        for (index, segment) in chunk.segments.iter().enumerate() {
            let start_ms = chunk.start_ms + secs_to_ms(segment.start);
            let end_ms = chunk.start_ms + secs_to_ms(segment.end);

            blocks.push(SubtitleBlock {
                id: chunk.ordinal as u64 * stride + index as u64 + 1,
                start_ms,
                end_ms,
                text: segment.text.clone(),
            });
        }
    }

    Transcript { blocks }
}

/// Id stride between chunks: 1000, widened to the next power of ten while any
/// chunk carries that many segments, so ids never collide across chunks.
fn block_stride(chunks: &[ChunkTranscript]) -> u64 {
    let max_segments = chunks.iter().map(|c| c.segments.len()).max().unwrap_or(0) as u64;

    let mut stride = 1000u64;
    while max_segments >= stride {
        stride *= 10;
    }
    stride
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round().max(0.0) as u64
}

/// Format a millisecond offset as `HH:MM:SS,mmm`
pub fn format_timestamp(ms: u64) -> String {
    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(3_725_007), "01:02:05,007");
        assert_eq!(format_timestamp(59_999), "00:00:59,999");
        assert_eq!(format_timestamp(3_600_000), "01:00:00,000");
    }

    #[test]
    fn test_assemble_two_chunks() {
        let chunks = vec![
            ChunkTranscript {
                ordinal: 0,
                start_ms: 0,
                text: "hello world".to_string(),
                segments: vec![seg(0.0, 2.5, "hello"), seg(2.5, 4.0, "world")],
            },
            ChunkTranscript {
                ordinal: 1,
                start_ms: 600_000,
                text: "second chunk".to_string(),
                segments: vec![seg(0.0, 3.0, "second chunk")],
            },
        ];

        let transcript = assemble(&chunks);

        assert_eq!(transcript.blocks.len(), 3);
        assert_eq!(transcript.blocks[0].id, 1);
        assert_eq!(transcript.blocks[1].id, 2);
        // Second chunk's numbering starts at 1001
        assert_eq!(transcript.blocks[2].id, 1001);
        assert_eq!(transcript.blocks[2].start_ms, 600_000);
        assert_eq!(transcript.blocks[2].end_ms, 603_000);
    }

    #[test]
    fn test_assemble_restores_ordinal_order() {
        // Completion order of the transcription stage is unconstrained
        let chunks = vec![
            ChunkTranscript {
                ordinal: 1,
                start_ms: 600_000,
                text: "later".to_string(),
                segments: vec![seg(0.0, 1.0, "later")],
            },
            ChunkTranscript {
                ordinal: 0,
                start_ms: 0,
                text: "earlier".to_string(),
                segments: vec![seg(0.0, 1.0, "earlier")],
            },
        ];

        let transcript = assemble(&chunks);

        assert_eq!(transcript.blocks[0].text, "earlier");
        assert_eq!(transcript.blocks[1].text, "later");
        assert!(transcript.blocks[0].id < transcript.blocks[1].id);
    }

    #[test]
    fn test_stride_widens_for_oversized_chunks() {
        let many: Vec<TranscriptSegment> =
            (0..1200).map(|i| seg(i as f64, i as f64 + 1.0, "x")).collect();

        let chunks = vec![
            ChunkTranscript {
                ordinal: 0,
                start_ms: 0,
                text: String::new(),
                segments: many,
            },
            ChunkTranscript {
                ordinal: 1,
                start_ms: 600_000,
                text: String::new(),
                segments: vec![seg(0.0, 1.0, "tail")],
            },
        ];

        let transcript = assemble(&chunks);

        // No collision: every id strictly increases
        for pair in transcript.blocks.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
        // Second chunk numbered from the widened stride
        assert_eq!(transcript.blocks.last().unwrap().id, 10_001);
    }

    #[test]
    fn test_render_block_format() {
        let transcript = assemble(&[ChunkTranscript {
            ordinal: 0,
            start_ms: 0,
            text: "hi".to_string(),
            segments: vec![seg(0.0, 1.25, "hi")],
        }]);

        let rendered = transcript.render();
        assert_eq!(rendered, "1\n00:00:00,000 --> 00:00:01,250\nhi\n");
    }

    #[test]
    fn test_render_separates_blocks_with_blank_line() {
        let transcript = assemble(&[ChunkTranscript {
            ordinal: 0,
            start_ms: 0,
            text: String::new(),
            segments: vec![seg(0.0, 1.0, "one"), seg(1.0, 2.0, "two")],
        }]);

        let rendered = transcript.render();
        assert!(rendered.contains("one\n\n2\n"));
    }

    #[test]
    fn test_empty_input() {
        let transcript = assemble(&[]);
        assert!(transcript.is_empty());
        assert_eq!(transcript.render(), "");
    }
}
