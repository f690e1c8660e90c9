//! Transcript Assembly Integration Tests
//!
//! The assembler is pure and deterministic: these tests pin its invariants
//! (strictly increasing block ids, non-decreasing global timestamps) and the
//! subtitle rendering format.

use recapd::domain::transcript::{assemble, format_timestamp, ChunkTranscript, TranscriptSegment};

fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
    TranscriptSegment {
        start,
        end,
        text: text.to_string(),
    }
}

fn chunk(ordinal: usize, start_ms: u64, segments: Vec<TranscriptSegment>) -> ChunkTranscript {
    ChunkTranscript {
        ordinal,
        start_ms,
        text: segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        segments,
    }
}

#[test]
fn test_block_ids_strictly_increase() {
    let chunks: Vec<ChunkTranscript> = (0..6)
        .map(|ordinal| {
            let segments = (0..15)
                .map(|i| seg(i as f64 * 2.0, i as f64 * 2.0 + 1.5, "segment"))
                .collect();
            chunk(ordinal, ordinal as u64 * 600_000, segments)
        })
        .collect();

    let transcript = assemble(&chunks);
    assert_eq!(transcript.blocks.len(), 90);

    for pair in transcript.blocks.windows(2) {
        assert!(
            pair[0].id < pair[1].id,
            "ids must strictly increase: {} then {}",
            pair[0].id,
            pair[1].id
        );
    }
}

#[test]
fn test_global_timestamps_never_decrease() {
    let chunks = vec![
        chunk(
            0,
            0,
            vec![seg(0.0, 4.0, "a"), seg(4.0, 9.5, "b"), seg(9.5, 600.0, "c")],
        ),
        chunk(1, 600_000, vec![seg(0.0, 3.2, "d"), seg(3.2, 8.0, "e")]),
        chunk(2, 1_200_000, vec![seg(0.5, 2.0, "f")]),
    ];

    let transcript = assemble(&chunks);

    let mut previous_start = 0u64;
    for block in &transcript.blocks {
        assert!(block.start_ms >= previous_start);
        assert!(block.end_ms >= block.start_ms);
        previous_start = block.start_ms;
    }
}

#[test]
fn test_timestamp_formatting() {
    assert_eq!(format_timestamp(3_725_007), "01:02:05,007");
    assert_eq!(format_timestamp(0), "00:00:00,000");
    assert_eq!(format_timestamp(999), "00:00:00,999");
    assert_eq!(format_timestamp(60_000), "00:01:00,000");
    assert_eq!(format_timestamp(86_400_000), "24:00:00,000");
}

#[test]
fn test_twenty_minute_recording_layout() {
    // Two 600s chunks of a 20-minute recording
    let chunks = vec![
        chunk(
            0,
            0,
            vec![seg(0.0, 5.0, "welcome everyone"), seg(5.0, 11.0, "agenda")],
        ),
        chunk(
            1,
            600_000,
            vec![seg(0.0, 6.0, "second half"), seg(6.0, 12.5, "wrap up")],
        ),
    ];

    let transcript = assemble(&chunks);

    // Chunk 1 numbered from 1, chunk 2 from 1001
    let ids: Vec<u64> = transcript.blocks.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![1, 2, 1001, 1002]);

    // Chunk-relative offsets shifted by the chunk start
    assert_eq!(transcript.blocks[2].start_ms, 600_000);
    assert_eq!(transcript.blocks[3].start_ms, 606_000);
    assert_eq!(transcript.blocks[3].end_ms, 612_500);

    let rendered = transcript.render();
    assert!(rendered.contains("1001\n00:10:00,000 --> 00:10:06,000\nsecond half"));
}

#[test]
fn test_rendered_document_structure() {
    let chunks = vec![chunk(0, 0, vec![seg(0.0, 2.0, "one"), seg(2.0, 4.0, "two")])];

    let rendered = assemble(&chunks).render();
    let blocks: Vec<&str> = rendered.split("\n\n").collect();

    assert_eq!(blocks.len(), 2);
    for (i, block) in blocks.iter().enumerate() {
        let lines: Vec<&str> = block.trim_end().lines().collect();
        assert_eq!(lines.len(), 3, "block = {:?}", block);
        assert_eq!(lines[0], (i + 1).to_string());
        assert!(lines[1].contains(" --> "));
    }
}

#[test]
fn test_chunks_out_of_completion_order() {
    // Transcription completion order is unconstrained; assembly restores
    // ordinal order
    let chunks = vec![
        chunk(2, 1_200_000, vec![seg(0.0, 1.0, "third")]),
        chunk(0, 0, vec![seg(0.0, 1.0, "first")]),
        chunk(1, 600_000, vec![seg(0.0, 1.0, "second")]),
    ];

    let transcript = assemble(&chunks);
    let texts: Vec<&str> = transcript.blocks.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[test]
fn test_oversized_chunk_widens_numbering_without_collision() {
    let big: Vec<TranscriptSegment> = (0..1500)
        .map(|i| seg(i as f64, i as f64 + 1.0, "s"))
        .collect();

    let chunks = vec![chunk(0, 0, big), chunk(1, 600_000, vec![seg(0.0, 1.0, "t")])];

    let transcript = assemble(&chunks);

    let mut seen = std::collections::HashSet::new();
    for block in &transcript.blocks {
        assert!(seen.insert(block.id), "duplicate block id {}", block.id);
    }

    for pair in transcript.blocks.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
}
