//! Final-reply streaming: fixed-size chunks, a delimiter after every
//! chunk, and a short pause between sends so the client renders the
//! reply progressively.

use std::time::Duration;

use async_trait::async_trait;

/// Characters per chunk.
pub const CHUNK_SIZE: usize = 5;

/// Appended after every chunk, including the last.
pub const CHUNK_DELIMITER: &str = "<|>";

/// Pause between chunk sends.
pub const CHUNK_DELAY: Duration = Duration::from_millis(10);

/// The receiving side went away.
#[derive(Debug)]
pub struct StreamClosed;

/// Where streamed chunks go. The HTTP layer adapts its response body
/// channel to this; tests collect into a vector.
#[async_trait]
pub trait StreamSink: Send {
    async fn send(&mut self, data: String) -> Result<(), StreamClosed>;
}

/// Stream `text` into the sink in [`CHUNK_SIZE`]-character pieces.
///
/// Chunks split on character boundaries, so multi-byte text never
/// fragments mid-codepoint. A closed sink ends the stream quietly; the
/// reply was already persisted before streaming began, so nothing is
/// lost when the client disconnects.
pub async fn stream_text<S: StreamSink>(sink: &mut S, text: &str) {
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(CHUNK_SIZE) {
        let mut piece: String = chunk.iter().collect();
        piece.push_str(CHUNK_DELIMITER);
        if sink.send(piece).await.is_err() {
            tracing::debug!("client disconnected mid-stream");
            return;
        }
        tokio::time::sleep(CHUNK_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSink {
        chunks: Vec<String>,
        fail_after: Option<usize>,
    }

    impl VecSink {
        fn new() -> Self {
            Self {
                chunks: Vec::new(),
                fail_after: None,
            }
        }
    }

    #[async_trait]
    impl StreamSink for VecSink {
        async fn send(&mut self, data: String) -> Result<(), StreamClosed> {
            if let Some(limit) = self.fail_after {
                if self.chunks.len() >= limit {
                    return Err(StreamClosed);
                }
            }
            self.chunks.push(data);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_sends_nothing() {
        let mut sink = VecSink::new();
        stream_text(&mut sink, "").await;
        assert!(sink.chunks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn short_text_is_one_delimited_chunk() {
        let mut sink = VecSink::new();
        stream_text(&mut sink, "hi").await;
        assert_eq!(sink.chunks, vec!["hi<|>"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exact_chunk_boundary_sends_one_chunk() {
        let mut sink = VecSink::new();
        stream_text(&mut sink, "abcde").await;
        assert_eq!(sink.chunks, vec!["abcde<|>"]);
    }

    #[tokio::test(start_paused = true)]
    async fn six_chars_split_five_and_one() {
        let mut sink = VecSink::new();
        stream_text(&mut sink, "abcdef").await;
        assert_eq!(sink.chunks, vec!["abcde<|>", "f<|>"]);
    }

    #[tokio::test(start_paused = true)]
    async fn long_text_reassembles_after_stripping_delimiters() {
        let text = "The artists table has 275 rows in total.";
        let mut sink = VecSink::new();
        stream_text(&mut sink, text).await;

        let reassembled: String = sink
            .chunks
            .iter()
            .map(|c| c.strip_suffix("<|>").unwrap())
            .collect();
        assert_eq!(reassembled, text);
        assert_eq!(sink.chunks.len(), text.chars().count().div_ceil(5));
    }

    #[tokio::test(start_paused = true)]
    async fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld";
        let mut sink = VecSink::new();
        stream_text(&mut sink, text).await;
        assert_eq!(sink.chunks[0], "héllo<|>");
        let reassembled: String = sink
            .chunks
            .iter()
            .map(|c| c.strip_suffix("<|>").unwrap())
            .collect();
        assert_eq!(reassembled, text);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_sink_stops_the_stream_quietly() {
        let mut sink = VecSink::new();
        sink.fail_after = Some(2);
        stream_text(&mut sink, "a very long reply that keeps going").await;
        assert_eq!(sink.chunks.len(), 2);
    }
}
