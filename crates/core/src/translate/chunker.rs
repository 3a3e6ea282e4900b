//! Incremental translation chunking.
//!
//! Batches newly recognized text until a chunk is worth translating, to
//! bound both subtitle latency and the number of external calls. Only whole
//! accumulated chunks are ever translated: partial translations of partial
//! transcripts reorder badly across languages, so output is always final.

use crate::recognizer::{ItemKind, TranscriptItem};

/// Characters that end a sentence and trigger a flush.
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Buffered word count that triggers a flush even mid-sentence.
const WORD_FLUSH_THRESHOLD: usize = 40;

/// Per-run buffering state for the cross-language path.
///
/// Tracks how far into the recognizer's cumulative item list it has read
/// (`last_processed_item_index`) so revised partials never re-buffer text
/// that was already folded in.
#[derive(Debug, Default)]
pub struct TranslationChunker {
    untranslated: String,
    last_processed_item_index: usize,
}

impl TranslationChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one recognizer result into the buffer and decide whether to
    /// flush. Returns the chunk to translate when it is ready.
    pub fn absorb(&mut self, items: &[TranscriptItem], is_partial: bool) -> Option<String> {
        if items.len() < self.last_processed_item_index {
            // The recognizer restarted its utterance; every item is new again.
            self.last_processed_item_index = 0;
        }

        let new_items = &items[self.last_processed_item_index..];
        self.last_processed_item_index = items.len();

        for item in new_items {
            match item.kind {
                ItemKind::Word => {
                    self.untranslated.push(' ');
                    self.untranslated.push_str(&item.content);
                }
                ItemKind::Punctuation => self.untranslated.push_str(&item.content),
            }
        }

        if self.should_flush(is_partial) {
            Some(self.take())
        } else {
            None
        }
    }

    fn should_flush(&self, is_partial: bool) -> bool {
        if self.untranslated.trim().is_empty() {
            return false;
        }
        // A finalized utterance always flushes, whatever its size.
        !is_partial
            || self.untranslated.contains(SENTENCE_TERMINATORS)
            || self.word_count() >= WORD_FLUSH_THRESHOLD
    }

    fn word_count(&self) -> usize {
        self.untranslated.split_whitespace().count()
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.untranslated).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::TranscriptItem;

    fn words(contents: &[&str]) -> Vec<TranscriptItem> {
        contents.iter().map(|w| TranscriptItem::word(*w)).collect()
    }

    #[test]
    fn test_partial_without_trigger_buffers() {
        let mut chunker = TranslationChunker::new();
        assert_eq!(chunker.absorb(&words(&["hello", "there"]), true), None);
    }

    #[test]
    fn test_sentence_terminator_flushes() {
        let mut chunker = TranslationChunker::new();
        let mut items = words(&["hello", "there"]);
        items.push(TranscriptItem::punctuation("."));
        assert_eq!(chunker.absorb(&items, true), Some("hello there.".to_string()));
    }

    #[test]
    fn test_cjk_terminator_flushes() {
        let mut chunker = TranslationChunker::new();
        let mut items = words(&["你好"]);
        items.push(TranscriptItem::punctuation("。"));
        assert!(chunker.absorb(&items, true).is_some());
    }

    #[test]
    fn test_word_threshold_flushes() {
        let mut chunker = TranslationChunker::new();
        let many: Vec<String> = (0..40).map(|i| format!("word{}", i)).collect();
        let items: Vec<TranscriptItem> =
            many.iter().map(|w| TranscriptItem::word(w.clone())).collect();
        let flushed = chunker.absorb(&items, true).expect("40 words must flush");
        assert_eq!(flushed.split_whitespace().count(), 40);
    }

    #[test]
    fn test_final_result_always_flushes() {
        let mut chunker = TranslationChunker::new();
        assert_eq!(
            chunker.absorb(&words(&["short"]), false),
            Some("short".to_string())
        );
    }

    #[test]
    fn test_never_flushes_empty_buffer() {
        let mut chunker = TranslationChunker::new();
        assert_eq!(chunker.absorb(&[], false), None);
    }

    #[test]
    fn test_only_new_items_are_buffered() {
        let mut chunker = TranslationChunker::new();

        // Cumulative partials: the second result repeats the first item.
        assert_eq!(chunker.absorb(&words(&["hello"]), true), None);
        let flushed = chunker
            .absorb(&words(&["hello", "world"]), false)
            .expect("final flushes");

        // "hello" was folded in once, not twice.
        assert_eq!(flushed, "hello world");
    }

    #[test]
    fn test_utterance_restart_resets_index() {
        let mut chunker = TranslationChunker::new();

        assert_eq!(chunker.absorb(&words(&["one", "two", "three"]), true), None);

        // A shorter item list means the recognizer started a new utterance.
        let flushed = chunker.absorb(&words(&["four"]), false).expect("final flushes");
        assert_eq!(flushed, "one two three four");
    }

    #[test]
    fn test_accumulates_across_partials_until_final() {
        let mut chunker = TranslationChunker::new();

        // Ten words spread over three partials, no terminal punctuation:
        // nothing flushes until the finalized result arrives.
        assert_eq!(chunker.absorb(&words(&["a", "b", "c"]), true), None);
        assert_eq!(
            chunker.absorb(&words(&["a", "b", "c", "d", "e", "f"]), true),
            None
        );
        assert_eq!(
            chunker.absorb(&words(&["a", "b", "c", "d", "e", "f", "g", "h", "i"]), true),
            None
        );

        let flushed = chunker
            .absorb(
                &words(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]),
                false,
            )
            .expect("finalization flushes the whole accumulated text");
        assert_eq!(flushed, "a b c d e f g h i j");
    }
}
