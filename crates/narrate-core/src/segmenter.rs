//! Splitting long input into engine-sized segments.
//!
//! Cuts are placed after the right-most occurrence of the most preferred
//! delimiter found in the current window. A hard cut at the window edge is
//! only taken when the window holds no delimiter at all.

use tracing::debug;

/// Break points in order of preference
pub const DELIMITERS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", "; "];

/// One bounded slice of the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSegment<'a> {
    /// Position of the segment in the sequence
    pub index: usize,
    /// Segment text with surrounding whitespace removed
    pub text: &'a str,
}

/// Lazy iterator over the segments of a text
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    text: &'a str,
    max_length: usize,
    position: usize,
    next_index: usize,
    whole: bool,
}

/// Segment `text` into chunks of at most `max_length` characters.
///
/// Text that already fits is yielded as a single segment.
///
/// # Panics
///
/// Panics if `max_length` is zero.
#[must_use]
pub fn segment_text(text: &str, max_length: usize) -> Segments<'_> {
    assert!(max_length > 0, "max_length must be greater than 0");
    let whole = text.chars().count() <= max_length;
    debug!(
        "Segmenting {} characters (max {max_length}, single: {whole})",
        text.len()
    );
    Segments {
        text,
        max_length,
        position: 0,
        next_index: 0,
        whole,
    }
}

impl<'a> Segments<'a> {
    /// Byte offset of the end of the window starting at the current position
    fn window_end(&self) -> usize {
        self.text[self.position..]
            .char_indices()
            .nth(self.max_length)
            .map_or(self.text.len(), |(offset, _)| self.position + offset)
    }

    fn cut_point(&self) -> usize {
        let end = self.window_end();
        if end >= self.text.len() {
            return end;
        }

        let window = &self.text[self.position..end];
        DELIMITERS
            .iter()
            .find_map(|delim| {
                window
                    .rfind(delim)
                    .map(|found| self.position + found + delim.len())
            })
            .unwrap_or(end)
    }

    fn emit(&mut self, text: &'a str) -> TextSegment<'a> {
        let segment = TextSegment {
            index: self.next_index,
            text,
        };
        self.next_index += 1;
        debug!("Created segment {}: {} characters", segment.index, text.len());
        segment
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = TextSegment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.whole {
            self.whole = false;
            self.position = self.text.len();
            let trimmed = self.text.trim();
            return (!trimmed.is_empty()).then(|| self.emit(trimmed));
        }

        while self.position < self.text.len() {
            let cut = self.cut_point();
            let trimmed = self.text[self.position..cut].trim();
            self.position = cut;
            if !trimmed.is_empty() {
                return Some(self.emit(trimmed));
            }
        }
        None
    }
}

impl std::iter::FusedIterator for Segments<'_> {}
