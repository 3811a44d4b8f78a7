//! Styled text surface
//!
//! An append/insert text buffer made of styled runs. Both the memory dump
//! view and the terminal transcript write into one of these; the renderer
//! paints it with the active color scheme.
//!
//! Positions are character indices, not byte offsets.

use std::ops::Range;

/// Visual role of a span of text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Style {
    /// Plain text
    #[default]
    Default,
    /// Memory bytes that differ from the previous capture
    Changed,
    /// Welcome banner
    Banner,
    /// "Running: ..." information line
    Info,
    /// Program stdout
    Output,
    /// Program stderr
    Stderr,
    /// Failure to start a program
    Failure,
    /// Line break echoed after a line was sent to stdin
    Sent,
    /// Characters typed by the user
    Typing,
    /// Exit status line
    Exited,
}

/// A run of text sharing one style
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run {
    pub style: Style,
    pub text: String,
}

/// Styled text buffer
#[derive(Clone, Debug, Default)]
pub struct StyledText {
    runs: Vec<Run>,
    /// Length in characters
    len: usize,
    /// Nesting depth of freeze() calls
    freeze_depth: u32,
    /// Set when the view should scroll to the end on next paint
    scroll_pending: bool,
}

impl StyledText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Whole text without styling
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Remove all text. Freeze state is kept.
    pub fn clear(&mut self) {
        self.runs.clear();
        self.len = 0;
    }

    /// Append text at the end. Returns the new end position.
    pub fn append(&mut self, style: Style, text: &str) -> usize {
        if text.is_empty() {
            return self.len;
        }
        self.len += text.chars().count();
        match self.runs.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.runs.push(Run {
                style,
                text: text.to_string(),
            }),
        }
        self.len
    }

    /// Insert text at `pos` (clamped to the end).
    /// Returns the position just after the inserted text.
    pub fn insert(&mut self, pos: usize, style: Style, text: &str) -> usize {
        if pos >= self.len {
            return self.append(style, text);
        }
        if text.is_empty() {
            return pos;
        }

        let (idx, offset) = self.locate(pos);
        let inserted = Run {
            style,
            text: text.to_string(),
        };
        if offset == 0 {
            self.runs.insert(idx, inserted);
        } else {
            let run = &mut self.runs[idx];
            let split_at = byte_index(&run.text, offset);
            let tail = Run {
                style: run.style,
                text: run.text.split_off(split_at),
            };
            self.runs.insert(idx + 1, inserted);
            self.runs.insert(idx + 2, tail);
        }

        let count = text.chars().count();
        self.len += count;
        self.normalize();
        pos + count
    }

    /// Remove the characters in `range` (clamped to the text).
    pub fn remove(&mut self, range: Range<usize>) {
        let start = range.start.min(self.len);
        let end = range.end.min(self.len);
        if start >= end {
            return;
        }

        let mut run_start = 0;
        for run in &mut self.runs {
            let count = run.text.chars().count();
            let run_end = run_start + count;
            if run_end > start && run_start < end {
                let from = start.saturating_sub(run_start);
                let to = (end - run_start).min(count);
                let a = byte_index(&run.text, from);
                let b = byte_index(&run.text, to);
                run.text.replace_range(a..b, "");
            }
            run_start = run_end;
        }

        self.len -= end - start;
        self.normalize();
    }

    /// Text in `range` (clamped to the text)
    pub fn slice(&self, range: Range<usize>) -> String {
        let start = range.start.min(self.len);
        let end = range.end.min(self.len);
        self.runs
            .iter()
            .flat_map(|r| r.text.chars())
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }

    /// Style of the character at `pos`
    pub fn style_at(&self, pos: usize) -> Option<Style> {
        if pos >= self.len {
            return None;
        }
        let (idx, _) = self.locate(pos);
        Some(self.runs[idx].style)
    }

    /// Suspend repaints while a batch of appends happens
    pub fn freeze(&mut self) {
        self.freeze_depth += 1;
    }

    pub fn thaw(&mut self) {
        self.freeze_depth = self.freeze_depth.saturating_sub(1);
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_depth > 0
    }

    pub fn request_scroll_to_end(&mut self) {
        self.scroll_pending = true;
    }

    /// Returns and resets the scroll request
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    /// Find the run containing `pos` and the character offset inside it.
    /// `pos` must be less than `len`.
    fn locate(&self, pos: usize) -> (usize, usize) {
        let mut run_start = 0;
        for (idx, run) in self.runs.iter().enumerate() {
            let count = run.text.chars().count();
            if pos < run_start + count {
                return (idx, pos - run_start);
            }
            run_start += count;
        }
        (self.runs.len().saturating_sub(1), 0)
    }

    /// Drop empty runs and merge neighbours with the same style
    fn normalize(&mut self) {
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.style == run.style => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

/// Byte index of the `chars`-th character of `s` (or `s.len()`)
fn byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_merges_same_style() {
        let mut text = StyledText::new();
        text.append(Style::Output, "ab");
        text.append(Style::Output, "cd");
        text.append(Style::Stderr, "e");

        assert_eq!(text.len(), 5);
        assert_eq!(text.runs().len(), 2);
        assert_eq!(text.text(), "abcde");
    }

    #[test]
    fn test_insert_splits_run() {
        let mut text = StyledText::new();
        text.append(Style::Info, "hello world");

        let end = text.insert(5, Style::Output, ",");
        assert_eq!(end, 6);
        assert_eq!(text.text(), "hello, world");
        assert_eq!(text.style_at(4), Some(Style::Info));
        assert_eq!(text.style_at(5), Some(Style::Output));
        assert_eq!(text.style_at(6), Some(Style::Info));
    }

    #[test]
    fn test_insert_multibyte() {
        let mut text = StyledText::new();
        text.append(Style::Default, "añb");
        text.insert(2, Style::Typing, "é");

        assert_eq!(text.text(), "añéb");
        assert_eq!(text.len(), 4);
        assert_eq!(text.slice(1..3), "ñé");
    }

    #[test]
    fn test_remove_across_runs() {
        let mut text = StyledText::new();
        text.append(Style::Output, "abc");
        text.append(Style::Typing, "def");
        text.append(Style::Output, "ghi");

        text.remove(2..7);
        assert_eq!(text.text(), "abhi");
        assert_eq!(text.len(), 4);
        // Typing run vanished, the two Output runs merged
        assert_eq!(text.runs().len(), 1);
    }

    #[test]
    fn test_freeze_nesting() {
        let mut text = StyledText::new();
        text.freeze();
        text.freeze();
        text.thaw();
        assert!(text.is_frozen());
        text.thaw();
        assert!(!text.is_frozen());
        text.thaw();
        assert!(!text.is_frozen());
    }
}
