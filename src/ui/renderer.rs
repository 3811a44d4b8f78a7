//! Console renderer using crossterm
//!
//! Paints styled text either full-screen (the interactive terminal) or as
//! plain coloured output (the memory dump).

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use unicode_width::UnicodeWidthChar;

use super::styled::{Style, StyledText};
use crate::config::ColorScheme;

const TAB_WIDTH: usize = 8;

/// Styled text broken into screen lines
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub lines: Vec<Vec<(char, Style)>>,
    /// Cursor as (line, column)
    pub cursor: (usize, usize),
}

/// Wrap `text` to `width` columns and locate the character index `cursor`
pub fn layout(text: &StyledText, cursor: usize, width: usize) -> Layout {
    let width = width.max(1);
    let mut lines: Vec<Vec<(char, Style)>> = vec![Vec::new()];
    let mut col = 0;
    let mut cursor_at = None;
    let mut index = 0;

    for run in text.runs() {
        for ch in run.text.chars() {
            if ch == '\n' {
                if index == cursor {
                    cursor_at = Some((lines.len() - 1, col));
                }
                lines.push(Vec::new());
                col = 0;
                index += 1;
                continue;
            }

            let (glyph, w) = if ch == '\t' {
                (' ', TAB_WIDTH - col % TAB_WIDTH)
            } else {
                (ch, ch.width().unwrap_or(0))
            };
            if col + w > width && col > 0 {
                lines.push(Vec::new());
                col = 0;
            }
            if index == cursor {
                cursor_at = Some((lines.len() - 1, col));
            }

            if let Some(line) = lines.last_mut() {
                if ch == '\t' {
                    line.extend(std::iter::repeat((glyph, run.style)).take(w));
                } else if w > 0 {
                    line.push((glyph, run.style));
                }
            }
            col += w;
            index += 1;
        }
    }

    let cursor = cursor_at.unwrap_or((lines.len() - 1, col.min(width - 1)));
    Layout { lines, cursor }
}

/// Cut `text` to at most `width` display columns
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Write styled text with colours to a normal (non raw) console
pub fn write_styled<W: Write>(out: &mut W, text: &StyledText, scheme: &ColorScheme) -> io::Result<()> {
    for run in text.runs() {
        queue!(
            out,
            SetForegroundColor(scheme.color_for(run.style).to_crossterm()),
            Print(&run.text)
        )?;
    }
    queue!(out, ResetColor)?;
    out.flush()
}

/// Full-screen terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self { initialized: false }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Clear(ClearType::All), MoveTo(0, 0))?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset), Show);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    /// Paint the tail of `text` above a one-line status bar
    pub fn render(
        &mut self,
        text: &StyledText,
        cursor: usize,
        status: &str,
        scheme: &ColorScheme,
    ) -> io::Result<()> {
        let (cols, rows) = Self::size()?;
        let body_rows = rows.saturating_sub(1) as usize;
        let layout = layout(text, cursor, cols as usize);
        // Always show the end of the transcript
        let first = layout.lines.len().saturating_sub(body_rows);

        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());

        // Begin synchronized update (reduces flicker)
        write!(stdout, "\x1b[?2026h")?;
        queue!(stdout, Hide, SetBackgroundColor(scheme.background.to_crossterm()))?;

        for row in 0..body_rows {
            queue!(stdout, MoveTo(0, row as u16), Clear(ClearType::UntilNewLine))?;
            let Some(line) = layout.lines.get(first + row) else {
                continue;
            };

            let mut current: Option<Style> = None;
            let mut buffer = String::with_capacity(line.len());
            for &(ch, style) in line {
                if current != Some(style) {
                    if let Some(prev) = current {
                        Self::flush_span(&mut stdout, &buffer, prev, scheme)?;
                        buffer.clear();
                    }
                    current = Some(style);
                }
                buffer.push(ch);
            }
            if let Some(style) = current {
                Self::flush_span(&mut stdout, &buffer, style, scheme)?;
            }
        }

        // Status bar
        let status = truncate_to_width(status, cols as usize);
        let pad = (cols as usize).saturating_sub(status.chars().map(|c| c.width().unwrap_or(0)).sum());
        queue!(
            stdout,
            MoveTo(0, rows.saturating_sub(1)),
            SetBackgroundColor(scheme.status_bar_bg.to_crossterm()),
            SetForegroundColor(scheme.status_bar_fg.to_crossterm()),
            Print(&status),
            Print(" ".repeat(pad)),
            ResetColor
        )?;

        let (line, col) = layout.cursor;
        if line >= first && line - first < body_rows {
            queue!(stdout, MoveTo(col as u16, (line - first) as u16), Show)?;
        }

        // End synchronized update
        write!(stdout, "\x1b[?2026l")?;
        stdout.flush()
    }

    fn flush_span<W: Write>(
        out: &mut W,
        text: &str,
        style: Style,
        scheme: &ColorScheme,
    ) -> io::Result<()> {
        queue!(
            out,
            SetForegroundColor(scheme.color_for(style).to_crossterm()),
            Print(text)
        )
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(layout: &Layout, line: usize) -> String {
        layout.lines[line].iter().map(|(ch, _)| ch).collect()
    }

    #[test]
    fn test_layout_wraps_and_breaks() {
        let mut text = StyledText::new();
        text.append(Style::Output, "abcdef\ngh");
        let layout = layout(&text, 9, 4);

        assert_eq!(layout.lines.len(), 3);
        assert_eq!(line_text(&layout, 0), "abcd");
        assert_eq!(line_text(&layout, 1), "ef");
        assert_eq!(line_text(&layout, 2), "gh");
        assert_eq!(layout.cursor, (2, 2));
    }

    #[test]
    fn test_layout_cursor_on_wrapped_char() {
        let mut text = StyledText::new();
        text.append(Style::Typing, "abcde");
        let layout = layout(&text, 4, 4);
        assert_eq!(layout.cursor, (1, 0));
    }

    #[test]
    fn test_layout_wide_chars_and_tabs() {
        let mut text = StyledText::new();
        text.append(Style::Default, "日本\tx");
        let layout = layout(&text, 0, 80);

        // Two double-width glyphs, then a tab to column 8
        assert_eq!(line_text(&layout, 0), "日本    x");
        assert_eq!(layout.cursor, (0, 0));
    }

    #[test]
    fn test_layout_keeps_styles() {
        let mut text = StyledText::new();
        text.append(Style::Info, "a");
        text.append(Style::Stderr, "b");
        let layout = layout(&text, 2, 10);
        assert_eq!(layout.lines[0], vec![('a', Style::Info), ('b', Style::Stderr)]);
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("hello", 3), "hel");
        assert_eq!(truncate_to_width("日本語", 5), "日本");
    }

    #[test]
    fn test_write_styled_contains_text() {
        let mut text = StyledText::new();
        text.append(Style::Changed, "ff");
        let mut out = Vec::new();
        write_styled(&mut out, &text, &ColorScheme::default()).unwrap();

        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("ff"));
        assert!(written.contains("\x1b["));
    }
}
