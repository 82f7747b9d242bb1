use ropey::Rope;

/// Caret inside the raw source view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceCursor {
    /// Zero-based line index.
    pub line: usize,
    /// Zero-based column, in bytes within the line.
    pub col: usize,
}

impl SourceCursor {
    pub const fn at(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// The raw markdown shown by the source and diff views, backed by a rope.
///
/// Mirrors the exported snapshot while the rich view is active; in the
/// source view the user edits it directly and it is reconciled back into the
/// structured tree on the next view-mode transition.
pub struct SourceBuffer {
    rope: Rope,
    cursor: SourceCursor,
    dirty: bool,
}

impl SourceBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            cursor: SourceCursor::default(),
            dirty: false,
        }
    }

    pub fn empty() -> Self {
        Self::from_text("")
    }

    pub const fn cursor(&self) -> SourceCursor {
        self.cursor
    }

    /// Whether the text was edited since it was last synced from a snapshot.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// A line without its terminator.
    pub fn line_at(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(line_idx).to_string();
        Some(line.trim_end_matches('\n').trim_end_matches('\r').to_string())
    }

    fn line_len(&self, line_idx: usize) -> usize {
        self.line_at(line_idx).map_or(0, |s| s.len())
    }

    /// Replace the text with a fresh snapshot. Not an edit: the buffer is
    /// clean afterwards and the cursor is clamped into the new text.
    pub fn sync(&mut self, text: &str) {
        if self.rope != text {
            self.rope = Rope::from_str(text);
        }
        self.dirty = false;
        self.move_to(self.cursor.line, self.cursor.col);
    }

    /// Replace the whole text as a user edit.
    pub fn replace_all(&mut self, text: &str) {
        if self.rope == text {
            return;
        }
        self.rope = Rope::from_str(text);
        self.dirty = true;
        self.move_to(self.cursor.line, self.cursor.col);
    }

    /// Insert at the cursor and move past the inserted text.
    pub fn insert_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        let char_idx = self.cursor_char_idx();
        self.rope.insert(char_idx, s);
        match s.rsplit_once('\n') {
            Some((head, tail)) => {
                self.cursor.line += head.matches('\n').count() + 1;
                self.cursor.col = tail.len();
            }
            None => self.cursor.col += s.len(),
        }
        self.dirty = true;
    }

    /// Delete the character before the cursor, joining lines at column 0.
    pub fn delete_back(&mut self) -> bool {
        if self.cursor.col == 0 && self.cursor.line == 0 {
            return false;
        }
        let char_idx = self.cursor_char_idx();
        if self.cursor.col == 0 {
            let previous_len = self.line_len(self.cursor.line - 1);
            self.rope.remove(char_idx - 1..char_idx);
            self.cursor.line -= 1;
            self.cursor.col = previous_len;
        } else {
            let line = self.line_at(self.cursor.line).unwrap_or_default();
            let width = line[..self.cursor.col]
                .chars()
                .next_back()
                .map_or(1, char::len_utf8);
            self.rope.remove(char_idx - 1..char_idx);
            self.cursor.col -= width;
        }
        self.dirty = true;
        true
    }

    /// Move the cursor, clamped to the text and to a character boundary.
    pub fn move_to(&mut self, line: usize, col: usize) {
        self.cursor.line = line.min(self.line_count().saturating_sub(1));
        let text = self.line_at(self.cursor.line).unwrap_or_default();
        let mut col = col.min(text.len());
        while !text.is_char_boundary(col) {
            col -= 1;
        }
        self.cursor.col = col;
    }

    pub fn move_to_end(&mut self) {
        let last = self.line_count().saturating_sub(1);
        self.move_to(last, usize::MAX);
    }

    fn cursor_char_idx(&self) -> usize {
        let line_start = self.rope.line_to_char(self.cursor.line);
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let col = self.cursor.col.min(line.len());
        line_start + line[..col].chars().count()
    }
}

impl std::fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("rope", &format_args!("Rope({} lines)", self.rope.len_lines()))
            .field("cursor", &self.cursor)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_has_one_line() {
        let buf = SourceBuffer::empty();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_at(0), Some(String::new()));
    }

    #[test]
    fn test_sync_is_not_an_edit() {
        let mut buf = SourceBuffer::from_text("# a");
        buf.sync("# b\n");
        assert!(!buf.is_dirty());
        assert_eq!(buf.text(), "# b\n");
    }

    #[test]
    fn test_replace_all_marks_dirty_only_on_change() {
        let mut buf = SourceBuffer::from_text("same");
        buf.replace_all("same");
        assert!(!buf.is_dirty());
        buf.replace_all("other");
        assert!(buf.is_dirty());
    }

    #[test]
    fn test_insert_multiline_moves_cursor() {
        let mut buf = SourceBuffer::from_text("ac");
        buf.move_to(0, 1);
        buf.insert_str("b\nx\ny");
        assert_eq!(buf.text(), "ab\nx\nyc");
        assert_eq!(buf.cursor(), SourceCursor::at(2, 1));
    }

    #[test]
    fn test_delete_back_joins_lines() {
        let mut buf = SourceBuffer::from_text("hello\nworld");
        buf.move_to(1, 0);
        assert!(buf.delete_back());
        assert_eq!(buf.text(), "helloworld");
        assert_eq!(buf.cursor(), SourceCursor::at(0, 5));
    }

    #[test]
    fn test_delete_back_multibyte() {
        let mut buf = SourceBuffer::from_text("café");
        buf.move_to_end();
        buf.delete_back();
        assert_eq!(buf.text(), "caf");
        assert_eq!(buf.cursor(), SourceCursor::at(0, 3));
    }

    #[test]
    fn test_move_to_clamps_inside_char() {
        let mut buf = SourceBuffer::from_text("é");
        buf.move_to(5, 1);
        assert_eq!(buf.cursor(), SourceCursor::at(0, 0));
    }

    #[test]
    fn test_sync_clamps_cursor() {
        let mut buf = SourceBuffer::from_text("line one\nline two");
        buf.move_to(1, 8);
        buf.sync("x");
        assert_eq!(buf.cursor(), SourceCursor::at(0, 1));
    }
}
