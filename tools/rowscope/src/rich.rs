/// Display attribute attached to a run of text. The presentation layer maps
/// each attribute onto a terminal style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Normal,
    Shadow,
    Megabytes,
    Gigabytes,
    LargeNumber,
    Highlight,
    HeaderFocus,
    SelectionFocus,
    Tagged,
    New,
    Tomb,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub attr: Attr,
    pub text: String,
}

/// A single line of attributed text, built left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichLine {
    segments: Vec<Segment>,
}

impl RichLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, attr: Attr, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(last) if last.attr == attr => last.text.push_str(text),
            _ => self.segments.push(Segment {
                attr,
                text: text.to_string(),
            }),
        }
    }

    /// Appends at most `n` characters of `text`.
    pub fn append_n(&mut self, attr: Attr, text: &str, n: usize) {
        let clipped = text.chars().take(n).collect::<String>();
        self.append(attr, &clipped);
    }

    /// Number of characters in the line.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.text.chars().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_char(&self) -> Option<char> {
        self.segments.last().and_then(|s| s.text.chars().last())
    }

    /// Drops the trailing `n` characters.
    pub fn rewind(&mut self, mut n: usize) {
        while n > 0 {
            let Some(last) = self.segments.last_mut() else {
                return;
            };
            let count = last.text.chars().count();
            if count <= n {
                n -= count;
                self.segments.pop();
            } else {
                let keep = count - n;
                let cut = last
                    .text
                    .char_indices()
                    .nth(keep)
                    .map(|(idx, _)| idx)
                    .unwrap_or(last.text.len());
                last.text.truncate(cut);
                n = 0;
            }
        }
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Recolours the whole line with one attribute.
    pub fn set_attr(&mut self, attr: Attr) {
        let text = self.text();
        self.segments.clear();
        self.append(attr, &text);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Attribute of the character at `index`, if any.
    pub fn attr_at(&self, index: usize) -> Option<Attr> {
        let mut seen = 0;
        for segment in &self.segments {
            let count = segment.text.chars().count();
            if index < seen + count {
                return Some(segment.attr);
            }
            seen += count;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{Attr, RichLine};

    #[test]
    fn adjacent_runs_with_same_attr_merge() {
        let mut line = RichLine::new();
        line.append(Attr::Normal, "ab");
        line.append(Attr::Normal, "cd");
        line.append(Attr::Shadow, "e");
        assert_eq!(line.segments().len(), 2);
        assert_eq!(line.text(), "abcde");
        assert_eq!(line.attr_at(4), Some(Attr::Shadow));
        assert_eq!(line.attr_at(5), None);
    }

    #[test]
    fn rewind_crosses_segment_boundaries() {
        let mut line = RichLine::new();
        line.append(Attr::Normal, "abc");
        line.append(Attr::Shadow, "de");
        line.rewind(3);
        assert_eq!(line.text(), "ab");
        assert_eq!(line.last_char(), Some('b'));
        line.rewind(10);
        assert!(line.is_empty());
    }

    #[test]
    fn set_attr_collapses_to_one_run() {
        let mut line = RichLine::new();
        line.append(Attr::Normal, "ab");
        line.append(Attr::Megabytes, "cd");
        line.set_attr(Attr::Tagged);
        assert_eq!(line.segments().len(), 1);
        assert_eq!(line.text(), "abcd");
        assert_eq!(line.attr_at(3), Some(Attr::Tagged));
    }

    #[test]
    fn append_n_clips_wide_text() {
        let mut line = RichLine::new();
        line.append_n(Attr::Tree, "▲▼", 1);
        assert_eq!(line.text(), "▲");
        assert_eq!(line.len(), 1);
    }
}
