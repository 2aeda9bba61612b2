//! Splitting outbound text under Telegram's message length limit.
//!
//! Plain text is cut at line boundaries where possible. HTML is cut the same
//! way, but every chunk closes the tags still open at the cut and the next
//! chunk reopens them, so each message parses on its own.

/// Split plain text into chunks of at most `limit` bytes.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }
    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split_inclusive('\n') {
        if chunk.len() + line.len() > limit && !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }
        let mut rest = line;
        while chunk.len() + rest.len() > limit {
            let (head, tail) = split_utf8_prefix(rest, limit - chunk.len());
            chunk.push_str(head);
            out.push(std::mem::take(&mut chunk));
            rest = tail;
        }
        chunk.push_str(rest);
    }
    if !chunk.trim().is_empty() {
        out.push(chunk);
    }
    out
}

/// Split Telegram HTML into chunks of at most `limit` bytes with balanced tags.
pub fn split_html(html: &str, limit: usize) -> Vec<String> {
    if html.len() <= limit {
        return vec![html.to_string()];
    }
    let mut splitter = HtmlSplitter {
        limit,
        out: Vec::new(),
        chunk: String::new(),
        open: Vec::new(),
    };
    for token in tokenize(html) {
        match token {
            Token::Tag(t) => splitter.push_tag(t),
            Token::Text(t) => splitter.push_text(t),
        }
    }
    splitter.flush();
    splitter.out
}

#[derive(Clone, Debug)]
struct OpenTag {
    name: String,
    open: String,
    close: String,
}

enum Token<'a> {
    Tag(&'a str),
    Text(&'a str),
}

enum TagKind {
    Open(OpenTag),
    Close(String),
    Other,
}

struct HtmlSplitter {
    limit: usize,
    out: Vec<String>,
    chunk: String,
    open: Vec<OpenTag>,
}

impl HtmlSplitter {
    fn open_len(&self) -> usize {
        self.open.iter().map(|t| t.open.len()).sum()
    }

    fn close_len(&self) -> usize {
        self.open.iter().map(|t| t.close.len()).sum()
    }

    fn open_index(&self, name: &str) -> Option<usize> {
        self.open.iter().rposition(|t| t.name == name)
    }

    fn close_len_after_closing(&self, name: &str) -> usize {
        match self.open_index(name) {
            Some(i) => self.open[..i].iter().map(|t| t.close.len()).sum(),
            None => self.close_len(),
        }
    }

    /// Emit the current chunk (closing open tags) and start the next one.
    fn cut(&mut self) {
        self.flush();
        for t in &self.open {
            self.chunk.push_str(&t.open);
        }
    }

    fn flush(&mut self) {
        if self.chunk.len() <= self.open_len() {
            // Nothing but reopened tags.
            self.chunk.clear();
            return;
        }
        let mut msg = std::mem::take(&mut self.chunk);
        for t in self.open.iter().rev() {
            msg.push_str(&t.close);
        }
        self.out.push(msg);
    }

    fn push_tag(&mut self, tag: &str) {
        let kind = classify(tag);
        if let TagKind::Close(name) = &kind {
            // Its opening tag was dropped or never existed.
            if self.open_index(name).is_none() {
                return;
            }
        }
        let close_after = match &kind {
            TagKind::Open(t) => self.close_len() + t.close.len(),
            TagKind::Close(name) => self.close_len_after_closing(name),
            TagKind::Other => self.close_len(),
        };
        if self.chunk.len() + tag.len() + close_after > self.limit
            && self.chunk.len() > self.open_len()
        {
            self.cut();
        }
        if self.chunk.len() + tag.len() + close_after > self.limit {
            // Cannot fit even in a fresh chunk; drop it.
            return;
        }
        self.chunk.push_str(tag);
        match kind {
            TagKind::Open(t) => self.open.push(t),
            TagKind::Close(name) => {
                if let Some(i) = self.open_index(&name) {
                    self.open.truncate(i);
                }
            }
            TagKind::Other => {}
        }
    }

    fn push_text(&mut self, mut text: &str) {
        while !text.is_empty() {
            let Some(available) = self.limit.checked_sub(self.close_len()) else {
                return;
            };
            if self.chunk.len() >= available {
                if self.chunk.len() <= self.open_len() {
                    return;
                }
                self.cut();
                continue;
            }
            let room = available - self.chunk.len();
            let (head, tail) = if text.len() <= room {
                (text, "")
            } else {
                // Prefer to cut after the last newline that fits.
                match text[..floor_char_boundary(text, room)].rfind('\n') {
                    Some(i) => text.split_at(i + 1),
                    _ => split_utf8_prefix(text, room),
                }
            };
            self.chunk.push_str(head);
            text = tail;
            if !text.is_empty() {
                self.cut();
            }
        }
    }
}

fn tokenize(mut s: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    while !s.is_empty() {
        let Some(start) = s.find('<') else {
            out.push(Token::Text(s));
            break;
        };
        if start > 0 {
            out.push(Token::Text(&s[..start]));
            s = &s[start..];
        }
        let Some(end) = s.find('>') else {
            out.push(Token::Text(s));
            break;
        };
        out.push(Token::Tag(&s[..=end]));
        s = &s[end + 1..];
    }
    out
}

fn classify(tag: &str) -> TagKind {
    if let Some(rest) = tag.strip_prefix("</") {
        let name = tag_name(rest);
        return if name.is_empty() {
            TagKind::Other
        } else {
            TagKind::Close(name)
        };
    }
    if tag.ends_with("/>") {
        return TagKind::Other;
    }
    let name = tag_name(&tag[1..]);
    if name.is_empty() {
        return TagKind::Other;
    }
    TagKind::Open(OpenTag {
        close: format!("</{name}>"),
        name,
        open: tag.to_string(),
    })
}

fn tag_name(after_lt: &str) -> String {
    after_lt
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut i = max.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Longest prefix of at most `max_bytes`; always makes progress.
fn split_utf8_prefix(s: &str, max_bytes: usize) -> (&str, &str) {
    let idx = floor_char_boundary(s, max_bytes);
    if idx == 0 {
        let next = s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len());
        return s.split_at(next);
    }
    s.split_at(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_untouched() {
        let html = "⬇️ <b>Hi</b>\n<i>x</i>";
        assert_eq!(split_html(html, 4000), vec![html.to_string()]);
        assert_eq!(split_text("abc", 10), vec!["abc".to_string()]);
    }

    #[test]
    fn long_tagged_line_is_balanced_per_chunk() {
        let long = "x".repeat(200);
        let html = format!("Topic: <i>{long}</i>");
        let chunks = split_html(&html, 50);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 50);
            assert_eq!(c.matches("<i>").count(), c.matches("</i>").count());
        }
        let joined: String = chunks.concat().replace("<i>", "").replace("</i>", "");
        assert_eq!(joined, format!("Topic: {long}"));
    }

    #[test]
    fn list_blocks_break_on_newlines() {
        let block = "<b>Group</b>\n<i>topic</i>\n👤 3 · 📅 2024-01-01\n/join_g.example.com\n\n";
        let html = block.repeat(40);
        let chunks = split_html(&html, 500);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 500);
            assert_eq!(c.matches("<b>").count(), c.matches("</b>").count());
            assert_eq!(c.matches("<i>").count(), c.matches("</i>").count());
        }
        let strip = |s: &str| s.replace("<b>", "").replace("</b>", "").replace("<i>", "").replace("</i>", "");
        assert_eq!(strip(&chunks.concat()), strip(&html));
    }

    #[test]
    fn dropped_oversized_tag_does_not_close_outer_tags() {
        let html = format!(
            "<b>{}<a href=\"{}\">link</a>{}</b>",
            "x".repeat(40),
            "y".repeat(100),
            "z".repeat(80)
        );
        let chunks = split_html(&html, 60);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 60);
            assert!(c.starts_with("<b>") && c.ends_with("</b>"), "{c:?}");
            assert_eq!(c.matches("<b>").count(), c.matches("</b>").count());
            assert!(!c.contains("</a>"));
        }
        assert!(chunks.concat().contains("link"));
    }

    #[test]
    fn plain_text_prefers_line_boundaries() {
        let text = "line one\nline two\nline three\n";
        let chunks = split_text(text, 18);
        assert_eq!(chunks, vec!["line one\nline two\n", "line three\n"]);

        let chunks = split_text(&"é".repeat(10), 5);
        assert!(chunks.iter().all(|c| c.len() <= 5));
        assert_eq!(chunks.concat(), "é".repeat(10));
    }
}
