//! Soft wrapping for diagram labels

/// Break marker understood by PlantUML inside message labels
pub const PLANTUML_LINE_BREAK: &str = "\\n";

/// Inserts line-break markers into long labels, nudging each break onto a
/// nearby whitespace or punctuation character.
#[derive(Debug, Clone)]
pub struct TextWrapper {
    width: usize,
    soft_limit: usize,
}

impl TextWrapper {
    pub fn new(width: usize, soft_limit: usize) -> Self {
        Self {
            width: width.max(1),
            soft_limit,
        }
    }

    /// Wrap `text`. Text within `width + soft_limit` comes back untouched;
    /// otherwise existing markers are kept as hard breaks and empty lines
    /// between markers are dropped.
    pub fn wrap(&self, text: &str) -> String {
        if text.chars().count() <= self.width + self.soft_limit {
            return text.to_string();
        }

        let mut lines = Vec::new();
        for segment in text.split(PLANTUML_LINE_BREAK) {
            self.wrap_segment(segment.trim(), &mut lines);
        }
        lines.join(PLANTUML_LINE_BREAK)
    }

    fn wrap_segment(&self, segment: &str, lines: &mut Vec<String>) {
        let chars: Vec<char> = segment.chars().collect();
        let len = chars.len();
        let mut start = 0;

        while start < len {
            if len - start <= self.width + self.soft_limit {
                push_line(lines, &chars[start..]);
                return;
            }

            let ideal = start + self.width - 1;
            let cut = match self.find_break(&chars, start, ideal) {
                Some(cut) => cut,
                None => match self.forced_break(&chars, ideal) {
                    Some(cut) => cut,
                    None => {
                        push_line(lines, &chars[start..]);
                        return;
                    }
                },
            };

            push_line(lines, &chars[start..=cut]);
            start = cut + 1;
            while start < len && chars[start].is_whitespace() {
                start += 1;
            }
        }
    }

    /// Eligible position within the soft limit of `ideal`. Backward search
    /// goes first when the tail would otherwise dangle.
    fn find_break(&self, chars: &[char], start: usize, ideal: usize) -> Option<usize> {
        let tail = chars.len() - ideal;
        let forward = || {
            (ideal..ideal + self.soft_limit)
                .take_while(|&i| i < chars.len())
                .find(|&i| is_break_char(chars[i]))
        };
        let backward = || {
            (1..=self.soft_limit)
                .map_while(|offset| ideal.checked_sub(offset))
                .take_while(|&i| i > start)
                .find(|&i| is_break_char(chars[i]))
        };

        if tail * 2 < self.soft_limit * 3 {
            backward().or_else(forward)
        } else {
            forward().or_else(backward)
        }
    }

    /// Next eligible position past the soft window, unless breaking there
    /// would leave only a sliver behind.
    fn forced_break(&self, chars: &[char], ideal: usize) -> Option<usize> {
        let from = ideal + self.soft_limit;
        let cut = (from..chars.len()).find(|&i| is_break_char(chars[i]))?;
        if chars.len() - cut <= self.soft_limit {
            None
        } else {
            Some(cut)
        }
    }
}

impl Default for TextWrapper {
    fn default() -> Self {
        Self::new(40, 10)
    }
}

fn is_break_char(c: char) -> bool {
    c.is_whitespace() || matches!(c, '[' | ']' | '.' | ',' | ':' | '(' | ')' | '{')
}

fn push_line(lines: &mut Vec<String>, chars: &[char]) {
    let line: String = chars.iter().collect();
    let line = line.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
}
