/// Default lexeme delimiter for notes
pub const DEFAULT_DELIMITER: char = ' ';

/// A lexeme together with its character span in the source text.
///
/// `start` and `end` count `char`s, not bytes. The delimiter itself is never
/// part of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    pub lexeme: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Splits note text into lexemes on a single delimiter.
///
/// No normalization is applied: case and punctuation are kept, and
/// consecutive delimiters produce empty lexemes.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    delimiter: char,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Lazily yield spans for `text`. The iterator is `Clone`, so it can be restarted.
    pub fn spans<'a>(&self, text: &'a str) -> Spans<'a> {
        Spans {
            splits: text.split(self.delimiter),
            offset: 0,
        }
    }

    /// Collect all spans for `text`
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<Span<'a>> {
        self.spans(text).collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`Tokenizer::spans`]
#[derive(Debug, Clone)]
pub struct Spans<'a> {
    splits: std::str::Split<'a, char>,
    offset: usize,
}

impl<'a> Iterator for Spans<'a> {
    type Item = Span<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let lexeme = self.splits.next()?;
        let start = self.offset;
        let end = start + lexeme.chars().count();
        // skip over the delimiter
        self.offset = end + 1;
        Some(Span { lexeme, start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(spans: Vec<Span<'_>>) -> Vec<(&str, usize, usize)> {
        spans.into_iter().map(|s| (s.lexeme, s.start, s.end)).collect()
    }

    #[test]
    fn test_tokenize() {
        let tokenizer = Tokenizer::new();
        let spans = tokenizer.tokenize("the cat sat");
        assert_eq!(
            triples(spans),
            vec![("the", 0, 3), ("cat", 4, 7), ("sat", 8, 11)]
        );
    }

    #[test]
    fn test_consecutive_delimiters() {
        let tokenizer = Tokenizer::new();
        let spans = tokenizer.tokenize("a  b");
        assert_eq!(triples(spans), vec![("a", 0, 1), ("", 2, 2), ("b", 3, 4)]);
    }

    #[test]
    fn test_leading_and_trailing_delimiters() {
        let tokenizer = Tokenizer::new();
        let spans = tokenizer.tokenize(" x ");
        assert_eq!(triples(spans), vec![("", 0, 0), ("x", 1, 2), ("", 3, 3)]);
    }

    #[test]
    fn test_empty_text() {
        let tokenizer = Tokenizer::new();
        assert_eq!(triples(tokenizer.tokenize("")), vec![("", 0, 0)]);
    }

    #[test]
    fn test_case_and_punctuation_preserved() {
        let tokenizer = Tokenizer::new();
        let spans = tokenizer.tokenize("Hello, World!");
        assert_eq!(triples(spans), vec![("Hello,", 0, 6), ("World!", 7, 13)]);
    }

    #[test]
    fn test_offsets_count_chars() {
        let tokenizer = Tokenizer::new();
        let spans = tokenizer.tokenize("café au lait");
        assert_eq!(
            triples(spans),
            vec![("café", 0, 4), ("au", 5, 7), ("lait", 8, 12)]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let tokenizer = Tokenizer::with_delimiter('|');
        let spans = tokenizer.tokenize("a b|c");
        assert_eq!(triples(spans), vec![("a b", 0, 3), ("c", 4, 5)]);
    }

    #[test]
    fn test_spans_restartable() {
        let tokenizer = Tokenizer::new();
        let spans = tokenizer.spans("one two");
        let first: Vec<_> = spans.clone().collect();
        let second: Vec<_> = spans.collect();
        assert_eq!(first, second);
    }
}
