//! Splits SAE source into whitespace-separated tokens.

/// One token plus its 0-based position in the program, used to report
/// precise compile errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The raw token text.
    pub text: String,
    /// Index of this token among all tokens in the program.
    pub position: usize,
}

/// Split `source` on whitespace into positioned tokens. SAE has no
/// quoting or escaping: a string literal is just a token starting with
/// `:`, so whitespace is the only delimiter that matters.
pub fn tokenize(source: &str) -> Vec<Token> {
    source
        .split_whitespace()
        .enumerate()
        .map(|(position, text)| Token {
            text: text.to_owned(),
            position,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_and_tracks_position() {
        let tokens = tokenize("2 ^  DUP");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2].text, "DUP");
        assert_eq!(tokens[2].position, 2);
    }

    #[test]
    fn empty_source_has_no_tokens() {
        assert!(tokenize("   ").is_empty());
    }
}
