//! Placeholder token generation.

/// Produces `a, b, .., z, aa, ab, .., zz, aaa, ..` after a fixed prefix.
///
/// Tokens are letters only so they stay valid as identifier suffixes. One
/// generator serves one compilation pass; call [`reset`](Self::reset)
/// between passes that must not share a namespace.
#[derive(Debug, Clone)]
pub struct PlaceholderGenerator {
    prefix: String,
    issued: u64,
}

impl PlaceholderGenerator {
    /// Create a generator whose tokens start with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: 0,
        }
    }

    /// The next token in the sequence.
    pub fn next_token(&mut self) -> String {
        self.issued += 1;
        let mut letters = Vec::new();
        let mut n = self.issued;
        // bijective base-26: 1 -> a, 26 -> z, 27 -> aa
        while n > 0 {
            n -= 1;
            letters.push(b'a' + u8::try_from(n % 26).unwrap_or(0));
            n /= 26;
        }
        letters.reverse();
        let mut token = String::with_capacity(self.prefix.len() + letters.len());
        token.push_str(&self.prefix);
        token.extend(letters.into_iter().map(char::from));
        token
    }

    /// Restart the sequence at `a`.
    pub fn reset(&mut self) {
        self.issued = 0;
    }

    /// Restart the sequence at `a` under a new prefix.
    pub fn reset_with_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
        self.issued = 0;
    }

    /// The prefix prepended to every token.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
