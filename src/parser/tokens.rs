use super::*;

/// Cursor over the whitespace separated tokens of one logical line.
///
/// Field extractors drive it phase by phase: each phase inspects the next
/// token with [`peek`](Tokens::peek) and consumes it only when its predicate
/// matches, checking [`remaining`](Tokens::remaining) when a later mandatory
/// field still needs a token.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    line: &'a LogicalLine,
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a LogicalLine) -> Self {
        Self {
            line,
            tokens: line.text.split_whitespace().collect(),
            pos: 0,
        }
    }

    pub fn line(&self) -> &'a LogicalLine {
        self.line
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'a str> {
        self.tokens.get(self.pos + n).copied()
    }

    /// Consumes the next token when `pred` accepts it.
    pub fn next_if(&mut self, pred: impl FnOnce(&str) -> bool) -> Option<&'a str> {
        let token = self.peek()?;
        if pred(token) {
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    pub fn next_if_eq(&mut self, keyword: &str) -> bool {
        self.next_if(|token| token == keyword).is_some()
    }

    /// Consumes `words` if the line continues with exactly them.
    pub fn eat_prefix(&mut self, words: &[&str]) -> bool {
        let matches = words.len() <= self.remaining()
            && words
                .iter()
                .enumerate()
                .all(|(i, word)| self.tokens[self.pos + i] == *word);
        if matches {
            self.pos += words.len();
        }
        matches
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consumes every remaining token.
    pub fn rest(&mut self) -> Vec<&'a str> {
        let rest = self.tokens[self.pos..].to_vec();
        self.pos = self.tokens.len();
        rest
    }

    /// Consumes every remaining token and joins them with single spaces.
    pub fn rest_joined(&mut self) -> Option<String> {
        let rest = self.rest();
        if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        }
    }

    pub fn expect(&mut self, what: &str) -> Result<&'a str, ConfigError> {
        match self.next() {
            Some(token) => Ok(token),
            None => Err(self.error(format!("missing {what}"))),
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<(), ConfigError> {
        match self.peek() {
            Some(token) if token == keyword => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(self.error(format!("expected '{keyword}', found '{token}'"))),
            None => Err(self.error(format!("expected '{keyword}'"))),
        }
    }

    /// Consumes one of `choices` and returns it.
    pub fn expect_one_of(&mut self, what: &str, choices: &[&str]) -> Result<&'a str, ConfigError> {
        let token = self.expect(what)?;
        if choices.contains(&token) {
            Ok(token)
        } else {
            Err(self.error(format!(
                "invalid {what} '{token}', expected one of {}",
                choices.join("|")
            )))
        }
    }

    pub fn expect_on_off(&mut self, what: &str) -> Result<bool, ConfigError> {
        Ok(self.expect_one_of(what, &["on", "off"])? == "on")
    }

    pub fn expect_number_in(
        &mut self,
        what: &str,
        range: RangeInclusive<u64>,
    ) -> Result<u64, ConfigError> {
        let token = self.expect(what)?;
        self.number_in(token, what, range)
    }

    /// Validates `token` against `range`.
    ///
    /// A token that was created by joining two wrapped lines is reported as
    /// [`ConfigError::SuspectReassembly`] instead of a plain parse error.
    pub fn number_in(
        &self,
        token: &str,
        what: &str,
        range: RangeInclusive<u64>,
    ) -> Result<u64, ConfigError> {
        match token.parse::<u64>() {
            Ok(value) if range.contains(&value) => Ok(value),
            _ => {
                if let Some(spliced) = self.line.spliced.iter().find(|s| s.token == token) {
                    return Err(ConfigError::SuspectReassembly {
                        line_no: spliced.line_no,
                        token: token.to_string(),
                        min: *range.start(),
                        max: *range.end(),
                    });
                }
                Err(self.error(format!(
                    "{what} '{token}' is not a number in {}..={}",
                    range.start(),
                    range.end()
                )))
            }
        }
    }

    /// Fails when tokens are left over after the last phase.
    pub fn finish(&self) -> Result<(), ConfigError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected token '{token}'"))),
        }
    }

    pub fn error(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::Parse {
            line_no: self.line.line_no,
            line: self.line.text.trim().to_string(),
            reason: reason.into(),
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }
}
