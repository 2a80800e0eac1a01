use std::fmt;

/// A numeric field of a log line.
///
/// Markers are integer fields; values may be either kind, so an integer
/// token is also accepted where a float value is expected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
}

impl Token {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Token::Int(v) => v as f64,
            Token::Float(v) => v,
        }
    }

    pub fn is_marker(&self, marker: i64) -> bool {
        matches!(*self, Token::Int(v) if v == marker)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(v) => write!(f, "{}", v),
            Token::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Splits a log line on whitespace into typed tokens.
///
/// # Returns
///
/// * `Ok(None)` for a blank line, `Err` with a description for a field that
///   is not a number.
///
pub fn tokenize(line: &str) -> Result<Option<Vec<Token>>, String> {
    let mut tokens = Vec::new();
    for (column, field) in line.split_whitespace().enumerate() {
        let token = if let Ok(v) = field.parse::<i64>() {
            Token::Int(v)
        } else if let Ok(v) = field.parse::<f64>() {
            Token::Float(v)
        } else {
            return Err(format!("field {} is not a number: '{}'", column + 1, field));
        };
        tokens.push(token);
    }
    Ok(if tokens.is_empty() { None } else { Some(tokens) })
}

/// Walks the tokens of one line; all marker offset arithmetic lives here.
pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        TokenCursor { tokens, pos: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// 1-based column of the next token.
    pub fn column(&self) -> usize {
        self.pos + 1
    }

    pub fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    pub fn skip(&mut self) {
        self.pos += 1;
    }

    fn next(&mut self, what: &str) -> Result<Token, String> {
        let token = self
            .peek()
            .ok_or_else(|| format!("missing {} at column {}", what, self.column()))?;
        self.pos += 1;
        Ok(token)
    }

    /// Consumes the next token if it is `marker`.
    pub fn eat_marker(&mut self, marker: i64) -> bool {
        match self.peek() {
            Some(t) if t.is_marker(marker) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// Requires the next token to be `marker`.
    pub fn expect_marker(&mut self, marker: i64, context: &str) -> Result<(), String> {
        let column = self.column();
        match self.next(&format!("marker {} {}", marker, context))? {
            t if t.is_marker(marker) => Ok(()),
            t => Err(format!(
                "expected marker {} {}, got {} at column {}",
                marker, context, t, column
            )),
        }
    }

    pub fn take_f64(&mut self, what: &str) -> Result<f64, String> {
        let token = self.next(what)?;
        let v = token.as_f64();
        if v.is_nan() {
            return Err(format!("{} is NaN at column {}", what, self.pos));
        }
        Ok(v)
    }

    pub fn take_id(&mut self, what: &str) -> Result<u64, String> {
        let column = self.column();
        match self.next(what)? {
            Token::Int(v) if v >= 0 => Ok(v as u64),
            t => Err(format!("{} must be a non-negative integer, got {} at column {}", what, t, column)),
        }
    }

    /// Reads the `0 <id>` prefix every record line starts with.
    pub fn record_header(&mut self) -> Result<u64, String> {
        let column = self.column();
        match self.next("leading zero field")? {
            Token::Int(0) => {}
            t => return Err(format!("first field must be 0, got {} at column {}", t, column)),
        }
        self.take_id("record id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_kinds() {
        let tokens = tokenize("0 17 5 0.001 2 1e-3").unwrap().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Int(0),
                Token::Int(17),
                Token::Int(5),
                Token::Float(0.001),
                Token::Int(2),
                Token::Float(1e-3)
            ]
        );
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(tokenize("   \t ").unwrap(), None);
        assert_eq!(tokenize("").unwrap(), None);
    }

    #[test]
    fn test_non_numeric_field() {
        let err = tokenize("0 1 abc").unwrap_err();
        assert!(err.contains("field 3"));
    }

    #[test]
    fn test_header_requires_leading_zero() {
        let tokens = tokenize("1 17 5 0.1").unwrap().unwrap();
        assert!(TokenCursor::new(&tokens).record_header().is_err());

        let tokens = tokenize("0 17 5 0.1").unwrap().unwrap();
        let mut cursor = TokenCursor::new(&tokens);
        assert_eq!(cursor.record_header(), Ok(17));
        assert_eq!(cursor.column(), 3);
    }

    #[test]
    fn test_expect_marker_reports_column() {
        let tokens = tokenize("2 0.5 13 1 2 3").unwrap().unwrap();
        let mut cursor = TokenCursor::new(&tokens);
        assert!(cursor.eat_marker(2));
        cursor.take_f64("time").unwrap();
        let err = cursor.expect_marker(12, "after time").unwrap_err();
        assert!(err.contains("got 13 at column 3"), "{}", err);
    }

    #[test]
    fn test_missing_value() {
        let tokens = tokenize("5").unwrap().unwrap();
        let mut cursor = TokenCursor::new(&tokens);
        cursor.skip();
        assert!(cursor.take_f64("radius").unwrap_err().contains("missing radius"));
    }

    #[test]
    fn test_integer_accepted_as_float_value() {
        let tokens = tokenize("24 0 5").unwrap().unwrap();
        let mut cursor = TokenCursor::new(&tokens);
        assert!(cursor.eat_marker(24));
        assert_eq!(cursor.take_f64("birth time"), Ok(0.0));
        assert_eq!(cursor.take_f64("death time"), Ok(5.0));
        assert!(cursor.is_done());
    }
}
