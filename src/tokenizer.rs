use crate::error::ParseError;

/// Represents the smallest meaningful units (atoms) of the predicate language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- Keywords ---
    And,
    Or,
    Not,

    // --- Identifiers & Literals ---
    /// A bracketed column reference (e.g., `[age]`), brackets stripped.
    Column(String),
    /// A bare word that is not a keyword.
    Ident(String),
    /// An integer literal (e.g., `42`).
    Number(i64),
    /// An integer literal with an `L` suffix (e.g., `42L`).
    LongNumber(i64),
    /// A 64-bit floating-point literal (e.g., `3.14`).
    FloatNumber(f64),
    /// A string literal, between single or double quotes (e.g., `'Alice'`).
    String(String),
    /// The boolean literal `TRUE`.
    True,
    /// The boolean literal `FALSE`.
    False,
    /// The `NULL` literal.
    Null,

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// `=` or `==`
    Equal,
    /// `!=` or `<>`
    NotEqual,
    /// Greater than
    Greater,
    /// Greater than or equal to
    GreaterEqual,
    /// Lower than
    Lower,
    /// Lower than or equal to
    LowerEqual,

    // --- Special ---
    /// Represents the End Of File/Input.
    Eof,
}

/// A lexical scanner (lexer) that converts a predicate string into a sequence of [Token]s.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of tokens.
    ///
    /// # Errors
    /// Returns an error if an invalid character is encountered or if a literal
    /// (like a string) is malformed.
    ///
    /// # Example
    /// ```
    /// # use tupledb::tokenizer::{Tokenizer, Token};
    /// let mut t = Tokenizer::new("[int] = 3");
    /// let tokens = t.tokenize().unwrap();
    /// assert_eq!(tokens[0], Token::Column("int".into()));
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            self.skip_whitespace();

            if self.is_at_end() {
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        tokens.push(Token::Eof);
        Ok(tokens)
    }

    /// Identifies the next token based on the character at the current position.
    fn next_token(&mut self) -> Result<Token, ParseError> {
        let ch = self.current_char();

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            '=' => {
                self.advance();
                self.advance_if('=');
                Ok(Token::Equal)
            }
            '!' => {
                self.advance();
                if self.advance_if('=') {
                    Ok(Token::NotEqual)
                } else {
                    Err(ParseError::UnexpectedChar('!', self.position - 1))
                }
            }
            '>' => {
                self.advance();
                if self.advance_if('=') {
                    Ok(Token::GreaterEqual)
                } else {
                    Ok(Token::Greater)
                }
            }
            '<' => {
                self.advance();
                if self.advance_if('=') {
                    Ok(Token::LowerEqual)
                } else if self.advance_if('>') {
                    Ok(Token::NotEqual)
                } else {
                    Ok(Token::Lower)
                }
            }
            '&' if self.peek() == Some('&') => {
                self.position += 2;
                Ok(Token::And)
            }
            '|' if self.peek() == Some('|') => {
                self.position += 2;
                Ok(Token::Or)
            }
            '[' => self.read_column(),
            '\'' | '"' => self.read_string(ch),
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            _ => Err(ParseError::UnexpectedChar(ch, self.position)),
        }
    }

    // --- Navigation Helpers ---

    /// Returns the character at the current position.
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    /// Returns the character after the current one, if any.
    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Moves the cursor forward by one character.
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Consumes the current character if it is `expected`.
    fn advance_if(&mut self, expected: char) -> bool {
        if !self.is_at_end() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Checks if the cursor has reached the end of the input.
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Consumes any whitespace characters (spaces, tabs, newlines).
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Reads a sequence of alphanumeric characters and determines if it's
    /// a reserved keyword or a bare identifier.
    ///
    /// Keywords are matched case-insensitively.
    fn read_identifier(&mut self) -> Result<Token, ParseError> {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "AND" => Ok(Token::And),
            "OR" => Ok(Token::Or),
            "NOT" => Ok(Token::Not),
            "TRUE" => Ok(Token::True),
            "FALSE" => Ok(Token::False),
            "NULL" => Ok(Token::Null),
            _ => Ok(Token::Ident(ident)),
        }
    }

    /// Reads a `[column]` reference. Any character but `]` may appear in the name.
    fn read_column(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        self.advance(); // skip '['
        let mut name = String::new();
        while !self.is_at_end() && self.current_char() != ']' {
            name.push(self.current_char());
            self.advance();
        }
        if self.is_at_end() {
            return Err(ParseError::UnterminatedColumn(start));
        }
        self.advance(); // skip ']'
        Ok(Token::Column(name.trim().to_string()))
    }

    /// Reads a numeric literal. If a dot `.` is encountered, it returns a
    /// [Token::FloatNumber]; an `L` suffix gives a [Token::LongNumber];
    /// otherwise a [Token::Number].
    fn read_number(&mut self) -> Result<Token, ParseError> {
        let mut number = String::new();
        let mut has_dot = false;

        if self.current_char() == '-' {
            number.push('-');
            self.advance();
        }

        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || (self.current_char() == '.' && !has_dot))
        {
            if self.current_char() == '.' {
                has_dot = true;
            }
            number.push(self.current_char());
            self.advance();
        }

        if !self.is_at_end() && self.current_char() == '.' {
            return Err(ParseError::InvalidNumber(format!("{number}.")));
        }

        if has_dot {
            return number
                .parse::<f64>()
                .map(Token::FloatNumber)
                .map_err(|_| ParseError::InvalidNumber(number));
        }

        let long = self.advance_if('L') || self.advance_if('l');
        let value = number
            .parse::<i64>()
            .map_err(|_| ParseError::InvalidNumber(number.clone()))?;
        if long {
            Ok(Token::LongNumber(value))
        } else {
            Ok(Token::Number(value))
        }
    }

    /// Reads a string literal delimited by `quote`. A doubled quote inside
    /// the literal stands for one quote character.
    fn read_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.position;
        self.advance(); // skip the opening quote
        let mut string = String::new();

        loop {
            if self.is_at_end() {
                return Err(ParseError::UnterminatedString(start));
            }
            let c = self.current_char();
            self.advance();
            if c == quote {
                if self.advance_if(quote) {
                    string.push(quote);
                    continue;
                }
                break;
            }
            string.push(c);
        }

        Ok(Token::String(string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Tokenizer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_column_and_literals() {
        assert_eq!(
            tokenize("[string] = '3'"),
            vec![
                Token::Column("string".into()),
                Token::Equal,
                Token::String("3".into()),
                Token::Eof
            ]
        );
        assert_eq!(
            tokenize("[long]==4L"),
            vec![
                Token::Column("long".into()),
                Token::Equal,
                Token::LongNumber(4),
                Token::Eof
            ]
        );
        assert_eq!(
            tokenize("[x] >= -2.5"),
            vec![
                Token::Column("x".into()),
                Token::GreaterEqual,
                Token::FloatNumber(-2.5),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            tokenize("NOT ( a <> b ) and c != d OR e <= f && g || h < i > j"),
            vec![
                Token::Not,
                Token::LeftParen,
                Token::Ident("a".into()),
                Token::NotEqual,
                Token::Ident("b".into()),
                Token::RightParen,
                Token::And,
                Token::Ident("c".into()),
                Token::NotEqual,
                Token::Ident("d".into()),
                Token::Or,
                Token::Ident("e".into()),
                Token::LowerEqual,
                Token::Ident("f".into()),
                Token::And,
                Token::Ident("g".into()),
                Token::Or,
                Token::Ident("h".into()),
                Token::Lower,
                Token::Ident("i".into()),
                Token::Greater,
                Token::Ident("j".into()),
                Token::Eof
            ]
        );
        assert_eq!(
            tokenize("true False null"),
            vec![Token::True, Token::False, Token::Null, Token::Eof]
        );
    }

    #[test]
    fn test_escaped_quotes() {
        assert_eq!(
            tokenize(r#"'it''s' "say ""hi""""#),
            vec![
                Token::String("it's".into()),
                Token::String("say \"hi\"".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            Tokenizer::new("'open").tokenize(),
            Err(ParseError::UnterminatedString(0))
        );
        assert_eq!(
            Tokenizer::new("[col").tokenize(),
            Err(ParseError::UnterminatedColumn(0))
        );
        assert_eq!(
            Tokenizer::new("1.2.3").tokenize(),
            Err(ParseError::InvalidNumber("1.2.".into()))
        );
        assert_eq!(
            Tokenizer::new("[a] ! 3").tokenize(),
            Err(ParseError::UnexpectedChar('!', 4))
        );
        assert_eq!(
            Tokenizer::new("[a] # 3").tokenize(),
            Err(ParseError::UnexpectedChar('#', 4))
        );
    }
}
