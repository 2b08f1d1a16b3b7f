//! DDL lexer
//!
//! Splits DDL text into identifiers, quoted identifiers, literals and single
//! character symbols. Keywords are returned as plain identifiers and matched
//! case-insensitively by the parser.

use crate::error::SpangenError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// `backtick quoted` identifier, quotes removed
    QuotedIdent(String),
    StringLit,
    Number(String),
    Symbol(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offsets into the source
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    /// True if the token is the unquoted keyword `kw` (case-insensitive)
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    pub fn is_symbol(&self, c: char) -> bool {
        self.kind == TokenKind::Symbol(c)
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SpangenError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (start, line, column) = (self.pos, self.line, self.column);
            let Some(c) = self.current() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    start,
                    end: start,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_alphabetic() || c == '_' {
                TokenKind::Ident(self.read_while(|c| c.is_ascii_alphanumeric() || c == '_'))
            } else if c.is_ascii_digit() {
                TokenKind::Number(self.read_while(|c| c.is_ascii_alphanumeric() || c == '.'))
            } else if c == '`' {
                TokenKind::QuotedIdent(self.read_quoted_identifier()?)
            } else if c == '\'' || c == '"' {
                self.read_string(c)?;
                TokenKind::StringLit
            } else {
                self.advance();
                TokenKind::Symbol(c)
            };

            tokens.push(Token {
                kind,
                start,
                end: self.pos,
                line,
                column,
            });
        }
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += c.len_utf8();
        }
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.current().is_some_and(&pred) {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    /// Skip whitespace and comments (`--`, `#` and `/* */`)
    fn skip_trivia(&mut self) -> Result<(), SpangenError> {
        loop {
            match (self.current(), self.peek()) {
                (Some(c), _) if c.is_whitespace() => self.advance(),
                (Some('-'), Some('-')) | (Some('#'), _) => {
                    while self.current().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        match (self.current(), self.peek()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => self.advance(),
                            (None, _) => {
                                return Err(self.error(line, column, "unterminated block comment"))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_quoted_identifier(&mut self) -> Result<String, SpangenError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening backtick
        let start = self.pos;
        while let Some(c) = self.current() {
            if c == '`' {
                let value = self.input[start..self.pos].to_string();
                self.advance();
                return Ok(value);
            }
            self.advance();
        }
        Err(self.error(line, column, "unterminated quoted identifier"))
    }

    /// Consume a string literal, single or triple quoted, honouring
    /// backslash escapes. The content is not needed by the parser.
    fn read_string(&mut self, quote: char) -> Result<(), SpangenError> {
        let (line, column) = (self.line, self.column);
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.input[self.pos..].starts_with(&triple);
        let quote_len = if is_triple { 3 } else { 1 };
        for _ in 0..quote_len {
            self.advance();
        }

        while let Some(c) = self.current() {
            if c == '\\' {
                self.advance();
                self.advance();
                continue;
            }
            if is_triple {
                if self.input[self.pos..].starts_with(&triple) {
                    for _ in 0..3 {
                        self.advance();
                    }
                    return Ok(());
                }
            } else if c == quote {
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(self.error(line, column, "unterminated string literal"))
    }

    fn error(&self, line: usize, column: usize, message: &str) -> SpangenError {
        SpangenError::Ddl {
            statement: format!("line {line}, column {column}"),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_create_table() {
        assert_eq!(
            kinds("CREATE TABLE T (Id INT64) PRIMARY KEY(Id);"),
            vec![
                TokenKind::Ident("CREATE".into()),
                TokenKind::Ident("TABLE".into()),
                TokenKind::Ident("T".into()),
                TokenKind::Symbol('('),
                TokenKind::Ident("Id".into()),
                TokenKind::Ident("INT64".into()),
                TokenKind::Symbol(')'),
                TokenKind::Ident("PRIMARY".into()),
                TokenKind::Ident("KEY".into()),
                TokenKind::Symbol('('),
                TokenKind::Ident("Id".into()),
                TokenKind::Symbol(')'),
                TokenKind::Symbol(';'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_skips_comments() {
        let input = "-- leading\n# hash\n/* block\n comment */ Foo";
        assert_eq!(
            kinds(input),
            vec![TokenKind::Ident("Foo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_quoted_identifier_and_strings() {
        assert_eq!(
            kinds("`From` 'it''s' \"a\\\"b\" '''x'y'''"),
            vec![
                TokenKind::QuotedIdent("From".into()),
                TokenKind::StringLit,
                TokenKind::StringLit,
                TokenKind::StringLit,
                TokenKind::StringLit,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("A\n  B").tokenize().unwrap();
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
        assert_eq!(tokens[1].start, 4);
    }

    #[test]
    fn test_unterminated_comment() {
        let err = Lexer::new("/* never closed").tokenize().unwrap_err();
        assert!(err.to_string().contains("unterminated block comment"));
    }
}
