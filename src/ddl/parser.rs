//! DDL parser
//!
//! Recursive descent over the token stream produced by [`Lexer`]. Statement
//! kinds that the loader does not model are captured as raw SQL instead of
//! being rejected here.

use tracing::trace;

use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::SpangenError;

/// Parse a DDL document made of `;` separated statements
pub fn parse_ddl(input: &str) -> Result<Ddl, SpangenError> {
    let tokens = Lexer::new(input).tokenize()?;
    Parser {
        input,
        tokens,
        pos: 0,
        stmt_start: 0,
    }
    .parse()
}

const BUILTIN_TYPES: &[&str] = &[
    "BOOL",
    "BYTES",
    "DATE",
    "FLOAT32",
    "FLOAT64",
    "INT64",
    "JSON",
    "NUMERIC",
    "STRING",
    "TIMESTAMP",
];

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Token index where the current statement begins
    stmt_start: usize,
}

impl Parser<'_> {
    fn parse(mut self) -> Result<Ddl, SpangenError> {
        let mut statements = Vec::new();
        loop {
            while self.eat_symbol(';') {}
            if self.at_eof() {
                break;
            }
            self.stmt_start = self.pos;
            let statement = self.parse_statement()?;
            trace!(statement = ?statement, "Parsed DDL statement");
            statements.push(statement);

            if !self.eat_symbol(';') && !self.at_eof() {
                return Err(self.error("expected ';' or end of input"));
            }
        }
        Ok(Ddl { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, SpangenError> {
        if self.peek_keywords(&["CREATE", "TABLE"]) {
            self.advance_n(2);
            return self.parse_create_table().map(Statement::CreateTable);
        }
        if self.peek_keywords(&["CREATE", "CHANGE", "STREAM"]) {
            self.advance_n(3);
            let name = self.expect_identifier()?;
            self.skip_to_statement_end();
            return Ok(Statement::CreateChangeStream { name });
        }
        if self.peek_keyword("CREATE") && self.looks_like_create_index() {
            self.advance();
            return self.parse_create_index().map(Statement::CreateIndex);
        }
        if self.peek_keywords(&["ALTER", "TABLE"]) {
            self.advance_n(2);
            return self.parse_alter_table().map(Statement::AlterTable);
        }

        self.skip_to_statement_end();
        Ok(Statement::Other {
            sql: self.statement_text(),
        })
    }

    fn parse_create_table(&mut self) -> Result<CreateTable, SpangenError> {
        self.eat_if_not_exists();
        let name = self.expect_identifier()?;
        self.expect_symbol('(')?;

        let mut columns = Vec::new();
        let mut foreign_keys = Vec::new();
        let mut inline_primary_key = Vec::new();

        while !self.peek_symbol(')') {
            if self.eat_keyword("CONSTRAINT") {
                let constraint = self.expect_identifier()?;
                if self.eat_keywords(&["FOREIGN", "KEY"]) {
                    foreign_keys.push(self.parse_foreign_key_body(Some(constraint))?);
                } else if self.eat_keyword("CHECK") {
                    self.skip_parenthesized()?;
                } else {
                    return Err(self.error("expected FOREIGN KEY or CHECK after CONSTRAINT"));
                }
            } else if self.eat_keywords(&["FOREIGN", "KEY"]) {
                foreign_keys.push(self.parse_foreign_key_body(None)?);
            } else if self.peek_keyword("CHECK") && self.peek_nth(1).is_symbol('(') {
                self.advance();
                self.skip_parenthesized()?;
            } else if self.peek_keyword("SYNONYM") && self.peek_nth(1).is_symbol('(') {
                self.advance();
                self.skip_parenthesized()?;
            } else {
                let (column, inline_pk) = self.parse_column_def()?;
                if inline_pk {
                    inline_primary_key.push(KeyPart {
                        column: column.name.clone(),
                        descending: false,
                    });
                }
                columns.push(column);
            }

            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_symbol(')')?;

        let mut primary_key = inline_primary_key;
        if self.eat_keywords(&["PRIMARY", "KEY"]) {
            primary_key = self.parse_key_parts()?;
        }

        let mut interleave = None;
        while self.eat_symbol(',') {
            if self.eat_keywords(&["INTERLEAVE", "IN"]) {
                self.eat_keyword("PARENT");
                let parent = self.expect_identifier()?;
                let mut on_delete = OnDelete::NoAction;
                if self.eat_keywords(&["ON", "DELETE"]) {
                    if self.eat_keyword("CASCADE") {
                        on_delete = OnDelete::Cascade;
                    } else if self.eat_keywords(&["NO", "ACTION"]) {
                        on_delete = OnDelete::NoAction;
                    } else {
                        return Err(self.error("expected CASCADE or NO ACTION"));
                    }
                }
                interleave = Some(Interleave { parent, on_delete });
            } else if self.eat_keywords(&["ROW", "DELETION", "POLICY"]) {
                self.skip_parenthesized()?;
            } else {
                return Err(self.error("expected INTERLEAVE IN or ROW DELETION POLICY"));
            }
        }

        Ok(CreateTable {
            name,
            columns,
            foreign_keys,
            primary_key,
            interleave,
        })
    }

    /// Returns the column and whether it carried an inline PRIMARY KEY
    fn parse_column_def(&mut self) -> Result<(ColumnDef, bool), SpangenError> {
        let name = self.expect_identifier()?;
        let data_type = self.parse_data_type()?;

        let mut column = ColumnDef {
            name,
            data_type,
            not_null: false,
            generated: None,
            has_default: false,
            hidden: false,
        };
        let mut inline_pk = false;

        loop {
            if self.eat_keywords(&["NOT", "NULL"]) {
                column.not_null = true;
            } else if self.eat_keyword("NULL") {
                column.not_null = false;
            } else if self.eat_keyword("DEFAULT") {
                self.skip_parenthesized()?;
                column.has_default = true;
            } else if self.eat_keyword("AS") {
                self.skip_parenthesized()?;
                let stored = self.eat_keyword("STORED");
                column.generated = Some(Generated { stored });
            } else if self.eat_keyword("HIDDEN") {
                column.hidden = true;
            } else if self.eat_keywords(&["PRIMARY", "KEY"]) {
                inline_pk = true;
            } else if self.eat_keyword("OPTIONS") {
                self.skip_parenthesized()?;
            } else {
                break;
            }
        }

        Ok((column, inline_pk))
    }

    fn parse_data_type(&mut self) -> Result<DataType, SpangenError> {
        let start = self.current().start;
        let name = self.expect_type_name()?;
        let upper = name.to_ascii_uppercase();

        if upper == "ARRAY" {
            self.expect_symbol('<')?;
            let inner = self.parse_data_type()?;
            self.expect_symbol('>')?;
            return Ok(DataType::Array(Box::new(inner)));
        }

        if upper == "STRUCT" {
            self.expect_symbol('<')?;
            let mut depth = 1;
            while depth > 0 {
                if self.at_eof() {
                    return Err(self.error("unterminated STRUCT type"));
                }
                if self.peek_symbol('<') {
                    depth += 1;
                } else if self.peek_symbol('>') {
                    depth -= 1;
                }
                self.advance();
            }
            let end = self.tokens[self.pos - 1].end;
            return Ok(DataType::Scalar {
                name: self.input[start..end].to_string(),
                length: None,
            });
        }

        let name = if BUILTIN_TYPES.contains(&upper.as_str()) {
            upper
        } else {
            name
        };

        let mut length = None;
        if self.eat_symbol('(') {
            let token = self.current().clone();
            length = Some(match &token.kind {
                TokenKind::Ident(s) if s.eq_ignore_ascii_case("MAX") => Length::Max,
                TokenKind::Number(n) => Length::Value(
                    n.parse()
                        .map_err(|_| self.error(&format!("invalid type length '{n}'")))?,
                ),
                _ => return Err(self.error("expected a length or MAX")),
            });
            self.advance();
            self.expect_symbol(')')?;
        }

        Ok(DataType::Scalar { name, length })
    }

    /// Type names may be dotted, e.g. proto message names
    fn expect_type_name(&mut self) -> Result<String, SpangenError> {
        let mut name = self.expect_identifier()?;
        while self.peek_symbol('.') {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    fn parse_create_index(&mut self) -> Result<CreateIndex, SpangenError> {
        let unique = self.eat_keyword("UNIQUE");
        let null_filtered = self.eat_keyword("NULL_FILTERED");
        self.expect_keyword("INDEX")?;
        self.eat_if_not_exists();
        let name = self.expect_identifier()?;
        self.expect_keyword("ON")?;
        let table = self.expect_identifier()?;
        let keys = self.parse_key_parts()?;

        let mut storing = Vec::new();
        if self.eat_keyword("STORING") {
            storing = self.parse_identifier_list()?;
        }

        let mut interleave_in = None;
        while self.eat_symbol(',') {
            self.expect_keyword("INTERLEAVE")?;
            self.expect_keyword("IN")?;
            interleave_in = Some(self.expect_identifier()?);
        }
        if self.eat_keyword("OPTIONS") {
            self.skip_parenthesized()?;
        }

        Ok(CreateIndex {
            name,
            table,
            unique,
            null_filtered,
            keys,
            storing,
            interleave_in,
        })
    }

    fn parse_alter_table(&mut self) -> Result<AlterTable, SpangenError> {
        let table = self.expect_identifier()?;

        let mark = self.pos;
        if self.eat_keyword("ADD") {
            let name = if self.eat_keyword("CONSTRAINT") {
                Some(self.expect_identifier()?)
            } else {
                None
            };
            if self.eat_keywords(&["FOREIGN", "KEY"]) {
                let fk = self.parse_foreign_key_body(name)?;
                return Ok(AlterTable {
                    table,
                    alteration: TableAlteration::AddForeignKey(fk),
                });
            }
        }
        self.pos = mark;

        self.skip_to_statement_end();
        Ok(AlterTable {
            table,
            alteration: TableAlteration::Other {
                sql: self.statement_text(),
            },
        })
    }

    /// `(cols) REFERENCES table (cols) [ON DELETE ...] [ENFORCED|NOT ENFORCED]`
    fn parse_foreign_key_body(&mut self, name: Option<String>) -> Result<ForeignKey, SpangenError> {
        let columns = self.parse_identifier_list()?;
        self.expect_keyword("REFERENCES")?;
        let referenced_table = self.expect_identifier()?;
        let referenced_columns = self.parse_identifier_list()?;

        if self.eat_keywords(&["ON", "DELETE"]) && !self.eat_keyword("CASCADE") {
            self.expect_keyword("NO")?;
            self.expect_keyword("ACTION")?;
        }
        if !self.eat_keyword("ENFORCED") && self.eat_keyword("NOT") {
            self.expect_keyword("ENFORCED")?;
        }

        Ok(ForeignKey {
            name,
            columns,
            referenced_table,
            referenced_columns,
        })
    }

    /// `(col [ASC|DESC], ...)`
    fn parse_key_parts(&mut self) -> Result<Vec<KeyPart>, SpangenError> {
        self.expect_symbol('(')?;
        let mut parts = Vec::new();
        if self.eat_symbol(')') {
            return Ok(parts);
        }
        loop {
            let column = self.expect_identifier()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            parts.push(KeyPart { column, descending });
            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_symbol(')')?;
        Ok(parts)
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>, SpangenError> {
        self.expect_symbol('(')?;
        let mut names = Vec::new();
        if self.eat_symbol(')') {
            return Ok(names);
        }
        loop {
            names.push(self.expect_identifier()?);
            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_symbol(')')?;
        Ok(names)
    }

    /// `CREATE [UNIQUE] [NULL_FILTERED] INDEX`
    fn looks_like_create_index(&self) -> bool {
        let mut n = 1;
        while self.peek_nth(n).is_keyword("UNIQUE") || self.peek_nth(n).is_keyword("NULL_FILTERED") {
            n += 1;
        }
        self.peek_nth(n).is_keyword("INDEX")
    }

    fn eat_if_not_exists(&mut self) {
        self.eat_keywords(&["IF", "NOT", "EXISTS"]);
    }

    // ---------------------
    //  token helpers
    // ---------------------

    fn current(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        self.current().is_keyword(kw)
    }

    fn peek_keywords(&self, kws: &[&str]) -> bool {
        kws.iter()
            .enumerate()
            .all(|(i, kw)| self.peek_nth(i).is_keyword(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a keyword sequence only if all of it is present
    fn eat_keywords(&mut self, kws: &[&str]) -> bool {
        if self.peek_keywords(kws) {
            self.advance_n(kws.len());
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), SpangenError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {kw}")))
        }
    }

    fn peek_symbol(&self, c: char) -> bool {
        self.current().is_symbol(c)
    }

    fn eat_symbol(&mut self, c: char) -> bool {
        if self.peek_symbol(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), SpangenError> {
        if self.eat_symbol(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, SpangenError> {
        match &self.current().kind {
            TokenKind::Ident(s) | TokenKind::QuotedIdent(s) => {
                let name = s.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected an identifier")),
        }
    }

    /// Skip a balanced `( ... )` group, e.g. an expression or OPTIONS list
    fn skip_parenthesized(&mut self) -> Result<(), SpangenError> {
        self.expect_symbol('(')?;
        let mut depth = 1;
        while depth > 0 {
            if self.at_eof() {
                return Err(self.error("unbalanced parentheses"));
            }
            if self.peek_symbol('(') {
                depth += 1;
            } else if self.peek_symbol(')') {
                depth -= 1;
            }
            self.advance();
        }
        Ok(())
    }

    /// Advance to the `;` ending the current statement, without consuming it
    fn skip_to_statement_end(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            if depth == 0 && self.peek_symbol(';') {
                break;
            }
            if self.peek_symbol('(') {
                depth += 1;
            } else if self.peek_symbol(')') {
                depth = depth.saturating_sub(1);
            }
            self.advance();
        }
    }

    /// Source text of the current statement up to the current position
    fn statement_text(&self) -> String {
        let start = self.tokens[self.stmt_start].start;
        let end = if self.pos > self.stmt_start {
            self.tokens[self.pos - 1].end
        } else {
            start
        };
        self.input[start..end].trim().to_string()
    }

    /// Source text of the whole current statement, for error messages
    fn full_statement_text(&self) -> String {
        let start = self.tokens[self.stmt_start].start;
        let end = self.tokens[self.stmt_start..]
            .iter()
            .find(|t| t.is_symbol(';') || t.kind == TokenKind::Eof)
            .map(|t| t.start)
            .unwrap_or(self.input.len());
        self.input[start..end].trim().to_string()
    }

    fn error(&self, message: &str) -> SpangenError {
        let token = self.current();
        SpangenError::Ddl {
            statement: self.full_statement_text(),
            message: format!(
                "{message} at line {}, column {}",
                token.line, token.column
            ),
        }
    }
}
