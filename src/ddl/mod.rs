//! Spanner DDL parsing
//!
//! A small front end for the subset of GoogleSQL DDL that describes a
//! schema: `CREATE TABLE`, `CREATE INDEX`, `ALTER TABLE ... ADD FOREIGN KEY`
//! and `CREATE CHANGE STREAM`.

pub mod ast;
mod lexer;
mod parser;

pub use ast::Ddl;
pub use parser::parse_ddl;
