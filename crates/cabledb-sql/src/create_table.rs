//! Parsing of `CREATE TABLE` declarations into column definitions.
//!
//! The reflector feeds table-creation SQL from the engine catalog through
//! this parser to recover column names and declared type strings. Only the
//! declaration shape is parsed; constraint bodies are skipped, not analyzed.

use cabledb_error::{CableError, Result};
use cabledb_types::QueryClass;

use crate::statement::parse_statements;
use crate::token::{Token, TokenKind};

/// One column definition from a `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Declared type string, e.g. `"INTEGER"`, `"VARCHAR(10)"`; `None` when
    /// the declaration omits a type.
    pub declared_type: Option<String>,
}

/// A parsed `CREATE TABLE` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// Keywords that begin a table-level constraint instead of a column.
const TABLE_CONSTRAINTS: &[&str] = &["PRIMARY", "UNIQUE", "CHECK", "FOREIGN", "CONSTRAINT"];

/// Keywords that terminate a column's declared type and begin its
/// constraints.
const COLUMN_CONSTRAINTS: &[&str] = &[
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "COLLATE",
    "REFERENCES",
    "GENERATED",
    "AS",
    "CONSTRAINT",
    "ON",
];

/// Parse SQL that must contain exactly one `CREATE TABLE` statement.
///
/// # Errors
///
/// Fails with `INVALID_ARGUMENT`-class parse errors when the input holds
/// more than one statement, is not a `CREATE TABLE`, or is malformed.
pub fn parse_create_table(sql: &str) -> Result<CreateTable> {
    let statements = parse_statements(sql)?;
    if statements.len() != 1 {
        return Err(CableError::invalid_argument(format!(
            "expected exactly one CREATE TABLE statement, found {}",
            statements.len()
        )));
    }
    let statement = &statements[0];
    if statement.class != QueryClass::Ddl {
        return Err(CableError::invalid_argument(
            "expected a CREATE TABLE statement",
        ));
    }

    Parser::new(&statement.tokens).parse()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_ident(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, word: &str) -> Result<()> {
        if self.eat_ident(word) {
            Ok(())
        } else {
            Err(CableError::invalid_argument(format!(
                "expected {word} in table declaration"
            )))
        }
    }

    fn expect_symbol(&mut self, sym: &str) -> Result<()> {
        if self.peek().is_some_and(|t| t.is_symbol(sym)) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CableError::invalid_argument(format!(
                "expected '{sym}' in table declaration"
            )))
        }
    }

    fn parse(mut self) -> Result<CreateTable> {
        self.expect_ident("CREATE")?;
        let _ = self.eat_ident("TEMP") || self.eat_ident("TEMPORARY");
        self.expect_ident("TABLE")?;
        if self.eat_ident("IF") {
            self.expect_ident("NOT")?;
            self.expect_ident("EXISTS")?;
        }

        let mut name = self
            .bump()
            .and_then(Token::ident_text)
            .ok_or_else(|| CableError::invalid_argument("missing table name"))?
            .to_owned();
        // schema.table: keep the table part.
        if self.peek().is_some_and(|t| t.is_symbol(".")) {
            self.pos += 1;
            name = self
                .bump()
                .and_then(Token::ident_text)
                .ok_or_else(|| CableError::invalid_argument("missing table name after '.'"))?
                .to_owned();
        }

        self.expect_symbol("(")?;

        let mut columns = Vec::new();
        loop {
            let Some(first) = self.peek() else {
                return Err(CableError::invalid_argument(
                    "unterminated column list in table declaration",
                ));
            };
            if first.is_symbol(")") {
                // Empty column list is not a valid declaration.
                if columns.is_empty() {
                    return Err(CableError::invalid_argument(
                        "table declaration has no columns",
                    ));
                }
                self.pos += 1;
                break;
            }

            if TABLE_CONSTRAINTS
                .iter()
                .any(|kw| first.is_ident(kw))
            {
                self.skip_item()?;
            } else {
                columns.push(self.parse_column()?);
            }

            if self.peek().is_some_and(|t| t.is_symbol(",")) {
                self.pos += 1;
            } else {
                self.expect_symbol(")")?;
                break;
            }
        }

        // Trailing WITHOUT ROWID / STRICT clauses are irrelevant here.
        Ok(CreateTable { name, columns })
    }

    /// Parse one column definition: name, optional declared type, skipped
    /// constraints.
    fn parse_column(&mut self) -> Result<ColumnDef> {
        let name = self
            .bump()
            .and_then(Token::ident_text)
            .ok_or_else(|| CableError::invalid_argument("expected column name"))?
            .to_owned();

        let mut type_parts: Vec<String> = Vec::new();
        while let Some(tok) = self.peek() {
            match &tok.kind {
                TokenKind::Ident(word)
                    if !COLUMN_CONSTRAINTS
                        .iter()
                        .any(|kw| word.eq_ignore_ascii_case(kw)) =>
                {
                    type_parts.push(word.clone());
                    self.pos += 1;
                }
                // Type arguments, e.g. VARCHAR(10) or DECIMAL(10,5).
                TokenKind::Symbol("(") if !type_parts.is_empty() => {
                    let args = self.take_balanced_parens()?;
                    let joined = type_parts.pop().unwrap_or_default();
                    type_parts.push(format!("{joined}{args}"));
                }
                _ => break,
            }
        }

        // Skip column constraints up to the next comma or the closing paren.
        self.skip_to_item_end()?;

        let declared_type = if type_parts.is_empty() {
            None
        } else {
            Some(type_parts.join(" "))
        };
        Ok(ColumnDef {
            name,
            declared_type,
        })
    }

    /// Consume a balanced `( … )` group and render it compactly.
    fn take_balanced_parens(&mut self) -> Result<String> {
        self.expect_symbol("(")?;
        let mut depth = 1;
        let mut out = String::from("(");
        while depth > 0 {
            let tok = self.bump().ok_or_else(|| {
                CableError::invalid_argument("unterminated '(' in table declaration")
            })?;
            if tok.is_symbol("(") {
                depth += 1;
            } else if tok.is_symbol(")") {
                depth -= 1;
                if depth == 0 {
                    out.push(')');
                    break;
                }
            }
            out.push_str(&tok.render());
        }
        Ok(out)
    }

    /// Skip one item (table constraint) up to the next top-level `,` or `)`.
    fn skip_item(&mut self) -> Result<()> {
        self.skip_to_item_end()
    }

    fn skip_to_item_end(&mut self) -> Result<()> {
        let mut depth = 0;
        while let Some(tok) = self.peek() {
            if depth == 0 && (tok.is_symbol(",") || tok.is_symbol(")")) {
                return Ok(());
            }
            if tok.is_symbol("(") {
                depth += 1;
            } else if tok.is_symbol(")") {
                depth -= 1;
            }
            self.pos += 1;
        }
        Err(CableError::invalid_argument(
            "unterminated column list in table declaration",
        ))
    }
}
