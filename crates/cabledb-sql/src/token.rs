//! Token types produced by the SQL lexer.

use std::fmt;

/// Keywords the canonical renderer uppercases.
///
/// This is not the full SQL reserved-word list; it covers the statement heads
/// the classifier recognizes plus the clause words that commonly appear in
/// them, so canonical output reads like conventionally-cased SQL.
const KEYWORDS: &[&str] = &[
    "ADD", "ALTER", "AND", "AS", "ASC", "AUTOINCREMENT", "BETWEEN", "BY", "CASCADE", "CASE",
    "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC",
    "DISTINCT", "DROP", "ELSE", "END", "ESCAPE", "EXISTS", "FOREIGN", "FROM", "GENERATED",
    "GLOB", "GROUP", "HAVING", "IF", "IN", "INDEX", "INNER", "INSERT", "INTO", "IS", "JOIN",
    "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER",
    "PRIMARY", "REFERENCES", "RENAME", "RIGHT", "ROWID", "SELECT", "SET", "STRICT", "TABLE",
    "TEMP", "TEMPORARY", "THEN", "TO", "TRIGGER", "UNION", "UNIQUE", "UPDATE", "USING",
    "VALUES", "VIEW", "WHEN", "WHERE", "WITHOUT",
];

/// Kind and payload of one lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword.
    Ident(String),
    /// Quoted identifier (content, quotes stripped).
    QuotedIdent(String),
    /// Single-quoted string literal (content, `''` unescaped).
    StringLit(String),
    /// Numeric literal, verbatim.
    NumberLit(String),
    /// `X'..'` blob literal (hex digits only).
    BlobLit(String),
    /// Bind parameter marker, verbatim (`?`, `?3`, `:name`, `@name`, `$name`).
    Bind(String),
    /// Operator or punctuation.
    Symbol(&'static str),
}

/// One lexed token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    /// Case-insensitive comparison against a bare keyword/identifier.
    pub fn is_ident(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }

    /// Exact symbol comparison.
    pub fn is_symbol(&self, sym: &str) -> bool {
        matches!(&self.kind, TokenKind::Symbol(s) if *s == sym)
    }

    /// Identifier text, whether bare or quoted.
    pub fn ident_text(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) | TokenKind::QuotedIdent(s) => Some(s),
            _ => None,
        }
    }

    /// Render this token in canonical form: keywords uppercased, quoted
    /// identifiers double-quoted, literals re-quoted, everything else
    /// verbatim.
    pub fn render(&self) -> String {
        match &self.kind {
            TokenKind::Ident(s) => {
                if KEYWORDS.iter().any(|k| s.eq_ignore_ascii_case(k)) {
                    s.to_ascii_uppercase()
                } else {
                    s.clone()
                }
            }
            TokenKind::QuotedIdent(s) => format!("\"{}\"", s.replace('"', "\"\"")),
            TokenKind::StringLit(s) => format!("'{}'", s.replace('\'', "''")),
            TokenKind::NumberLit(s) | TokenKind::Bind(s) => s.clone(),
            TokenKind::BlobLit(hex) => format!("X'{}'", hex.to_ascii_uppercase()),
            TokenKind::Symbol(s) => (*s).to_owned(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Re-join a token sequence into canonical SQL text.
///
/// Tokens are space-separated except around tight punctuation, so the output
/// re-parses (and re-classifies) identically to the input.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 && needs_space(&tokens[i - 1], tok) {
            out.push(' ');
        }
        out.push_str(&tok.render());
    }
    out
}

fn needs_space(prev: &Token, next: &Token) -> bool {
    if prev.is_symbol("(") || prev.is_symbol(".") {
        return false;
    }
    !(next.is_symbol(",") || next.is_symbol(")") || next.is_symbol(".") || next.is_symbol(";"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Token {
        Token {
            kind: TokenKind::Ident(s.to_owned()),
            offset: 0,
        }
    }

    #[test]
    fn keywords_uppercase_on_render() {
        assert_eq!(ident("select").render(), "SELECT");
        assert_eq!(ident("FrOm").render(), "FROM");
        assert_eq!(ident("my_table").render(), "my_table");
    }

    #[test]
    fn quoting_round_trips() {
        let tok = Token {
            kind: TokenKind::QuotedIdent("odd \"name\"".to_owned()),
            offset: 0,
        };
        assert_eq!(tok.render(), "\"odd \"\"name\"\"\"");

        let tok = Token {
            kind: TokenKind::StringLit("it's".to_owned()),
            offset: 0,
        };
        assert_eq!(tok.render(), "'it''s'");
    }

    #[test]
    fn render_tokens_spacing() {
        let toks = vec![
            ident("select"),
            Token {
                kind: TokenKind::NumberLit("1".to_owned()),
                offset: 0,
            },
            Token {
                kind: TokenKind::Symbol(","),
                offset: 0,
            },
            Token {
                kind: TokenKind::NumberLit("2".to_owned()),
                offset: 0,
            },
        ];
        assert_eq!(render_tokens(&toks), "SELECT 1, 2");
    }
}
