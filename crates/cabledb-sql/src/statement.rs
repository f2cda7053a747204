//! Statement splitting, classification, and access-level enforcement.

use cabledb_error::{CableError, Result};
use cabledb_types::{AccessLevel, QueryClass};

use crate::lexer::Lexer;
use crate::token::{Token, render_tokens};

/// One parsed and classified SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub class: QueryClass,
    /// Whitespace-normalized re-serialization of the statement.
    pub canonical: String,
    pub(crate) tokens: Vec<Token>,
}

impl SqlStatement {
    /// The access level required to run this statement.
    pub const fn required_access(&self) -> AccessLevel {
        self.class.required_access()
    }
}

/// Parse a SQL string into one or more classified statements.
///
/// Statements are separated by top-level `;`. An empty input, a separator
/// with no statement attached, a bare statement head, or an unrecognized
/// statement kind all fail with a parse error naming the statement ordinal.
pub fn parse_statements(sql: &str) -> Result<Vec<SqlStatement>> {
    let tokens = Lexer::tokenize(sql)?;
    let segments = split_statements(tokens)?;
    if segments.is_empty() {
        return Err(CableError::parse(0, "empty query"));
    }

    let mut statements = Vec::with_capacity(segments.len());
    for (index, segment) in segments.into_iter().enumerate() {
        statements.push(classify_segment(index, segment)?);
    }
    Ok(statements)
}

/// The access level required to run a whole query: the maximum over its
/// statements.
pub fn required_access(statements: &[SqlStatement]) -> AccessLevel {
    statements
        .iter()
        .map(SqlStatement::required_access)
        .max()
        .unwrap_or(AccessLevel::Anonymous)
}

/// Check a parsed query against a granted access level.
///
/// # Errors
///
/// Returns [`CableError::PermissionDenied`] naming the first over-privileged
/// statement when any statement requires more than `granted`.
pub fn check_access(statements: &[SqlStatement], granted: AccessLevel) -> Result<()> {
    for (index, stmt) in statements.iter().enumerate() {
        let required = stmt.required_access();
        if required > granted {
            return Err(CableError::permission_denied(format!(
                "statement {index} requires {required}, caller has {granted}"
            )));
        }
    }
    Ok(())
}

/// Split a token stream into per-statement segments at top-level `;`.
///
/// `CREATE TRIGGER` bodies carry interior semicolons between `BEGIN` and
/// `END`; those do not terminate the statement.
fn split_statements(tokens: Vec<Token>) -> Result<Vec<Vec<Token>>> {
    let mut segments = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth: i32 = 0;
    let mut saw_separator = false;

    for tok in tokens {
        if tok.is_symbol("(") {
            depth += 1;
        } else if tok.is_symbol(")") {
            depth -= 1;
            if depth < 0 {
                return Err(CableError::parse(
                    segments.len(),
                    "unbalanced parentheses: unexpected ')'",
                ));
            }
        }

        if tok.is_symbol(";") && depth == 0 && !inside_trigger_body(&current) {
            if current.is_empty() {
                return Err(CableError::parse(segments.len(), "stray ';' separator"));
            }
            segments.push(std::mem::take(&mut current));
            saw_separator = true;
            continue;
        }
        current.push(tok);
    }

    if depth != 0 {
        return Err(CableError::parse(
            segments.len(),
            "unbalanced parentheses: missing ')'",
        ));
    }
    if !current.is_empty() {
        segments.push(current);
    } else if !saw_separator {
        // Whitespace/comment-only input.
        return Err(CableError::parse(0, "empty query"));
    }
    Ok(segments)
}

/// True while `current` is a `CREATE … TRIGGER` statement whose `END` has not
/// been reached, i.e. a `;` here belongs to the trigger body.
fn inside_trigger_body(current: &[Token]) -> bool {
    if !current.first().is_some_and(|t| t.is_ident("CREATE")) {
        return false;
    }
    let is_trigger = current
        .iter()
        .take(3)
        .any(|t| t.is_ident("TRIGGER"));
    is_trigger && !current.last().is_some_and(|t| t.is_ident("END"))
}

fn classify_segment(index: usize, tokens: Vec<Token>) -> Result<SqlStatement> {
    let head = tokens
        .first()
        .and_then(Token::ident_text)
        .ok_or_else(|| CableError::parse(index, "statement does not begin with a keyword"))?
        .to_ascii_uppercase();

    let class = match head.as_str() {
        "SELECT" => QueryClass::Dql,
        "INSERT" | "UPDATE" | "DELETE" => QueryClass::Dml,
        "CREATE" | "ALTER" | "DROP" => QueryClass::Ddl,
        other => {
            return Err(CableError::parse(
                index,
                format!("unsupported statement: {other}"),
            ));
        }
    };

    if tokens.len() < 2 {
        return Err(CableError::parse(
            index,
            format!("incomplete statement: bare {head}"),
        ));
    }

    let canonical = render_tokens(&tokens);
    Ok(SqlStatement {
        class,
        canonical,
        tokens,
    })
}
