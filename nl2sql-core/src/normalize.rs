use sqlparser::ast::Statement;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Location, Token, Tokenizer, Whitespace};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dialect::SqlDialect;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialectError {
    #[error("no statement to parse")]
    Empty,
    #[error("{message}")]
    Unparseable { message: String },
}

/// Parses candidates under a dialect grammar and re-emits them canonically.
#[derive(Debug, Clone, Copy)]
pub struct DialectNormalizer {
    dialect: SqlDialect,
}

impl DialectNormalizer {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn normalize(&self, candidate: &str) -> Result<String, DialectError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(DialectError::Empty);
        }
        let statements = match self.parse(candidate) {
            Ok(statements) => statements,
            Err(error) => self.repair(candidate).ok_or(error)?,
        };
        if statements.len() > 1 {
            warn!(
                "Candidate holds {} statements, keeping the first",
                statements.len()
            );
        }
        let statement = statements.into_iter().next().ok_or(DialectError::Empty)?;
        Ok(statement.to_string())
    }

    fn parse(&self, sql: &str) -> Result<Vec<Statement>, DialectError> {
        let grammar = self.dialect.grammar();
        Parser::parse_sql(grammar.as_ref(), sql).map_err(|error| DialectError::Unparseable {
            message: error.to_string(),
        })
    }

    fn repair(&self, candidate: &str) -> Option<Vec<Statement>> {
        let repairs: [fn(SqlDialect, &str) -> Option<String>; 2] =
            [drop_after_terminator, close_brackets];
        let mut repaired = candidate.to_owned();
        for repair in repairs {
            let Some(next) = repair(self.dialect, &repaired) else {
                continue;
            };
            debug!("Repaired candidate to {next:?}");
            repaired = next;
            if let Ok(statements) = self.parse(&repaired) {
                return Some(statements);
            }
        }
        None
    }
}

/// Token level view of a candidate: first terminator, unclosed brackets and
/// how the text ends. Quotes and comments are handled by the dialect tokenizer.
struct Scan {
    terminator: Option<usize>,
    open_brackets: usize,
    missing_operand: bool,
    trailing_comment: bool,
}

fn scan(dialect: SqlDialect, sql: &str) -> Option<Scan> {
    let grammar = dialect.grammar();
    let tokens = Tokenizer::new(grammar.as_ref(), sql)
        .tokenize_with_location()
        .ok()?;
    let mut terminator = None;
    let mut depth = 0usize;
    for token in &tokens {
        match token.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::SemiColon if terminator.is_none() => {
                terminator = byte_offset(sql, token.span.start);
            }
            _ => {}
        }
    }
    let last_token = tokens
        .iter()
        .map(|token| &token.token)
        .rev()
        .find(|token| !is_layout(token));
    let last_code = tokens
        .iter()
        .map(|token| &token.token)
        .rev()
        .find(|token| !matches!(token, Token::Whitespace(_) | Token::EOF));
    Some(Scan {
        terminator,
        open_brackets: depth,
        // A trailing operator or opening bracket means the operand itself is missing.
        missing_operand: matches!(
            last_code,
            None | Some(
                Token::LParen
                    | Token::Comma
                    | Token::Eq
                    | Token::DoubleEq
                    | Token::Neq
                    | Token::Lt
                    | Token::Gt
                    | Token::LtEq
                    | Token::GtEq
                    | Token::Plus
                    | Token::Minus
                    | Token::Mul
                    | Token::Div
                    | Token::Mod
                    | Token::Period
                    | Token::StringConcat
            )
        ),
        trailing_comment: matches!(
            last_token,
            Some(Token::Whitespace(Whitespace::SingleLineComment { .. }))
        ),
    })
}

fn is_layout(token: &Token) -> bool {
    matches!(
        token,
        Token::EOF | Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab)
    )
}

/// Byte offset of a 1-based tokenizer location.
fn byte_offset(sql: &str, location: Location) -> Option<usize> {
    let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
    let start: usize = sql.split_inclusive('\n').take(line).map(str::len).sum();
    sql.get(start..)?
        .char_indices()
        .nth(column)
        .map(|(idx, _)| start + idx)
}

fn drop_after_terminator(dialect: SqlDialect, sql: &str) -> Option<String> {
    let end = scan(dialect, sql)?.terminator?;
    let rest = &sql[end + 1..];
    if rest.trim().is_empty() {
        return None;
    }
    Some(sql[..end].trim_end().to_owned())
}

fn close_brackets(dialect: SqlDialect, sql: &str) -> Option<String> {
    let body = sql.trim_end().trim_end_matches(';').trim_end();
    let scan = scan(dialect, body)?;
    if scan.open_brackets == 0 || scan.missing_operand {
        return None;
    }
    let closing = ")".repeat(scan.open_brackets);
    Some(match scan.trailing_comment {
        true => format!("{body}\n{closing}"),
        false => format!("{body}{closing}"),
    })
}
