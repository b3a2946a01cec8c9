use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

use crate::dialect::SqlDialect;

/// Token-level sanity check, independent from the parser used for
/// normalization.
///
/// A statement is recognised when its first significant token is an unquoted
/// keyword or an opening bracket. Tokenizer errors count as invalid.
#[derive(Debug, Clone, Copy)]
pub struct StatementValidator {
    dialect: SqlDialect,
}

impl StatementValidator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn validate(&self, sql: &str) -> bool {
        let grammar = self.dialect.grammar();
        let tokens = match Tokenizer::new(grammar.as_ref(), sql).tokenize() {
            Ok(tokens) => tokens,
            Err(error) => {
                debug!("Tokenizer rejected statement: {error}");
                return false;
            }
        };
        let significant = tokens
            .into_iter()
            .filter(|token| !matches!(token, Token::Whitespace(_) | Token::EOF))
            .collect::<Vec<_>>();
        significant
            .split(|token| *token == Token::SemiColon)
            .filter_map(|statement| statement.first())
            .any(opens_statement)
    }
}

fn opens_statement(token: &Token) -> bool {
    match token {
        Token::Word(word) => word.quote_style.is_none() && word.keyword != Keyword::NoKeyword,
        Token::LParen => true,
        _ => false,
    }
}
