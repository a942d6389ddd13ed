//! Bounded SQL shapes the remote store can answer.
//!
//! No raw SQL reaches the hosted service; the generic `query`/`run` calls
//! are translated into its row-filter API. Only single-table statements
//! with `?` placeholders are expressible; joins, `OR`, subqueries and
//! expressions are rejected so callers compose them from multiple
//! round-trips instead.

use serde_json::Value;

use pulperia_core::gateway::{Filter, Row, Select};

use crate::error::{RemoteStoreError, Result};

/// A statement with its parameters bound, ready to map onto the service's
/// API.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Select(Select),
    Insert {
        table: String,
        record: Row,
        or_replace: bool,
    },
    Update {
        table: String,
        key_column: String,
        key: Value,
        patch: Row,
    },
    Delete {
        table: String,
        key_column: String,
        key: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Placeholder,
    Number(u32),
    Comma,
    LParen,
    RParen,
    Eq,
    Gt,
    Star,
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() || c == ';' => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '>' => {
                chars.next();
                tokens.push(Token::Gt);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '?' => {
                chars.next();
                // Numbered placeholders (?1) still bind positionally.
                while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    chars.next();
                }
                tokens.push(Token::Placeholder);
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    digits.push(chars.next().unwrap());
                }
                let value = digits
                    .parse()
                    .map_err(|_| RemoteStoreError::unsupported("numeric literal too large"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while chars
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
                {
                    word.push(chars.next().unwrap());
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(RemoteStoreError::unsupported(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    params: &'a [Value],
    next_param: usize,
}

impl<'a> Parser<'a> {
    fn new(sql: &str, params: &'a [Value]) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(sql)?,
            pos: 0,
            params,
            next_param: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn keyword(&mut self, expected: &str) -> bool {
        match self.peek() {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(expected) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_keyword(&mut self, expected: &str) -> Result<()> {
        if self.keyword(expected) {
            Ok(())
        } else {
            Err(RemoteStoreError::unsupported(format!(
                "expected '{}'",
                expected
            )))
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(RemoteStoreError::unsupported(format!(
                "expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    fn identifier(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Word(word)) if !is_reserved(&word) => Ok(word),
            other => Err(RemoteStoreError::unsupported(format!(
                "expected identifier, found {:?}",
                other
            ))),
        }
    }

    fn bind_placeholder(&mut self) -> Result<Value> {
        self.expect_token(Token::Placeholder)?;
        let value = self.params.get(self.next_param).cloned().ok_or_else(|| {
            RemoteStoreError::invalid_request("fewer parameters than placeholders")
        })?;
        self.next_param += 1;
        Ok(value)
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.tokens.len() {
            return Err(RemoteStoreError::unsupported(format!(
                "trailing tokens after statement: {:?}",
                &self.tokens[self.pos..]
            )));
        }
        if self.next_param != self.params.len() {
            return Err(RemoteStoreError::invalid_request(
                "more parameters than placeholders",
            ));
        }
        Ok(())
    }

    fn parse_select(&mut self) -> Result<BoundStatement> {
        let columns = if matches!(self.peek(), Some(Token::Star)) {
            self.next();
            None
        } else {
            let mut columns = vec![self.identifier()?];
            while matches!(self.peek(), Some(Token::Comma)) {
                self.next();
                columns.push(self.identifier()?);
            }
            Some(columns)
        };
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;

        let mut select = Select::from(table);
        select.columns = columns;

        if self.keyword("WHERE") {
            loop {
                let column = self.identifier()?;
                match self.peek() {
                    Some(Token::Eq) => {
                        self.next();
                        let value = self.bind_placeholder()?;
                        select.filters.push(Filter::eq(column, value));
                    }
                    Some(Token::Gt) => {
                        self.next();
                        let value = self.bind_placeholder()?;
                        select.filters.push(Filter::gt(column, value));
                    }
                    Some(Token::Word(word)) if word.eq_ignore_ascii_case("IS") => {
                        self.next();
                        self.expect_keyword("NULL")?;
                        select.filters.push(Filter::is_null(column));
                    }
                    other => {
                        return Err(RemoteStoreError::unsupported(format!(
                            "unsupported condition after '{}': {:?}",
                            column, other
                        )))
                    }
                }
                if !self.keyword("AND") {
                    break;
                }
            }
        }

        if self.keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = self.identifier()?;
            let descending = if self.keyword("DESC") {
                true
            } else {
                self.keyword("ASC");
                false
            };
            select.order_by = Some((column, descending));
        }

        if self.keyword("LIMIT") {
            match self.next() {
                Some(Token::Number(n)) => select.limit = Some(n),
                other => {
                    return Err(RemoteStoreError::unsupported(format!(
                        "expected numeric limit, found {:?}",
                        other
                    )))
                }
            }
        }

        Ok(BoundStatement::Select(select))
    }

    fn parse_insert(&mut self) -> Result<BoundStatement> {
        let or_replace = if self.keyword("OR") {
            self.expect_keyword("REPLACE")?;
            true
        } else {
            false
        };
        self.expect_keyword("INTO")?;
        let table = self.identifier()?;

        self.expect_token(Token::LParen)?;
        let mut columns = vec![self.identifier()?];
        while matches!(self.peek(), Some(Token::Comma)) {
            self.next();
            columns.push(self.identifier()?);
        }
        self.expect_token(Token::RParen)?;

        self.expect_keyword("VALUES")?;
        self.expect_token(Token::LParen)?;
        let mut values = vec![self.bind_placeholder()?];
        while matches!(self.peek(), Some(Token::Comma)) {
            self.next();
            values.push(self.bind_placeholder()?);
        }
        self.expect_token(Token::RParen)?;

        if columns.len() != values.len() {
            return Err(RemoteStoreError::invalid_request(
                "column count does not match value count",
            ));
        }
        let record: Row = columns.into_iter().zip(values).collect();
        Ok(BoundStatement::Insert {
            table,
            record,
            or_replace,
        })
    }

    fn parse_update(&mut self) -> Result<BoundStatement> {
        let table = self.identifier()?;
        self.expect_keyword("SET")?;

        let mut patch = Row::new();
        loop {
            let column = self.identifier()?;
            self.expect_token(Token::Eq)?;
            let value = self.bind_placeholder()?;
            patch.insert(column, value);
            if !matches!(self.peek(), Some(Token::Comma)) {
                break;
            }
            self.next();
        }

        self.expect_keyword("WHERE")?;
        let key_column = self.identifier()?;
        self.expect_token(Token::Eq)?;
        let key = self.bind_placeholder()?;

        Ok(BoundStatement::Update {
            table,
            key_column,
            key,
            patch,
        })
    }

    fn parse_delete(&mut self) -> Result<BoundStatement> {
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        self.expect_keyword("WHERE")?;
        let key_column = self.identifier()?;
        self.expect_token(Token::Eq)?;
        let key = self.bind_placeholder()?;
        Ok(BoundStatement::Delete {
            table,
            key_column,
            key,
        })
    }
}

fn is_reserved(word: &str) -> bool {
    const RESERVED: [&str; 16] = [
        "SELECT", "FROM", "WHERE", "AND", "OR", "ORDER", "BY", "LIMIT", "INSERT", "INTO",
        "VALUES", "UPDATE", "SET", "DELETE", "IS", "NULL",
    ];
    RESERVED.iter().any(|r| word.eq_ignore_ascii_case(r))
}

/// Parse one statement and bind its parameters.
pub fn bind_statement(sql: &str, params: &[Value]) -> Result<BoundStatement> {
    let mut parser = Parser::new(sql, params)?;
    let statement = if parser.keyword("SELECT") {
        parser.parse_select()?
    } else if parser.keyword("INSERT") {
        parser.parse_insert()?
    } else if parser.keyword("UPDATE") {
        parser.parse_update()?
    } else if parser.keyword("DELETE") {
        parser.parse_delete()?
    } else {
        return Err(RemoteStoreError::unsupported(
            "statement must start with SELECT, INSERT, UPDATE or DELETE",
        ));
    };
    parser.finish()?;
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulperia_core::gateway::FilterOp;
    use serde_json::json;

    #[test]
    fn select_with_filters_order_and_limit() {
        let statement = bind_statement(
            "SELECT id, name FROM products WHERE active = ?1 AND stock > ?2 ORDER BY name ASC LIMIT 20",
            &[json!(1), json!(0)],
        )
        .unwrap();
        let BoundStatement::Select(select) = statement else {
            panic!("expected select");
        };
        assert_eq!(select.table, "products");
        assert_eq!(select.columns, Some(vec!["id".into(), "name".into()]));
        assert_eq!(select.filters.len(), 2);
        assert_eq!(select.filters[1].op, FilterOp::Gt);
        assert_eq!(select.order_by, Some(("name".into(), false)));
        assert_eq!(select.limit, Some(20));
    }

    #[test]
    fn select_star_with_is_null() {
        let statement =
            bind_statement("SELECT * FROM cash_sessions WHERE closed_at IS NULL", &[]).unwrap();
        let BoundStatement::Select(select) = statement else {
            panic!("expected select");
        };
        assert_eq!(select.columns, None);
        assert_eq!(select.filters[0].op, FilterOp::IsNull);
    }

    #[test]
    fn insert_zips_columns_with_parameters() {
        let statement = bind_statement(
            "INSERT INTO config (key, value, updated_at) VALUES (?, ?, ?)",
            &[json!("exchange_rate"), json!("512.35"), json!("2026-03-01")],
        )
        .unwrap();
        let BoundStatement::Insert {
            table,
            record,
            or_replace,
        } = statement
        else {
            panic!("expected insert");
        };
        assert_eq!(table, "config");
        assert!(!or_replace);
        assert_eq!(record.get("key"), Some(&json!("exchange_rate")));
    }

    #[test]
    fn update_splits_patch_and_key() {
        let statement = bind_statement(
            "UPDATE products SET stock = ?, updated_at = ? WHERE id = ?",
            &[json!("4"), json!("2026-03-01"), json!("p1")],
        )
        .unwrap();
        let BoundStatement::Update {
            key_column, key, patch, ..
        } = statement
        else {
            panic!("expected update");
        };
        assert_eq!(key_column, "id");
        assert_eq!(key, json!("p1"));
        assert_eq!(patch.len(), 2);
    }

    #[test]
    fn joins_and_boolean_or_are_rejected() {
        assert!(bind_statement(
            "SELECT * FROM sales JOIN sale_items ON sales.id = sale_items.sale_id",
            &[],
        )
        .is_err());
        assert!(bind_statement(
            "SELECT * FROM sales WHERE id = ? OR total = ?",
            &[json!("a"), json!("b")],
        )
        .is_err());
    }

    #[test]
    fn parameter_count_mismatch_is_rejected() {
        assert!(bind_statement("SELECT * FROM products WHERE id = ?", &[]).is_err());
        assert!(
            bind_statement("SELECT * FROM products", &[json!("stray")]).is_err()
        );
    }
}
