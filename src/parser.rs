//! Clause text scanning using nom.
//!
//! The model carries SQL fragments verbatim. The statement builder only needs
//! two lexical checks on them:
//!
//! - strict mode: parentheses must stay balanced outside quoted text and
//!   comments, so a selection such as `a = 1) OR (1 = 1` cannot escape the
//!   `WHERE (...)` wrapper it is placed in. Comments must be terminated
//!   inside the clause: a trailing `--` or `/*` would swallow the wrapper;
//! - LIMIT must be `count` or `offset, count`.
//!
//! ```text
//! name = ')(' AND (age > ?)
//! ──┬─── ─┬── ──┬─ ┬──────┬
//!   │     │     │  │      └── Close
//!   │     │     │  └── Open
//!   │     │     └── Other
//!   │     └── Quoted (ignored)
//!   └── Other
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, not, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, terminated, tuple},
    IResult,
};

use crate::error::{QueryError, QueryResult};

/// Lexical unit relevant to parenthesis balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Quoted,
    Comment,
    Other,
}

/// Verify that `text` keeps its parentheses balanced outside quoted text.
///
/// `clause` names the clause in the returned error.
pub fn check_balanced(clause: &'static str, text: &str) -> QueryResult<()> {
    let tokens = match tokenize(text) {
        Ok(("", tokens)) => tokens,
        Ok((remaining, _)) => {
            return Err(QueryError::clause(
                clause,
                format!(
                    "unterminated quoted text or comment at position {}",
                    text.len() - remaining.len()
                ),
            ));
        }
        Err(e) => return Err(QueryError::clause(clause, format!("scan failed: {:?}", e))),
    };

    let mut depth: usize = 0;
    for token in tokens {
        match token {
            Token::Open => depth += 1,
            Token::Close => {
                if depth == 0 {
                    return Err(QueryError::clause(
                        clause,
                        "closing parenthesis without a matching opening one",
                    ));
                }
                depth -= 1;
            }
            Token::Quoted | Token::Comment | Token::Other => {}
        }
    }

    if depth != 0 {
        return Err(QueryError::clause(
            clause,
            format!("{} unclosed parenthesis", depth),
        ));
    }
    Ok(())
}

/// Verify a LIMIT clause body: `count` or `offset, count`.
pub fn check_limit(text: &str) -> QueryResult<()> {
    match all_consuming(limit_clause)(text) {
        Ok(_) => Ok(()),
        Err(_) => Err(QueryError::clause(
            "LIMIT",
            format!("'{}' is not a row count or 'offset, count' pair", text),
        )),
    }
}

/// Split text into tokens until something unscannable (an unterminated quote
/// or comment).
fn tokenize(input: &str) -> IResult<&str, Vec<Token>> {
    many0(alt((
        value(Token::Open, char('(')),
        value(Token::Close, char(')')),
        quoted('\''),
        quoted('"'),
        quoted('`'),
        value(
            Token::Quoted,
            delimited(char('['), take_while(|c: char| c != ']'), char(']')),
        ),
        value(
            Token::Comment,
            delimited(tag("/*"), take_until("*/"), tag("*/")),
        ),
        value(
            Token::Comment,
            delimited(tag("--"), take_while(|c: char| c != '\n'), char('\n')),
        ),
        // Division and minus, but never the start of a comment
        value(Token::Other, terminated(char('/'), not(char('*')))),
        value(Token::Other, terminated(char('-'), not(char('-')))),
        value(
            Token::Other,
            take_while1(|c: char| !matches!(c, '(' | ')' | '\'' | '"' | '`' | '[' | '/' | '-')),
        ),
    )))(input)
}

/// Parse text quoted by `delim`, where a doubled delimiter is an escape.
fn quoted<'a>(delim: char) -> impl FnMut(&'a str) -> IResult<&'a str, Token> {
    move |input: &'a str| {
        let (input, _) = char(delim)(input)?;
        let (input, _) = many0(alt((
            take_while1(move |c: char| c != delim),
            recognize(pair(char(delim), char(delim))),
        )))(input)?;
        let (input, _) = char(delim)(input)?;
        Ok((input, Token::Quoted))
    }
}

/// Parse `N` or `N, M` with optional surrounding whitespace.
fn limit_clause(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        multispace0,
        digit1,
        multispace0,
        opt(tuple((char(','), multispace0, digit1, multispace0))),
    )))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_simple() {
        assert!(check_balanced("WHERE", "a = ?").is_ok());
        assert!(check_balanced("WHERE", "(a = ? OR b = ?) AND c IN (1, 2)").is_ok());
    }

    #[test]
    fn test_escaping_selection_rejected() {
        let err = check_balanced("WHERE", "a = 1) OR (1 = 1").unwrap_err();
        assert!(err.to_string().contains("closing parenthesis"));
    }

    #[test]
    fn test_unclosed_rejected() {
        let err = check_balanced("HAVING", "count(*) > (1").unwrap_err();
        assert!(err.to_string().contains("Invalid HAVING clause"));
    }

    #[test]
    fn test_parentheses_in_literals_ignored() {
        assert!(check_balanced("WHERE", "name = ')('").is_ok());
        assert!(check_balanced("WHERE", "name = 'it''s (odd'").is_ok());
        assert!(check_balanced("WHERE", "\"weird)col\" = 1").is_ok());
        assert!(check_balanced("WHERE", "[odd(name] = 1").is_ok());
    }

    #[test]
    fn test_unterminated_literal_rejected() {
        let err = check_balanced("WHERE", "name = 'abc").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_parentheses_in_comments_ignored() {
        assert!(check_balanced("WHERE", "a = 1 /* (legacy) */ AND b = 2").is_ok());
        assert!(check_balanced("WHERE", "a = 1 -- closes )\nAND b = 2").is_ok());
        assert!(check_balanced("WHERE", "a / 2 - 1 > -(b)").is_ok());
    }

    #[test]
    fn test_commented_escape_rejected() {
        let err = check_balanced(
            "WHERE",
            "0 /*(*/) UNION SELECT secret FROM s WHERE (1 /*)*/",
        )
        .unwrap_err();
        assert!(err.to_string().contains("closing parenthesis"));
    }

    #[test]
    fn test_unterminated_comment_rejected() {
        for text in ["a = 1 /* (", "a = 1 -- )", "a = 1 --"] {
            let err = check_balanced("WHERE", text).unwrap_err();
            assert!(err.to_string().contains("unterminated"), "{}", text);
        }
    }

    #[test]
    fn test_limit_accepted() {
        assert!(check_limit("10").is_ok());
        assert!(check_limit(" 10 ").is_ok());
        assert!(check_limit("5, 10").is_ok());
        assert!(check_limit("5,10").is_ok());
    }

    #[test]
    fn test_limit_rejected() {
        assert!(check_limit("ten").is_err());
        assert!(check_limit("10; DROP TABLE t").is_err());
        assert!(check_limit("10 OFFSET 5").is_err());
        assert!(check_limit("-1").is_err());
    }
}
