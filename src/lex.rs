use std::fmt;

use nom::{
    IResult,
    Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{map, value},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Cluster,       // %
    ClusterKey,    // :
    GroupStart,    // {
    GroupEnd,      // }
    Comma,         // ,
    Intersect,     // &
    Exclude,       // -
    FunctionStart, // (
    FunctionEnd,   // )
    Local,         // $
    GroupRef,      // @
    MatchDelim,    // /
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text(text) => write!(f, "text '{text}'"),
            Token::Cluster => f.write_str("'%'"),
            Token::ClusterKey => f.write_str("':'"),
            Token::GroupStart => f.write_str("'{'"),
            Token::GroupEnd => f.write_str("'}'"),
            Token::Comma => f.write_str("','"),
            Token::Intersect => f.write_str("'&'"),
            Token::Exclude => f.write_str("'-'"),
            Token::FunctionStart => f.write_str("'('"),
            Token::FunctionEnd => f.write_str("')'"),
            Token::Local => f.write_str("'$'"),
            Token::GroupRef => f.write_str("'@'"),
            Token::MatchDelim => f.write_str("'/'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

fn is_punct(c: char) -> bool {
    matches!(
        c,
        '%' | ':' | '{' | '}' | ',' | '&' | '-' | '(' | ')' | '$' | '@' | '/'
    )
}

fn is_text_char(c: char) -> bool {
    !is_punct(c) && !c.is_whitespace()
}

fn text(input: &str) -> IResult<&str, Token> {
    map(take_while1(is_text_char), |s: &str| Token::Text(s.to_string())).parse(input)
}

fn punct(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Cluster, char('%')),
        value(Token::ClusterKey, char(':')),
        value(Token::GroupStart, char('{')),
        value(Token::GroupEnd, char('}')),
        value(Token::Comma, char(',')),
        value(Token::Intersect, char('&')),
        value(Token::Exclude, char('-')),
        value(Token::FunctionStart, char('(')),
        value(Token::FunctionEnd, char(')')),
        value(Token::Local, char('$')),
        value(Token::GroupRef, char('@')),
        value(Token::MatchDelim, char('/')),
    ))
    .parse(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((punct, text)).parse(input)
}

/// Split a query into tokens. Whitespace separates literal runs but is
/// otherwise dropped. The result always ends with `Token::Eof`.
pub fn lex(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = input;

    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }

        match token(trimmed) {
            Ok((remaining, tok)) => {
                tokens.push(tok);
                rest = remaining;
            }
            Err(_) => {
                // every non-whitespace char is either punctuation or text
                tokens.push(Token::Text(trimmed.to_string()));
                break;
            }
        }
    }

    tokens.push(Token::Eof);
    tokens
}
