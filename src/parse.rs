use std::{iter::Peekable, vec::IntoIter};

use crate::{
    lex::{Token, lex},
    node::{DEFAULT_KEY, Node},
};

type Tokens = Peekable<IntoIter<Token>>;

/// Build a parse tree from a token stream. Parse failures are reported as
/// `Error` nodes inside the tree, never as a Rust error.
pub fn parse(tokens: Vec<Token>) -> Node {
    parse_range(&mut tokens.into_iter().peekable())
}

pub fn parse_str(input: &str) -> Node {
    parse(lex(input))
}

/// Whether a union member ended at a `,` with more members to follow.
enum Member {
    Last(Node),
    Continues(Node),
}

/// Comma-separated members, collected in a loop and stored as one flat
/// union. A member that fails becomes the final `Error` member.
fn parse_range(tokens: &mut Tokens) -> Node {
    let mut members = Vec::new();
    loop {
        match parse_sequence(tokens) {
            Ok(Member::Continues(node)) => members.push(node),
            Ok(Member::Last(node)) => {
                members.push(node);
                break;
            }
            Err(message) => {
                members.push(Node::Error(message));
                break;
            }
        }
    }
    Node::union(members)
}

fn join(current: Option<Node>, node: Node) -> Node {
    match current {
        Some(current) => current.merge(node),
        None => node,
    }
}

fn left_side(current: Option<Node>) -> Node {
    current.unwrap_or_else(|| Node::error("no left side for operator"))
}

fn parse_sequence(tokens: &mut Tokens) -> Result<Member, String> {
    let mut current: Option<Node> = None;

    while let Some(token) = tokens.next() {
        match token {
            Token::Eof => break,
            Token::Text(text) => current = Some(join(current, Node::Text(text))),
            Token::FunctionStart => {
                let name = match current {
                    Some(Node::Text(name)) => name,
                    Some(_) => return Err("function call syntax is not supported here".into()),
                    None => return Err("no function name before '('".into()),
                };
                current = Some(parse_function(&name, tokens)?);
            }
            Token::Cluster => current = Some(parse_cluster(tokens)?),
            Token::Local => current = Some(Node::LocalClusterLookup(expect_name(tokens, '$')?)),
            Token::GroupRef => current = Some(Node::GroupLookup(expect_name(tokens, '@')?)),
            Token::MatchDelim => current = Some(parse_match(tokens)?),
            Token::GroupStart => {
                let sub = parse(group_body(tokens)?);
                if let Some(message) = sub.find_error() {
                    return Err(message);
                }
                current = Some(join(current, sub));
            }
            Token::Comma => {
                if let Some(node) = current.take() {
                    return Ok(Member::Continues(node));
                }
            }
            // The right operand runs to the end of the stream. A missing left
            // side still parses the right so later errors are reported too.
            Token::Intersect => {
                let node = Node::intersect(left_side(current), parse_range(tokens));
                return Ok(Member::Last(node));
            }
            Token::Exclude => {
                let node = Node::exclude(left_side(current), parse_range(tokens));
                return Ok(Member::Last(node));
            }
            Token::GroupEnd | Token::FunctionEnd | Token::ClusterKey => {
                return Err(format!("unexpected {token}"));
            }
        }
    }

    Ok(Member::Last(current.unwrap_or(Node::Empty)))
}

/// Tokens between a `{` (already consumed) and its matching `}`, terminated
/// with `Eof` so they can be parsed on their own.
fn group_body(tokens: &mut Tokens) -> Result<Vec<Token>, String> {
    let mut depth = 1usize;
    let mut body = Vec::new();

    for token in tokens.by_ref() {
        match &token {
            Token::Eof => break,
            Token::GroupStart => depth += 1,
            Token::GroupEnd => {
                depth -= 1;
                if depth == 0 {
                    body.push(Token::Eof);
                    return Ok(body);
                }
            }
            _ => {}
        }
        body.push(token);
    }

    Err("no matching closing bracket".to_string())
}

fn found(token: Option<Token>) -> Token {
    token.unwrap_or(Token::Eof)
}

fn parse_function(name: &str, tokens: &mut Tokens) -> Result<Node, String> {
    if name != "has" {
        return Err(format!("unknown function: {name}"));
    }

    let mut param = String::new();
    while let Some(Token::Text(text)) = tokens.peek() {
        param.push_str(text);
        tokens.next();
    }
    if param.is_empty() {
        return Err("expecting text inside function call".to_string());
    }

    match tokens.next() {
        Some(Token::FunctionEnd) => {}
        other => {
            return Err(format!(
                "expecting ')' after function argument, found {}",
                found(other)
            ));
        }
    }

    match param.split(';').collect::<Vec<_>>().as_slice() {
        [key, value] => Ok(Node::Has {
            key: key.to_string(),
            value: value.to_string(),
        }),
        _ => Err(format!("invalid function parameter: {param}")),
    }
}

fn cluster_key(tokens: &mut Tokens) -> Result<String, String> {
    match tokens.next() {
        Some(Token::Text(key)) => Ok(key),
        other => Err(format!(
            "expected cluster key after ':', found {}",
            found(other)
        )),
    }
}

fn parse_cluster(tokens: &mut Tokens) -> Result<Node, String> {
    match tokens.next() {
        Some(Token::Text(name)) => match tokens.peek() {
            Some(Token::ClusterKey) => {
                tokens.next();
                Ok(Node::cluster_lookup(name, cluster_key(tokens)?))
            }
            // a following `,` is left for the enclosing union
            None | Some(Token::Eof | Token::Comma | Token::Intersect | Token::Exclude) => {
                Ok(Node::cluster_lookup(name, DEFAULT_KEY))
            }
            Some(_) => Err(format!("invalid token in query: {}", found(tokens.next()))),
        },
        Some(Token::GroupStart) => {
            let expr = parse(group_body(tokens)?);
            let key = if let Some(Token::ClusterKey) = tokens.peek() {
                tokens.next();
                cluster_key(tokens)?
            } else {
                DEFAULT_KEY.to_string()
            };
            Ok(Node::Subexpr {
                expr: Box::new(expr),
                key,
            })
        }
        other => Err(format!("invalid token in query: {}", found(other))),
    }
}

fn expect_name(tokens: &mut Tokens, marker: char) -> Result<String, String> {
    match tokens.next() {
        Some(Token::Text(name)) => Ok(name),
        other => Err(format!("expected name after '{marker}', found {}", found(other))),
    }
}

fn parse_match(tokens: &mut Tokens) -> Result<Node, String> {
    let pattern = match tokens.next() {
        Some(Token::Text(pattern)) => pattern,
        other => return Err(format!("expected pattern after '/', found {}", found(other))),
    };

    match tokens.next() {
        Some(Token::MatchDelim) => Ok(Node::Match(pattern)),
        _ => Err(format!("unterminated match pattern: {pattern}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::KEYS;

    fn text(s: &str) -> Node {
        Node::text(s)
    }

    #[test]
    fn parse_literal() {
        assert_eq!(parse_str("host1"), text("host1"));
    }

    #[test]
    fn parse_empty_input() {
        assert_eq!(parse_str(""), Node::Empty);
    }

    #[test]
    fn parse_union_is_right_nested() {
        assert_eq!(
            parse_str("a,b,c"),
            Node::group(text("a"), Node::group(text("b"), text("c")))
        );
    }

    #[test]
    fn parse_trailing_comma_yields_empty_tail() {
        assert_eq!(parse_str("a,"), Node::group(text("a"), Node::Empty));
    }

    #[test]
    fn parse_brace_expansion() {
        assert_eq!(
            parse_str("a{b,c}d"),
            Node::group(text("abd"), text("acd"))
        );
    }

    #[test]
    fn parse_nested_braces() {
        assert_eq!(
            parse_str("x{a{1,2},b}"),
            Node::group(
                Node::group(text("xa1"), text("xa2")),
                text("xb")
            )
        );
    }

    #[test]
    fn parse_unclosed_brace() {
        assert_eq!(
            parse_str("a{b,c").find_error().as_deref(),
            Some("no matching closing bracket")
        );
    }

    #[test]
    fn parse_cluster_default_key() {
        assert_eq!(parse_str("%web"), Node::cluster_lookup("web", "CLUSTER"));
    }

    #[test]
    fn parse_cluster_explicit_key() {
        assert_eq!(parse_str("%web:KEYS"), Node::cluster_lookup("web", KEYS));
    }

    #[test]
    fn parse_cluster_missing_key_is_error() {
        let message = parse_str("%cluster:").find_error().unwrap();
        assert!(message.contains("expected cluster key"), "{message}");
    }

    #[test]
    fn parse_cluster_trailing_comma_resumes_union() {
        assert_eq!(
            parse_str("%web,db1"),
            Node::group(Node::cluster_lookup("web", "CLUSTER"), text("db1"))
        );
    }

    #[test]
    fn parse_bare_cluster_before_operator() {
        assert_eq!(
            parse_str("%web & host1"),
            Node::intersect(Node::cluster_lookup("web", "CLUSTER"), text("host1"))
        );
    }

    #[test]
    fn parse_intersect_takes_rest_of_stream() {
        assert_eq!(
            parse_str("a & b,c"),
            Node::intersect(text("a"), Node::group(text("b"), text("c")))
        );
    }

    #[test]
    fn parse_exclude() {
        assert_eq!(
            parse_str("%web:CLUSTER - host1"),
            Node::exclude(Node::cluster_lookup("web", "CLUSTER"), text("host1"))
        );
    }

    #[test]
    fn parse_missing_left_side_keeps_parsing_right() {
        let tree = parse_str("& b");
        assert_eq!(
            tree,
            Node::intersect(Node::error("no left side for operator"), text("b"))
        );
    }

    #[test]
    fn parse_has() {
        assert_eq!(
            parse_str("has(role;web)"),
            Node::Has {
                key: "role".into(),
                value: "web".into()
            }
        );
    }

    #[test]
    fn parse_has_bad_argument() {
        let message = parse_str("has(role)").find_error().unwrap();
        assert_eq!(message, "invalid function parameter: role");
    }

    #[test]
    fn parse_unknown_function() {
        let message = parse_str("count(a;b)").find_error().unwrap();
        assert_eq!(message, "unknown function: count");
    }

    #[test]
    fn parse_call_on_non_text_is_error() {
        assert!(parse_str("%web:ROLE(a;b)").find_error().is_some());
    }

    #[test]
    fn parse_local_group_and_match() {
        assert_eq!(parse_str("$ROLE"), Node::LocalClusterLookup("ROLE".into()));
        assert_eq!(parse_str("@all"), Node::GroupLookup("all".into()));
        assert_eq!(parse_str("/web/"), Node::Match("web".into()));
        assert!(parse_str("/web").find_error().is_some());
        assert!(parse_str("@").find_error().is_some());
    }

    #[test]
    fn parse_subexpr() {
        assert_eq!(
            parse_str("%{has(role;web)}:HOSTS"),
            Node::Subexpr {
                expr: Box::new(Node::Has {
                    key: "role".into(),
                    value: "web".into()
                }),
                key: "HOSTS".into(),
            }
        );
    }

    #[test]
    fn parse_error_inside_braces_is_not_absorbed() {
        assert!(parse_str("a{%x:}").find_error().is_some());
    }

    #[test]
    fn parse_lookup_absorbs_trailing_text() {
        assert_eq!(parse_str("%web:ROLE extra"), Node::cluster_lookup("web", "ROLE"));
    }

    #[test]
    fn parse_stray_closing_bracket() {
        assert_eq!(parse_str("a}").find_error().as_deref(), Some("unexpected '}'"));
    }

    #[test]
    fn parse_wide_union_is_flat() {
        let query = (0..20_000).map(|i| format!("host{i}")).collect::<Vec<_>>().join(",");
        let Node::Group(members) = parse_str(&query) else {
            panic!("expected a group");
        };
        assert_eq!(members.len(), 20_000);
        assert_eq!(members[0], text("host0"));
        assert_eq!(members[19_999], text("host19999"));
    }

    #[test]
    fn parse_wide_cluster_union() {
        let query = (0..20_000).map(|i| format!("%c{i}")).collect::<Vec<_>>().join(",");
        let Node::Group(members) = parse_str(&query) else {
            panic!("expected a group");
        };
        assert_eq!(members.len(), 20_000);
        assert_eq!(members[1], Node::cluster_lookup("c1", "CLUSTER"));
    }

    #[test]
    fn parse_error_member_ends_union() {
        assert_eq!(
            parse_str("a,%x:,b"),
            Node::Group(vec![
                text("a"),
                Node::error("expected cluster key after ':', found ','")
            ])
        );
    }

    #[test]
    fn parse_is_deterministic() {
        let query = "%a:B,{x,y}z & has(k;v) - /m/";
        assert_eq!(parse_str(query), parse_str(query));
    }
}
