use std::fmt;

/// Key used by `%cluster` when no explicit key follows.
pub const DEFAULT_KEY: &str = "CLUSTER";

/// Reserved key returning a cluster's key names.
pub const KEYS: &str = "KEYS";

/// Parse tree as built by the parser. May contain `Error` nodes; convert to
/// an [`Expr`] before evaluating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Empty,
    Text(String),
    ClusterLookup { name: String, key: String },
    LocalClusterLookup(String),
    GroupLookup(String),
    Subexpr { expr: Box<Node>, key: String },
    /// Union members in order. Never empty, and the last member is never
    /// itself a `Group`.
    Group(Vec<Node>),
    Intersect(Box<Node>, Box<Node>),
    Exclude(Box<Node>, Box<Node>),
    Has { key: String, value: String },
    Match(String),
    Error(String),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Node::Error(message.into())
    }

    pub fn group(head: Node, tail: Node) -> Self {
        Node::union(vec![head, tail])
    }

    /// Right-nested union of `members`, stored flat. A trailing `Group` is
    /// spliced in, so `union([a, {b,c}])` equals `group(a, group(b, c))`.
    pub fn union(mut members: Vec<Node>) -> Self {
        match members.pop() {
            None => Node::Empty,
            Some(last) if members.is_empty() => last,
            Some(Node::Group(rest)) => {
                members.extend(rest);
                Node::Group(members)
            }
            Some(last) => {
                members.push(last);
                Node::Group(members)
            }
        }
    }

    pub fn intersect(left: Node, right: Node) -> Self {
        Node::Intersect(Box::new(left), Box::new(right))
    }

    pub fn exclude(left: Node, right: Node) -> Self {
        Node::Exclude(Box::new(left), Box::new(right))
    }

    pub fn cluster_lookup(name: impl Into<String>, key: impl Into<String>) -> Self {
        Node::ClusterLookup {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Implicit concatenation of `self` with the node that follows it.
    ///
    /// Text joins Text, and anything distributes over a Group so that
    /// `a{b,c}d` becomes `{abd,acd}`.
    pub fn merge(self, other: Node) -> Node {
        match self {
            Node::Empty => other,
            Node::Text(text) => match other {
                Node::Empty => Node::Text(text),
                Node::Text(next) => Node::Text(text + &next),
                Node::Group(members) => Node::union(
                    members
                        .into_iter()
                        .map(|member| Node::Text(text.clone()).merge(member))
                        .collect(),
                ),
                other => Node::Text(text).absorb(other),
            },
            Node::Group(members) => Node::union(
                members
                    .into_iter()
                    .map(|member| member.merge(other.clone()))
                    .collect(),
            ),
            node => node.absorb(other),
        }
    }

    /// Merge fallback for nodes that cannot be concatenated: the left side
    /// is kept and `_other` is discarded without an error.
    ///
    /// A stricter grammar would turn this into an `Error` node.
    fn absorb(self, _other: Node) -> Node {
        self
    }

    /// First error message in the tree, depth first, left before right.
    pub fn find_error(&self) -> Option<String> {
        Expr::try_from(self.clone()).err()
    }
}

/// Validated tree: a [`Node`] with no `Error` anywhere in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Empty,
    Text(String),
    ClusterLookup { name: String, key: String },
    LocalClusterLookup(String),
    GroupLookup(String),
    Subexpr { expr: Box<Expr>, key: String },
    Group(Vec<Expr>),
    Intersect(Box<Expr>, Box<Expr>),
    Exclude(Box<Expr>, Box<Expr>),
    Has { key: String, value: String },
    Match(String),
}

fn check_pair(left: Node, right: Node) -> Result<(Box<Expr>, Box<Expr>), String> {
    let left = Expr::try_from(left)?;
    let right = Expr::try_from(right)?;
    Ok((Box::new(left), Box::new(right)))
}

impl TryFrom<Node> for Expr {
    type Error = String;

    fn try_from(node: Node) -> Result<Self, String> {
        Ok(match node {
            Node::Error(message) => return Err(message),
            Node::Empty => Expr::Empty,
            Node::Text(text) => Expr::Text(text),
            Node::ClusterLookup { name, key } => Expr::ClusterLookup { name, key },
            Node::LocalClusterLookup(key) => Expr::LocalClusterLookup(key),
            Node::GroupLookup(name) => Expr::GroupLookup(name),
            Node::Subexpr { expr, key } => Expr::Subexpr {
                expr: Box::new(Expr::try_from(*expr)?),
                key,
            },
            Node::Group(members) => Expr::Group(
                members
                    .into_iter()
                    .map(Expr::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Node::Intersect(left, right) => {
                let (left, right) = check_pair(*left, *right)?;
                Expr::Intersect(left, right)
            }
            Node::Exclude(left, right) => {
                let (left, right) = check_pair(*left, *right)?;
                Expr::Exclude(left, right)
            }
            Node::Has { key, value } => Expr::Has { key, value },
            Node::Match(value) => Expr::Match(value),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Empty => Ok(()),
            Expr::Text(text) => f.write_str(text),
            Expr::ClusterLookup { name, key } => write!(f, "%{name}:{key}"),
            Expr::LocalClusterLookup(key) => write!(f, "${key}"),
            Expr::GroupLookup(name) => write!(f, "@{name}"),
            Expr::Subexpr { expr, key } => write!(f, "%{{{expr}}}:{key}"),
            Expr::Group(members) => {
                f.write_str("{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("}")
            }
            Expr::Intersect(left, right) => write!(f, "<{left} & {right}>"),
            Expr::Exclude(left, right) => write!(f, "<{left} - {right}>"),
            Expr::Has { key, value } => write!(f, "has({key};{value})"),
            Expr::Match(value) => write!(f, "/{value}/"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_merges_into_text() {
        assert_eq!(Node::text("web").merge(Node::text("01")), Node::text("web01"));
    }

    #[test]
    fn text_distributes_over_group() {
        let merged = Node::text("a").merge(Node::group(Node::text("b"), Node::text("c")));
        assert_eq!(merged, Node::group(Node::text("ab"), Node::text("ac")));
    }

    #[test]
    fn group_distributes_suffix() {
        let merged = Node::group(Node::text("a"), Node::text("b")).merge(Node::text("x"));
        assert_eq!(merged, Node::group(Node::text("ax"), Node::text("bx")));
    }

    #[test]
    fn lookup_absorbs_following_text() {
        let lookup = Node::cluster_lookup("web", DEFAULT_KEY);
        assert_eq!(lookup.clone().merge(Node::text("tail")), lookup);
    }

    #[test]
    fn intersect_absorbs_following_text() {
        let node = Node::intersect(Node::text("a"), Node::text("b"));
        assert_eq!(node.clone().merge(Node::text("c")), node);
    }

    #[test]
    fn empty_is_merge_identity() {
        assert_eq!(Node::Empty.merge(Node::text("a")), Node::text("a"));
        assert_eq!(Node::text("a").merge(Node::Empty), Node::text("a"));
    }

    #[test]
    fn find_error_prefers_left_branch() {
        let tree = Node::group(
            Node::intersect(Node::error("first"), Node::text("x")),
            Node::error("second"),
        );
        assert_eq!(tree.find_error().as_deref(), Some("first"));
    }

    #[test]
    fn find_error_reaches_right_side_of_exclude() {
        let tree = Node::exclude(
            Node::text("a"),
            Node::group(Node::text("b"), Node::error("deep")),
        );
        assert_eq!(tree.find_error().as_deref(), Some("deep"));
    }

    #[test]
    fn find_error_inside_subexpr() {
        let tree = Node::Subexpr {
            expr: Box::new(Node::error("inner")),
            key: DEFAULT_KEY.to_string(),
        };
        assert_eq!(tree.find_error().as_deref(), Some("inner"));
    }

    #[test]
    fn union_splices_trailing_group() {
        let nested = Node::group(Node::text("a"), Node::group(Node::text("b"), Node::text("c")));
        assert_eq!(
            nested,
            Node::Group(vec![Node::text("a"), Node::text("b"), Node::text("c")])
        );
        assert_eq!(Node::union(vec![Node::text("a")]), Node::text("a"));
        assert_eq!(Node::union(Vec::new()), Node::Empty);
    }

    #[test]
    fn leading_group_member_stays_nested() {
        let inner = Node::group(Node::text("a"), Node::text("b"));
        let outer = Node::group(inner.clone(), Node::text("c"));
        assert_eq!(outer, Node::Group(vec![inner, Node::text("c")]));
    }

    #[test]
    fn prefix_distributes_over_wide_group() {
        let members = (0..20_000).map(|i| Node::text(i.to_string())).collect();
        let merged = Node::text("host").merge(Node::union(members));
        let Node::Group(members) = merged else {
            panic!("expected a group");
        };
        assert_eq!(members.len(), 20_000);
        assert_eq!(members[19_999], Node::text("host19999"));
    }

    #[test]
    fn clean_tree_converts() {
        let tree = Node::group(Node::text("a"), Node::cluster_lookup("web", "ROLE"));
        let expr = Expr::try_from(tree).unwrap();
        assert_eq!(expr.to_string(), "{a,%web:ROLE}");
    }

    #[test]
    fn display_operators() {
        let expr = Expr::try_from(Node::intersect(
            Node::GroupLookup("all".into()),
            Node::exclude(Node::Match("web".into()), Node::LocalClusterLookup("DOWN".into())),
        ))
        .unwrap();
        assert_eq!(expr.to_string(), "<@all & </web/ - $DOWN>>");
    }
}
