use std::{collections::HashSet, fmt, str::FromStr};

use crate::{
    error::{RangeError, Result},
    node::{Expr, KEYS},
    parse::parse_str,
    state::State,
};

/// Environment variable read by [`EvalConfig::from_env`].
pub const MAX_DEPTH_ENV: &str = "SQLRANGE_MAX_DEPTH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalConfig {
    /// Deepest allowed nesting of stored expressions. `None` never stops,
    /// so a self-referencing cluster or group recurses without bound.
    pub max_depth: Option<usize>,
}

impl EvalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Config from `SQLRANGE_MAX_DEPTH`. Unset or invalid leaves depth unbounded.
    pub fn from_env() -> Self {
        let raw = std::env::var(MAX_DEPTH_ENV).ok();
        Self {
            max_depth: parse_max_depth(raw.as_deref()),
        }
    }
}

fn parse_max_depth(raw: Option<&str>) -> Option<usize> {
    let raw = raw?;
    match raw.trim().parse::<usize>() {
        Ok(depth) if depth > 0 => Some(depth),
        _ => {
            log::warn!("ignoring invalid {MAX_DEPTH_ENV}={raw}");
            None
        }
    }
}

/// Per-call evaluation scope, passed by value down the tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    /// Cluster whose stored value is being expanded; resolves `$key`.
    pub cluster: Option<&'a str>,
    /// Left side of the enclosing `&` / `-`; scopes `/match/`.
    pub current: Option<&'a [String]>,
    depth: usize,
}

impl<'a> EvalContext<'a> {
    fn scoped(self, current: &'a [String]) -> Self {
        Self {
            current: Some(current),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SetOp {
    Intersect,
    Exclude,
}

/// Accumulates values once each, in first-seen order.
#[derive(Default)]
struct Unique {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl Unique {
    fn extend(&mut self, values: Vec<String>) {
        for value in values {
            if self.seen.insert(value.clone()) {
                self.items.push(value);
            }
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

pub struct Evaluator<'s> {
    state: &'s State,
    config: EvalConfig,
}

impl<'s> Evaluator<'s> {
    pub fn new(state: &'s State) -> Self {
        Self::with_config(state, EvalConfig::default())
    }

    pub fn with_config(state: &'s State, config: EvalConfig) -> Self {
        Self { state, config }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Vec<String>> {
        self.visit(expr, EvalContext::default())
    }

    fn visit(&self, expr: &Expr, ctx: EvalContext<'_>) -> Result<Vec<String>> {
        match expr {
            Expr::Empty => Ok(Vec::new()),
            Expr::Text(text) => Ok(vec![text.clone()]),
            Expr::ClusterLookup { name, key } => self.cluster_lookup(name, key, ctx.depth),
            Expr::LocalClusterLookup(key) => match ctx.cluster {
                Some(cluster) => self.cluster_lookup(cluster, key, ctx.depth),
                None => self.group_lookup(key, ctx.depth),
            },
            Expr::GroupLookup(name) => self.group_lookup(name, ctx.depth),
            Expr::Subexpr { expr, key } => {
                let names = self.visit(expr, ctx)?;
                let mut unique = Unique::default();
                for name in &names {
                    unique.extend(self.cluster_lookup(name, key, ctx.depth)?);
                }
                Ok(unique.into_vec())
            }
            Expr::Group(members) => {
                let mut result = Vec::new();
                for member in members {
                    result.extend(self.visit(member, ctx)?);
                }
                Ok(result)
            }
            Expr::Intersect(left, right) => self.set_op(SetOp::Intersect, left, right, ctx),
            Expr::Exclude(left, right) => self.set_op(SetOp::Exclude, left, right, ctx),
            Expr::Has { key, value } => Ok(self
                .state
                .clusters()
                .filter(|(_, cluster)| {
                    cluster
                        .get(key)
                        .is_some_and(|values| values.iter().any(|v| v == value))
                })
                .map(|(name, _)| name.to_string())
                .collect()),
            Expr::Match(pattern) => {
                let candidates = match ctx.current {
                    Some(current) => current.to_vec(),
                    None => self.universe(ctx.depth)?,
                };
                Ok(candidates
                    .into_iter()
                    .filter(|value| value.contains(pattern.as_str()))
                    .collect())
            }
        }
    }

    fn set_op(
        &self,
        op: SetOp,
        left: &Expr,
        right: &Expr,
        ctx: EvalContext<'_>,
    ) -> Result<Vec<String>> {
        let left = self.visit(left, ctx)?;
        // the right side is never evaluated against an empty left
        if left.is_empty() {
            return Ok(left);
        }

        let right: HashSet<String> = self.visit(right, ctx.scoped(&left))?.into_iter().collect();
        let keep = matches!(op, SetOp::Intersect);

        Ok(left
            .iter()
            .filter(|value| right.contains(*value) == keep)
            .cloned()
            .collect())
    }

    /// Parse and evaluate a range expression stored in a table. Stored
    /// expressions that fail to parse contribute nothing.
    fn expand(&self, source: &str, cluster: Option<&str>, depth: usize) -> Result<Vec<String>> {
        let depth = depth + 1;
        if let Some(max) = self.config.max_depth {
            if depth > max {
                return Err(RangeError::DepthExceeded(max));
            }
        }

        let expr = match Expr::try_from(parse_str(source)) {
            Ok(expr) => expr,
            Err(message) => {
                log::debug!("ignoring stored expression '{source}': {message}");
                return Ok(Vec::new());
            }
        };

        self.visit(
            &expr,
            EvalContext {
                cluster,
                current: None,
                depth,
            },
        )
    }

    fn cluster_lookup(&self, name: &str, key: &str, depth: usize) -> Result<Vec<String>> {
        let Some(cluster) = self.state.cluster(name) else {
            return Ok(Vec::new());
        };

        if key == KEYS {
            return Ok(cluster.keys().map(str::to_string).collect());
        }

        let mut result = Vec::new();
        for value in cluster.get(key).unwrap_or_default() {
            result.extend(self.expand(value, Some(name), depth)?);
        }
        Ok(result)
    }

    fn group_lookup(&self, name: &str, depth: usize) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for value in self.state.groups().get(name).unwrap_or_default() {
            result.extend(self.expand(value, None, depth)?);
        }
        Ok(result)
    }

    /// Every value reachable from the groups table. Recomputed on each call.
    fn universe(&self, depth: usize) -> Result<Vec<String>> {
        let mut unique = Unique::default();
        for (_, values) in self.state.groups().iter() {
            for value in values {
                unique.extend(self.expand(value, None, depth)?);
            }
        }
        Ok(unique.into_vec())
    }
}

/// A parsed query with no parse errors anywhere in its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    expr: Expr,
}

impl Query {
    pub fn parse(input: &str) -> Result<Self> {
        Expr::try_from(parse_str(input))
            .map(|expr| Self { expr })
            .map_err(RangeError::Parse)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, state: &State) -> Result<Vec<String>> {
        Evaluator::new(state).evaluate(&self.expr)
    }

    pub fn evaluate_with(&self, state: &State, config: EvalConfig) -> Result<Vec<String>> {
        Evaluator::with_config(state, config).evaluate(&self.expr)
    }
}

impl FromStr for Query {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

pub fn eval_range(query: &str, state: &State) -> Result<Vec<String>> {
    Query::parse(query)?.evaluate(state)
}

pub fn eval_range_with(query: &str, state: &State, config: EvalConfig) -> Result<Vec<String>> {
    Query::parse(query)?.evaluate_with(state, config)
}
