use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

/// key -> ordered range expressions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cluster {
    entries: HashMap<String, Vec<String>>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the values stored under `key`.
    pub fn insert<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .insert(key.to_string(), values.into_iter().map(Into::into).collect());
    }

    /// Append one value under `key`, keeping declaration order.
    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .push(value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V, S> FromIterator<(K, V)> for Cluster
where
    K: Into<String>,
    V: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
            .collect();
        Self { entries }
    }
}

/// Clusters plus the groups table.
///
/// Not synchronized: wrap it in a [`SharedState`] (or publish clones) when
/// evaluations run concurrently with updates.
#[derive(Debug, Clone, Default)]
pub struct State {
    clusters: HashMap<String, Cluster>,
    groups: Cluster,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite a cluster.
    pub fn register_cluster(&mut self, name: &str, cluster: Cluster) {
        log::debug!("registering cluster '{name}' with {} keys", cluster.len());
        self.clusters.insert(name.to_string(), cluster);
    }

    /// Overwrite the groups table.
    pub fn set_groups(&mut self, groups: Cluster) {
        log::debug!("replacing groups table ({} groups)", groups.len());
        self.groups = groups;
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name)
    }

    pub fn clusters(&self) -> impl Iterator<Item = (&str, &Cluster)> {
        self.clusters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn groups(&self) -> &Cluster {
        &self.groups
    }
}

/// Shared handle: updates take the write lock, evaluations the read lock.
pub type SharedState = Arc<RwLock<State>>;

pub fn shared(state: State) -> SharedState {
    Arc::new(RwLock::new(state))
}
