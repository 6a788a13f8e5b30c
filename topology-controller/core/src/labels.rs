use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

/// An immutable, cheaply-clonable label set.
#[derive(Clone, Debug, Eq, Default, Serialize, Deserialize)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

/// Selects workloads by label, as NetworkPolicies and Services do.
#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    match_labels: Option<Map>,
    match_expressions: Option<Vec<Expression>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Expression {
    pub key: String,
    pub operator: Operator,
    #[serde(default)]
    pub values: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

// === impl Selector ===

impl Selector {
    pub fn new(match_labels: Option<Map>, match_expressions: Option<Vec<Expression>>) -> Self {
        Self {
            match_labels,
            match_expressions,
        }
    }

    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: Some(map),
            match_expressions: None,
        }
    }

    pub fn from_expressions(exprs: Vec<Expression>) -> Self {
        Self {
            match_labels: None,
            match_expressions: Some(exprs),
        }
    }

    /// An empty selector matches every workload; policy coverage checks must
    /// distinguish it from a selector that names labels.
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().map_or(true, |m| m.is_empty())
            && self
                .match_expressions
                .as_ref()
                .map_or(true, |e| e.is_empty())
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        for expr in self.match_expressions.iter().flatten() {
            if !expr.matches(labels.as_ref()) {
                return false;
            }
        }

        if let Some(match_labels) = self.match_labels.as_ref() {
            for (k, v) in match_labels.iter() {
                if labels.0.get(k) != Some(v) {
                    return false;
                }
            }
        }

        true
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

// === impl Labels ===

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.unwrap_or_default().into()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

// === impl Expression ===

impl Expression {
    fn matches(&self, labels: &Map) -> bool {
        match self.operator {
            Operator::In => labels
                .get(&self.key)
                .map_or(false, |v| self.values.contains(v)),
            Operator::NotIn => labels
                .get(&self.key)
                .map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    fn expr(key: &str, operator: Operator, values: &[&str]) -> Expression {
        Expression {
            key: key.to_string(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn selector_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::default(), Labels::default(), true, "empty"),
            (
                Selector::from_iter(Some(("app", "web"))),
                Labels::from_iter(Some(("app", "web"))),
                true,
                "exact",
            ),
            (
                Selector::from_iter(Some(("app", "web"))),
                Labels::from_iter(vec![("app", "web"), ("tier", "front")]),
                true,
                "subset",
            ),
            (
                Selector::from_iter(Some(("app", "web"))),
                Labels::from_iter(Some(("app", "api"))),
                false,
                "mismatch",
            ),
            (
                Selector::from_expressions(vec![expr("app", Operator::In, &["web", "api"])]),
                Labels::from_iter(Some(("app", "api"))),
                true,
                "in",
            ),
            (
                Selector::from_expressions(vec![expr("app", Operator::NotIn, &["web"])]),
                Labels::from_iter(Some(("app", "web"))),
                false,
                "not-in",
            ),
            (
                Selector::from_expressions(vec![expr("tier", Operator::Exists, &[])]),
                Labels::from_iter(Some(("app", "web"))),
                false,
                "exists",
            ),
            (
                Selector::from_expressions(vec![expr("tier", Operator::DoesNotExist, &[])]),
                Labels::from_iter(Some(("app", "web"))),
                true,
                "does-not-exist",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn empty_selector_is_flagged() {
        assert!(Selector::default().is_empty());
        assert!(!Selector::from_iter(Some(("app", "web"))).is_empty());
    }
}
