//! Variable declarations and the layered per-invocation [`ConfigSet`].
//!
//! Layers, lowest priority first: [`Source::Default`], [`Source::Environment`],
//! [`Source::Override`]. Default expressions are evaluated in dependency
//! order; an expression referencing a missing variable stays unresolved and
//! reports the root missing names rather than itself.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::template::Template;

/// Declaration of one variable a stack's templates may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    #[serde(default)]
    pub required: bool,
    /// Template evaluated against other variables when no value is supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Template>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableSpec {
    /// Optional, no default. Renders as the empty string when unset.
    pub fn optional() -> Self {
        Self::default()
    }

    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn defaulted(expr: impl Into<Template>) -> Self {
        Self {
            default: Some(expr.into()),
            ..Self::default()
        }
    }

    /// Variables referenced by the default expression.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.default
            .iter()
            .flat_map(|d| d.placeholders().into_iter())
    }
}

/// Layer a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Default,
    Environment,
    Override,
}

/// A declared variable together with its explicitly supplied value, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    pub spec: VariableSpec,
    pub value: Option<String>,
    /// Layer of `value`; [`Source::Default`] when no value was supplied.
    pub source: Source,
}

impl ConfigValue {
    /// A value from `source` replaces the current one unless the current
    /// one came from a higher layer.
    fn accepts(&self, source: Source) -> bool {
        self.value.is_none() || self.source <= source
    }
}

/// Invocation-local mapping from variable name to [`ConfigValue`].
///
/// # Examples
///
/// ```
/// use dockerize_core::{ConfigSet, VariableSpec};
/// use std::collections::BTreeMap;
///
/// let mut decls = BTreeMap::new();
/// decls.insert("COOLIFY_FQDN".to_owned(), VariableSpec::required());
/// decls.insert("APP_URL".to_owned(), VariableSpec::defaulted("https://${COOLIFY_FQDN}"));
///
/// let config = ConfigSet::from_declarations(&decls)
///     .with_environment([("COOLIFY_FQDN", "app.example.com")]);
/// let values = config.evaluate();
/// assert_eq!(values.value("APP_URL"), Some("https://app.example.com"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSet {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_declarations(decls: &BTreeMap<String, VariableSpec>) -> Self {
        let entries = decls
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    ConfigValue {
                        spec: spec.clone(),
                        value: None,
                        source: Source::Default,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Built-in default values. Only declared names are taken.
    pub fn with_defaults<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.layer_declared(values, Source::Default)
    }

    /// Environment snapshot. Only declared names are taken; the rest of the
    /// environment is ignored.
    pub fn with_environment<I, K, V>(self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.layer_declared(env, Source::Environment)
    }

    /// Explicit overrides. Undeclared names are kept as optional entries so
    /// they stay visible, but no template references them.
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in overrides {
            let name = name.as_ref();
            if !self.entries.contains_key(name) {
                tracing::warn!(variable = name, "override does not match a declared variable");
            }
            self.set(name, value, Source::Override);
        }
        self
    }

    fn layer_declared<I, K, V>(mut self, values: I, source: Source) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in values {
            if let Some(entry) = self.entries.get_mut(name.as_ref())
                && entry.accepts(source)
            {
                entry.value = Some(value.into());
                entry.source = source;
            }
        }
        self
    }

    /// Set `name` from `source`, unless a higher layer already supplied it.
    pub fn set(&mut self, name: &str, value: impl Into<String>, source: Source) {
        let entry = self
            .entries
            .entry(name.to_owned())
            .or_insert_with(|| ConfigValue {
                spec: VariableSpec::optional(),
                value: None,
                source: Source::Default,
            });
        if entry.accepts(source) {
            entry.value = Some(value.into());
            entry.source = source;
        }
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the final value of every entry.
    ///
    /// Supplied values win over defaults, so a supplied variable never
    /// depends on anything. A cycle among unsupplied defaults leaves its
    /// members unresolved.
    pub fn evaluate(&self) -> Evaluation {
        let graph = self.entries.iter().map(|(name, cv)| {
            let refs: Vec<&str> = if cv.value.is_some() {
                Vec::new()
            } else {
                cv.spec.references().collect()
            };
            (name.as_str(), refs)
        });
        let order = default_order(graph);

        let mut values: BTreeMap<String, Resolved> = BTreeMap::new();
        for name in &order.ordered {
            let Some(cv) = self.entries.get(name) else { continue };
            let resolved = evaluate_one(name, cv, &values);
            values.insert(name.clone(), resolved);
        }
        for name in &order.stuck {
            let resolved = match self.entries.get(name).and_then(|cv| cv.value.clone()) {
                Some(v) => Resolved::Value(v),
                None => Resolved::Missing(BTreeSet::from([name.clone()])),
            };
            values.insert(name.clone(), resolved);
        }

        tracing::debug!(
            variables = values.len(),
            unresolved = values.values().filter(|r| r.is_missing()).count(),
            "config set evaluated"
        );
        Evaluation { values }
    }
}

fn evaluate_one(name: &str, cv: &ConfigValue, done: &BTreeMap<String, Resolved>) -> Resolved {
    if let Some(value) = &cv.value {
        return Resolved::Value(value.clone());
    }
    match &cv.spec.default {
        Some(expr) => {
            let mut roots = BTreeSet::new();
            let rendered = expr.render(|reference| match done.get(reference) {
                Some(Resolved::Value(v)) => Some(v.as_str()),
                Some(Resolved::Missing(missing)) => {
                    roots.extend(missing.iter().cloned());
                    None
                }
                None => {
                    roots.insert(reference.to_owned());
                    None
                }
            });
            if roots.is_empty() {
                Resolved::Value(rendered.text)
            } else {
                Resolved::Missing(roots)
            }
        }
        None if cv.spec.required => Resolved::Missing(BTreeSet::from([name.to_owned()])),
        None => Resolved::Value(String::new()),
    }
}

/// Final state of one variable after evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Value(String),
    /// Blocked on these required variables that have no value.
    Missing(BTreeSet<String>),
}

impl Resolved {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

/// Result of [`ConfigSet::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    values: BTreeMap<String, Resolved>,
}

impl Evaluation {
    pub fn get(&self, name: &str) -> Option<&Resolved> {
        self.values.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(Resolved::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolved)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Topological order over default-expression references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultOrder {
    /// Every node whose dependencies could be ordered, dependencies first.
    pub ordered: Vec<String>,
    /// Nodes on or downstream of a cycle, sorted.
    pub stuck: Vec<String>,
}

/// Kahn's algorithm with a name-ordered ready set, so the output depends
/// only on the graph. References to unknown nodes are ignored here.
pub(crate) fn default_order<'a, I, R>(nodes: I) -> DefaultOrder
where
    I: IntoIterator<Item = (&'a str, R)>,
    R: IntoIterator<Item = &'a str>,
{
    let deps: BTreeMap<&str, BTreeSet<&str>> = nodes
        .into_iter()
        .map(|(name, refs)| (name, refs.into_iter().collect()))
        .collect();

    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, refs) in &deps {
        let known: Vec<&str> = refs
            .iter()
            .copied()
            .filter(|r| deps.contains_key(r))
            .collect();
        pending.insert(*name, known.len());
        for r in known {
            dependents.entry(r).or_default().push(*name);
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut ordered = Vec::with_capacity(deps.len());

    while let Some(name) = ready.pop_first() {
        ordered.push(name.to_owned());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    let done: BTreeSet<&str> = ordered.iter().map(String::as_str).collect();
    let stuck = deps
        .keys()
        .filter(|name| !done.contains(*name))
        .map(|name| (*name).to_owned())
        .collect();

    DefaultOrder { ordered, stuck }
}

/// Extract one concrete cycle from the stuck nodes of a [`DefaultOrder`],
/// as a path that starts and ends on the same name.
pub(crate) fn find_cycle(
    stuck: &[String],
    references: impl Fn(&str) -> Vec<String>,
) -> Option<Vec<String>> {
    let stuck_set: BTreeSet<&str> = stuck.iter().map(String::as_str).collect();
    let mut path: Vec<String> = Vec::new();
    let mut current = stuck.first()?.clone();

    loop {
        if let Some(pos) = path.iter().position(|n| *n == current) {
            let mut cycle = path.split_off(pos);
            cycle.push(current);
            return Some(cycle);
        }
        path.push(current.clone());
        current = references(&current)
            .into_iter()
            .find(|r| stuck_set.contains(r.as_str()))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls(entries: &[(&str, VariableSpec)]) -> BTreeMap<String, VariableSpec> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    // ── layering ──

    #[test]
    fn layers_apply_in_increasing_priority() {
        let config = ConfigSet::from_declarations(&decls(&[("PORT", VariableSpec::optional())]))
            .with_defaults([("PORT", "3000")])
            .with_environment([("PORT", "4000")])
            .with_overrides([("PORT", "5000")]);
        let entry = config.get("PORT").unwrap();
        assert_eq!(entry.value.as_deref(), Some("5000"));
        assert_eq!(entry.source, Source::Override);
    }

    #[test]
    fn lower_layer_set_does_not_clobber_override() {
        let mut config = ConfigSet::from_declarations(&decls(&[("PORT", VariableSpec::optional())]))
            .with_overrides([("PORT", "5000")]);
        config.set("PORT", "4000", Source::Environment);
        assert_eq!(config.get("PORT").unwrap().value.as_deref(), Some("5000"));
    }

    #[test]
    fn environment_ignores_undeclared_names() {
        let config = ConfigSet::from_declarations(&decls(&[("DATABASE_URL", VariableSpec::required())]))
            .with_environment([("HOME", "/root"), ("DATABASE_URL", "postgres://h/db")]);
        assert!(!config.contains("HOME"));
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn overrides_keep_undeclared_names() {
        let config = ConfigSet::new().with_overrides([("EXTRA", "1")]);
        let entry = config.get("EXTRA").unwrap();
        assert!(!entry.spec.required);
        assert_eq!(entry.source, Source::Override);
    }

    // ── evaluation ──

    #[test]
    fn default_expression_references_supplied_value() {
        let config = ConfigSet::from_declarations(&decls(&[
            ("COOLIFY_FQDN", VariableSpec::required()),
            ("APP_URL", VariableSpec::defaulted("https://${COOLIFY_FQDN}")),
        ]))
        .with_environment([("COOLIFY_FQDN", "app.example.com")]);

        let eval = config.evaluate();
        assert_eq!(eval.value("APP_URL"), Some("https://app.example.com"));
    }

    #[test]
    fn explicit_value_beats_default_expression() {
        let config = ConfigSet::from_declarations(&decls(&[
            ("COOLIFY_FQDN", VariableSpec::required()),
            ("APP_URL", VariableSpec::defaulted("https://${COOLIFY_FQDN}")),
        ]))
        .with_overrides([("APP_URL", "http://localhost")]);

        let eval = config.evaluate();
        assert_eq!(eval.value("APP_URL"), Some("http://localhost"));
        assert_eq!(
            eval.get("COOLIFY_FQDN"),
            Some(&Resolved::Missing(BTreeSet::from(["COOLIFY_FQDN".to_owned()])))
        );
    }

    #[test]
    fn blocked_default_reports_root_missing_names() {
        let config = ConfigSet::from_declarations(&decls(&[
            ("COOLIFY_FQDN", VariableSpec::required()),
            ("APP_URL", VariableSpec::defaulted("https://${COOLIFY_FQDN}")),
            ("CALLBACK_URL", VariableSpec::defaulted("${APP_URL}/auth/callback")),
        ]));

        let eval = config.evaluate();
        assert_eq!(
            eval.get("CALLBACK_URL"),
            Some(&Resolved::Missing(BTreeSet::from(["COOLIFY_FQDN".to_owned()])))
        );
    }

    #[test]
    fn optional_without_default_is_empty() {
        let config = ConfigSet::from_declarations(&decls(&[
            ("SENTRY_DSN", VariableSpec::optional()),
            ("FLAGS", VariableSpec::defaulted("dsn=${SENTRY_DSN}")),
        ]));
        let eval = config.evaluate();
        assert_eq!(eval.value("SENTRY_DSN"), Some(""));
        assert_eq!(eval.value("FLAGS"), Some("dsn="));
    }

    #[test]
    fn reference_to_undeclared_variable_fails_closed() {
        let config = ConfigSet::from_declarations(&decls(&[(
            "APP_URL",
            VariableSpec::defaulted("https://${NOWHERE}"),
        )]));
        let eval = config.evaluate();
        assert_eq!(
            eval.get("APP_URL"),
            Some(&Resolved::Missing(BTreeSet::from(["NOWHERE".to_owned()])))
        );
    }

    #[test]
    fn cycle_without_values_stays_unresolved() {
        let config = ConfigSet::from_declarations(&decls(&[
            ("A", VariableSpec::defaulted("${B}")),
            ("B", VariableSpec::defaulted("${A}")),
        ]));
        let eval = config.evaluate();
        assert!(eval.get("A").unwrap().is_missing());
        assert!(eval.get("B").unwrap().is_missing());
    }

    #[test]
    fn supplied_value_breaks_cycle() {
        let config = ConfigSet::from_declarations(&decls(&[
            ("A", VariableSpec::defaulted("${B}")),
            ("B", VariableSpec::defaulted("${A}")),
        ]))
        .with_overrides([("A", "x")]);
        let eval = config.evaluate();
        assert_eq!(eval.value("A"), Some("x"));
        assert_eq!(eval.value("B"), Some("x"));
    }

    // ── ordering ──

    #[test]
    fn default_order_puts_dependencies_first() {
        let order = default_order([
            ("C", vec!["B"]),
            ("B", vec!["A"]),
            ("A", vec![]),
            ("D", vec![]),
        ]);
        assert_eq!(order.ordered, vec!["A", "B", "C", "D"]);
        assert!(order.stuck.is_empty());
    }

    #[test]
    fn default_order_reports_stuck_nodes() {
        let order = default_order([
            ("A", vec!["B"]),
            ("B", vec!["A"]),
            ("C", vec!["A"]),
            ("D", vec![]),
        ]);
        assert_eq!(order.ordered, vec!["D"]);
        assert_eq!(order.stuck, vec!["A", "B", "C"]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let order = default_order([("A", vec!["A"])]);
        assert_eq!(order.stuck, vec!["A"]);
        let cycle = find_cycle(&order.stuck, |_| vec!["A".to_owned()]).unwrap();
        assert_eq!(cycle, vec!["A", "A"]);
    }

    #[test]
    fn find_cycle_skips_downstream_nodes() {
        let refs = |name: &str| -> Vec<String> {
            match name {
                "A" => vec!["B".to_owned()],
                "B" => vec!["C".to_owned()],
                "C" => vec!["B".to_owned()],
                _ => vec![],
            }
        };
        let stuck = vec!["A".to_owned(), "B".to_owned(), "C".to_owned()];
        assert_eq!(find_cycle(&stuck, refs).unwrap(), vec!["B", "C", "B"]);
    }
}
