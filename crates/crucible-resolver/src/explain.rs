//! Converts a failed base-solver run into spec.md's dose3-flavored
//! two-part conflict report: a bullet list of `Conflict`/`Missing`
//! facts, then a bullet list of dependency chains rendered as
//! `a <- b <- c`, built by walking `pubgrub`'s own `DerivationTree`
//! rather than using its bundled `DefaultStringReporter` (grounded in
//! `pubgrub::report::{DerivationTree, External, Derived}`, read in full
//! from the base solver's own source).

use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use pubgrub::report::{DerivationTree, External};
use pubgrub::Range;

use crate::encode::EncodedVersion;
use crate::solver::{PPkg, ROOT_NAME};

/// A string computed only when rendered. Wraps the formatting closure so
/// `ResolveError::Conflict` can be constructed and propagated freely
/// without paying for explanation text nobody asked to see (spec.md
/// §4.5, §7).
pub struct Lazy<T>(Arc<dyn Fn() -> T + Send + Sync>);

impl<T> Lazy<T> {
    pub fn new(f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn render(&self) -> T {
        (self.0)()
    }
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lazy(<unrendered>)")
    }
}

/// One link in a conflict explanation chain, in spec.md's own
/// vocabulary rather than pubgrub's internal `External`/`Derived` shape.
#[derive(Debug, Clone)]
pub enum Reason {
    /// The synthetic request root could not be satisfied directly.
    Root,
    /// No version of a package satisfies the constraint in play.
    Missing { package: String, constraint: String },
    /// A package directly conflicts with another.
    Conflict { a: String, b: String },
    /// `from` depends on something matching `to`, and that dependency
    /// is where the chain continues.
    Dependency { from: String, to: String },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Root => write!(f, "the request itself has no solution"),
            Reason::Missing { package, constraint } => {
                write!(f, "no version of {package} matches {constraint}")
            }
            Reason::Conflict { a, b } => write!(f, "{a} conflicts with {b}"),
            Reason::Dependency { from, to } => write!(f, "{from} requires {to}"),
        }
    }
}

/// Names recognized as synthetic, never shown to a user reading a
/// chain: the literal request sentinel (spec.md §9, "Synthetic request
/// vertex") and this crate's own virtual disjunction-clause packages
/// (`owner::depends#n` / `owner::depopt#n`, see `solver::PPkg::Clause`),
/// neither of which corresponds to a real package a human would
/// recognize.
pub fn is_synthetic_root(name: &str) -> bool {
    let trimmed = name.trim_start_matches('<').trim_end_matches('>');
    trimmed == ROOT_NAME || trimmed.starts_with("dummy")
}

fn is_synthetic_vertex(name: &str) -> bool {
    is_synthetic_root(name) || name.contains("::depends#") || name.contains("::depopt#")
}

/// Stateless — `PPkg` already renders its own human-readable name via
/// `Display`, so unlike an encoder working over bare integers this
/// explainer needs no table to decode anything.
pub struct ConflictExplainer;

impl ConflictExplainer {
    pub fn new() -> Self {
        Self
    }

    /// Walks `tree`, collecting every fact and dependency edge pubgrub's
    /// derivation recorded, and renders the two-part report lazily.
    pub fn explain(&self, tree: DerivationTree<PPkg, Range<EncodedVersion>>) -> Lazy<String> {
        let mut reasons = Vec::new();
        collect_all(&tree, &mut reasons);
        Lazy::new(move || render_report(&reasons))
    }
}

impl Default for ConflictExplainer {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_all(tree: &DerivationTree<PPkg, Range<EncodedVersion>>, out: &mut Vec<Reason>) {
    match tree {
        DerivationTree::External(ext) => out.push(external_to_reason(ext)),
        DerivationTree::Derived(derived) => {
            collect_all(&derived.cause1, out);
            collect_all(&derived.cause2, out);
        }
    }
}

fn external_to_reason(ext: &External<PPkg, Range<EncodedVersion>>) -> Reason {
    match ext {
        External::NotRoot(_, _) => Reason::Root,
        External::NoVersions(pkg, range) => Reason::Missing {
            package: pkg.to_string(),
            constraint: format!("{range:?}"),
        },
        External::Unavailable(pkg, range, reason) => Reason::Missing {
            package: pkg.to_string(),
            constraint: format!("{range:?} ({reason})"),
        },
        External::FromDependencyOf(from, _, to, _) => Reason::Dependency {
            from: from.to_string(),
            to: to.to_string(),
        },
    }
}

/// Builds spec.md §4.5's two-part report: a bullet list of
/// `Conflict`/`Missing` facts, then a bullet list of root-to-leaf
/// dependency chains (`a <- b <- c`), with single-element chains and
/// synthetic vertices dropped.
fn render_report(reasons: &[Reason]) -> String {
    let facts: Vec<&Reason> = reasons
        .iter()
        .filter(|r| !matches!(r, Reason::Dependency { .. }))
        .collect();

    let mut out = String::new();
    if facts.is_empty() {
        out.push_str("- no resolution satisfies the request\n");
    } else {
        for fact in &facts {
            out.push_str(&format!("- {fact}\n"));
        }
    }

    let chains = dependency_chains(reasons);
    if !chains.is_empty() {
        out.push('\n');
        for chain in &chains {
            out.push_str(&format!("- {}\n", chain.join(" <- ")));
        }
    }

    out.trim_end().to_string()
}

/// Turns the flat `Dependency` facts into a `parent -> children`
/// multimap, finds the synthetic root, and unrolls every root-to-leaf
/// path through it — spec.md §4.5's "chains" — dropping single-element
/// chains and filtering synthetic vertices (the request root and this
/// crate's virtual clause packages) from the displayed names.
fn dependency_chains(reasons: &[Reason]) -> Vec<Vec<String>> {
    let mut children: AHashMap<String, Vec<String>> = AHashMap::new();
    let mut all_children: AHashSet<String> = AHashSet::new();
    let mut all_parents: AHashSet<String> = AHashSet::new();

    for reason in reasons {
        if let Reason::Dependency { from, to } = reason {
            let bucket = children.entry(from.clone()).or_default();
            if !bucket.contains(to) {
                bucket.push(to.clone());
            }
            all_parents.insert(from.clone());
            all_children.insert(to.clone());
        }
    }

    let Some(root) = all_parents
        .iter()
        .find(|p| is_synthetic_root(p))
        .or_else(|| all_parents.iter().find(|p| !all_children.contains(*p)))
        .cloned()
    else {
        return Vec::new();
    };

    let mut chains = Vec::new();
    let mut stack: Vec<Vec<String>> = vec![vec![root]];
    let mut visited_paths = 0usize;
    // Bound the walk generously but finitely: a malformed cyclic
    // multimap (which a sound derivation tree should never produce)
    // would otherwise loop forever.
    const MAX_PATHS: usize = 10_000;

    while let Some(path) = stack.pop() {
        visited_paths += 1;
        if visited_paths > MAX_PATHS {
            break;
        }
        let last = path.last().expect("path always has at least the root");
        match children.get(last) {
            Some(kids) if !kids.is_empty() => {
                for kid in kids {
                    if path.contains(kid) {
                        continue; // guards against a cyclic multimap
                    }
                    let mut next = path.clone();
                    next.push(kid.clone());
                    stack.push(next);
                }
            }
            _ => {
                let visible: Vec<String> = path.into_iter().filter(|n| !is_synthetic_vertex(n)).collect();
                if visible.len() > 1 && !chains.contains(&visible) {
                    chains.push(visible);
                }
            }
        }
    }

    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_defers_until_rendered() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let lazy = Lazy::new(move || {
            flag.store(true, Ordering::SeqCst);
            "rendered".to_string()
        });
        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(lazy.render(), "rendered");
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn recognizes_synthetic_root_names() {
        assert!(is_synthetic_root("dose-dummy-request"));
        assert!(is_synthetic_root("<dose-dummy-request>"));
        assert!(is_synthetic_root("dummy-anything"));
        assert!(!is_synthetic_root("libfoo"));
    }

    #[test]
    fn report_separates_facts_from_chains() {
        let reasons = vec![
            Reason::Dependency {
                from: "<dose-dummy-request>".into(),
                to: "a".into(),
            },
            Reason::Dependency {
                from: "a".into(),
                to: "b".into(),
            },
            Reason::Missing {
                package: "b".into(),
                constraint: ">=2.0".into(),
            },
        ];
        let rendered = render_report(&reasons);
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("- no version of b matches >=2.0"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("- a <- b"));
    }

    #[test]
    fn single_element_chains_are_dropped() {
        let reasons = vec![Reason::Dependency {
            from: "<dose-dummy-request>".into(),
            to: "a".into(),
        }];
        assert!(dependency_chains(&reasons).is_empty());
    }

    #[test]
    fn clause_vertices_are_filtered_from_chain_display() {
        let reasons = vec![
            Reason::Dependency {
                from: "<dose-dummy-request>".into(),
                to: "a".into(),
            },
            Reason::Dependency {
                from: "a".into(),
                to: "a::depends#0".into(),
            },
            Reason::Dependency {
                from: "a::depends#0".into(),
                to: "b".into(),
            },
        ];
        let chains = dependency_chains(&reasons);
        assert_eq!(chains, vec![vec!["a".to_string(), "b".to_string()]]);
    }
}
