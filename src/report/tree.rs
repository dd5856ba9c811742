//! Dependency provenance: which top-level packages pulled in a vulnerable one
//!
//! Dependency data comes from lockfiles and may contain cycles, so every
//! walk tracks the nodes on the current path and never re-enters one. The
//! same node may still appear on several distinct paths.

use crate::report::summary::{summarize, SeverityCount};
use crate::types::{Package, ScanResult, Severity};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Most ancestor nodes drawn below one vulnerable package
const MAX_ORIGIN_NODES: usize = 256;

/// Child package ID -> IDs of the packages that depend on it directly
pub type ParentMap = BTreeMap<String, Vec<String>>;

/// Invert the `DependsOn` edges of a package list
///
/// Parents are kept in first-seen order with duplicates removed.
pub fn reverse_deps(packages: &[Package]) -> ParentMap {
    let mut parents = ParentMap::new();
    for pkg in packages {
        for child in &pkg.depends_on {
            let entry = parents.entry(child.clone()).or_default();
            if !entry.contains(&pkg.id) {
                entry.push(pkg.id.clone());
            }
        }
    }
    parents
}

/// Every ancestor chain of `pkg_id`, nearest parent first
///
/// A chain ends at a package nobody depends on, or at a package whose
/// parents are all already on the chain.
pub fn ancestor_paths(pkg_id: &str, parents: &ParentMap) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    let mut path = Vec::new();
    let mut on_path = HashSet::from([pkg_id.to_string()]);
    walk(pkg_id, parents, &mut path, &mut on_path, &mut paths);
    paths
}

fn walk(
    id: &str,
    parents: &ParentMap,
    path: &mut Vec<String>,
    on_path: &mut HashSet<String>,
    paths: &mut Vec<Vec<String>>,
) {
    let next: Vec<&String> = parents
        .get(id)
        .map(|ps| ps.iter().filter(|p| !on_path.contains(*p)).collect())
        .unwrap_or_default();

    if next.is_empty() {
        if !path.is_empty() {
            paths.push(path.clone());
        }
        return;
    }

    for parent in next {
        path.push(parent.clone());
        on_path.insert(parent.clone());
        walk(parent, parents, path, on_path, paths);
        on_path.remove(parent);
        path.pop();
    }
}

/// A labelled tree rendered with box-drawing branches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Append a child and return it for further nesting
    pub fn add_branch(&mut self, label: impl Into<String>) -> &mut TreeNode {
        self.children.push(TreeNode::new(label));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    fn render_children(&self, f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
        let count = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let (branch, indent) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };

            // Multi-line labels keep their continuation lines under the branch
            let mut lines = child.label.lines();
            writeln!(f, "{}{}{}", prefix, branch, lines.next().unwrap_or(""))?;
            for line in lines {
                writeln!(f, "{}{}{}", prefix, indent, line)?;
            }

            child.render_children(f, &format!("{}{}", prefix, indent))?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.label)?;
        self.render_children(f, "")
    }
}

/// Attach the parents of `id` below `node`, skipping nodes already on the
/// path from the vulnerable package
///
/// `budget` bounds the nodes drawn; once spent, the remaining parents of a
/// node collapse into a single "more" leaf.
fn add_parents(
    node: &mut TreeNode,
    id: &str,
    parents: &ParentMap,
    on_path: &mut HashSet<String>,
    budget: &mut usize,
) {
    let Some(direct) = parents.get(id) else {
        return;
    };
    let next: Vec<&String> = direct.iter().filter(|p| !on_path.contains(*p)).collect();
    for (i, parent) in next.iter().enumerate() {
        if *budget == 0 {
            node.add_branch(format!("... {} more parent(s) omitted", next.len() - i));
            return;
        }
        *budget -= 1;
        let branch = node.add_branch((*parent).clone());
        on_path.insert((*parent).clone());
        add_parents(branch, parent, parents, on_path, budget);
        on_path.remove(*parent);
    }
}

/// Build the "Dependency Origin Tree" for one result
///
/// Returns `None` when the result carries no dependency edges. Each
/// vulnerable package appears once, labelled with the severity tally of
/// all its vulnerabilities.
pub fn origin_tree(
    result: &ScanResult,
    allowed: &[Severity],
    highlight: impl Fn(&str) -> String,
) -> Option<TreeNode> {
    build_origin_tree(result, allowed, MAX_ORIGIN_NODES, highlight)
}

fn build_origin_tree(
    result: &ScanResult,
    allowed: &[Severity],
    max_nodes: usize,
    highlight: impl Fn(&str) -> String,
) -> Option<TreeNode> {
    let parents = reverse_deps(&result.packages);
    if parents.is_empty() {
        return None;
    }

    let mut per_package: BTreeMap<&str, SeverityCount> = BTreeMap::new();
    for vuln in &result.vulnerabilities {
        *per_package
            .entry(vuln.pkg_id.as_str())
            .or_default()
            .entry(vuln.severity)
            .or_default() += 1;
    }

    let mut root = TreeNode::new(format!(
        "\nDependency Origin Tree\n======================\n{}",
        result.target
    ));

    let mut seen = HashSet::new();
    for vuln in &result.vulnerabilities {
        if !seen.insert(vuln.pkg_id.as_str()) {
            continue;
        }

        let (_, parts) = per_package
            .get(vuln.pkg_id.as_str())
            .map(|counts| summarize(counts, allowed))
            .unwrap_or_default();
        let label = highlight(&format!("{}, ({})", vuln.pkg_id, parts.join(", ")));

        let branch = root.add_branch(label);
        let mut on_path = HashSet::from([vuln.pkg_id.clone()]);
        let mut budget = max_nodes;
        add_parents(branch, &vuln.pkg_id, &parents, &mut on_path, &mut budget);
    }

    Some(root)
}
