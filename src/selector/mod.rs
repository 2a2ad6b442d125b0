//! Only/Exclude selector language.
//!
//! A selector names the fields to keep (Only) or drop (Exclude), including fields of
//! nested schemas:
//!
//! ```text
//! filter := name ('[' filter (',' filter)* ']')?
//! ```
//!
//! `User[ID,Name,School[Name]]` selects `User`, and inside it `ID`, `Name` and the
//! `Name` of `School`. Several selector strings are joined as siblings of an implicit
//! root, so `["ID", "User[Name]"]` is parsed as `[ID,User[Name]]`. Whitespace is
//! insignificant and names are case-sensitive.
//!
//! # Representation
//!
//! A parse produces a [`FilterForest`]: an arena of [`FilterNode`]s with parent and
//! children links, plus an index from nesting depth (0 = top level) to the nodes
//! introduced at that depth. The dump orchestrator consults the level matching its
//! recursion depth and scopes it to the node of the field it is descending into.
//!
//! # Memoization
//!
//! Identical selector literals recur on every request that uses the same field set,
//! so successful parses are cached process-wide, keyed by the exact input string, and
//! shared as `Arc<FilterForest>`.
//!
//! # Examples
//!
//! ```rust
//! use portal::selector::{parse_filters, NodeQuery};
//!
//! let forest = parse_filters(&["A", "B[C,D]", "E[F]"]).unwrap();
//! assert_eq!(forest.extract_names(0, &NodeQuery::default()), vec!["A", "B", "E"]);
//! assert_eq!(forest.extract_names(0, &NodeQuery::leaves()), vec!["A"]);
//! ```

mod brackets;

pub use brackets::check_bracket_pairs;

use crate::core::SelectorError;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::trace;

/// Index of a node inside its [`FilterForest`].
pub type NodeId = usize;

/// Process-wide memo of successful parses, keyed by the literal filter string.
static PARSE_CACHE: LazyLock<DashMap<String, Arc<FilterForest>>> = LazyLock::new(DashMap::new);

/// One node of a selector tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNode {
    /// Field name or alias as written in the selector
    pub name: String,
    /// Parent node, `None` for top-level nodes
    pub parent: Option<NodeId>,
    /// Child nodes in declaration order
    pub children: Vec<NodeId>,
}

/// Which parent the nodes returned by [`FilterForest::extract_names`] must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentFilter<'a> {
    /// Any parent
    #[default]
    Any,
    /// Top-level nodes only
    Root,
    /// Children of a specific node
    Node(NodeId),
    /// Children of any node whose name matches the field name or its alias
    Named {
        /// Declared field name
        name: &'a str,
        /// External alias of the field, if any
        alias: Option<&'a str>,
    },
}

/// Query options for [`FilterForest::extract_names`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeQuery<'a> {
    /// Skip nodes that have children.
    ///
    /// In an Exclude selector `User[Name]` means "drop `Name` inside `User`", not
    /// "drop `User`", so exclusions only take leaf nodes at each level.
    pub ignore_with_children: bool,
    /// Restrict the result to the children of a parent
    pub parent: ParentFilter<'a>,
}

impl<'a> NodeQuery<'a> {
    /// Only nodes without children.
    pub fn leaves() -> Self {
        Self {
            ignore_with_children: true,
            parent: ParentFilter::Any,
        }
    }

    /// Restrict the query to a parent.
    pub fn under(mut self, parent: ParentFilter<'a>) -> Self {
        self.parent = parent;
        self
    }
}

/// Position of a projection frame inside a selector forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    /// The top-level frame
    #[default]
    Root,
    /// A nested frame reached through this node
    Node(NodeId),
    /// A nested frame the selector does not mention
    Detached,
}

/// A parsed selector: nodes plus the depth index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterForest {
    nodes: Vec<FilterNode>,
    levels: BTreeMap<usize, Vec<NodeId>>,
}

impl FilterForest {
    /// True when the selector named no fields at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this forest.
    pub fn node(&self, id: NodeId) -> &FilterNode {
        &self.nodes[id]
    }

    /// Number of nesting levels that contain at least one node.
    pub fn depth_count(&self) -> usize {
        self.levels.len()
    }

    /// Node ids introduced at `depth`, in declaration order.
    pub fn level(&self, depth: usize) -> &[NodeId] {
        self.levels.get(&depth).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of the nodes at `depth` that satisfy `query`.
    pub fn extract_names(&self, depth: usize, query: &NodeQuery<'_>) -> Vec<String> {
        self.level(depth)
            .iter()
            .map(|&id| &self.nodes[id])
            .filter(|node| self.parent_matches(node, query.parent))
            .filter(|node| !(query.ignore_with_children && !node.children.is_empty()))
            .map(|node| node.name.clone())
            .collect()
    }

    /// Names of the direct children of `id`.
    pub fn children_of(&self, id: NodeId) -> Vec<&str> {
        self.nodes[id]
            .children
            .iter()
            .map(|&child| self.nodes[child].name.as_str())
            .collect()
    }

    /// Find the node at `depth` under `parent` whose name is one of `names`.
    pub fn find(&self, depth: usize, parent: Option<NodeId>, names: &[&str]) -> Option<NodeId> {
        self.level(depth).iter().copied().find(|&id| {
            let node = &self.nodes[id];
            node.parent == parent && names.contains(&node.name.as_str())
        })
    }

    /// Field names the selector names for a frame at `depth` positioned at `cursor`.
    ///
    /// With `leaves_only`, nodes that have children are skipped.
    pub fn names_at(&self, cursor: Cursor, depth: usize, leaves_only: bool) -> Vec<String> {
        let parent = match cursor {
            Cursor::Root => ParentFilter::Root,
            Cursor::Node(id) => ParentFilter::Node(id),
            Cursor::Detached => return Vec::new(),
        };
        self.extract_names(
            depth,
            &NodeQuery {
                ignore_with_children: leaves_only,
                parent,
            },
        )
    }

    /// Cursor of the nested frame reached through a field named `name` (or `alias`)
    /// from a frame at `depth` positioned at `cursor`.
    pub fn descend(&self, cursor: Cursor, depth: usize, name: &str, alias: Option<&str>) -> Cursor {
        let parent = match cursor {
            Cursor::Root => None,
            Cursor::Node(id) => Some(id),
            Cursor::Detached => return Cursor::Detached,
        };
        let mut names = vec![name];
        names.extend(alias.filter(|alias| !alias.is_empty()));
        self.find(depth, parent, &names)
            .map_or(Cursor::Detached, Cursor::Node)
    }

    fn parent_matches(&self, node: &FilterNode, filter: ParentFilter<'_>) -> bool {
        match filter {
            ParentFilter::Any => true,
            ParentFilter::Root => node.parent.is_none(),
            ParentFilter::Node(id) => node.parent == Some(id),
            ParentFilter::Named { name, alias } => node.parent.is_some_and(|parent| {
                let parent = self.nodes[parent].name.as_str();
                parent == name || alias.is_some_and(|alias| !alias.is_empty() && parent == alias)
            }),
        }
    }

    fn push(&mut self, name: String, parent: Option<NodeId>, depth: usize) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(FilterNode {
            name,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        self.levels.entry(depth).or_default().push(id);
        id
    }
}

/// Parse selector strings joined as siblings of an implicit root.
///
/// `["A", "B[C]"]` is parsed as `[A,B[C]]`.
pub fn parse_filters<S: AsRef<str>>(filters: &[S]) -> Result<Arc<FilterForest>, SelectorError> {
    let joined = filters.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
    parse_filter_string(&format!("[{joined}]"))
}

/// Parse a root-level filter string such as `[speaker[id,name]]`.
///
/// An empty (or all-whitespace) input yields an empty forest.
///
/// # Errors
///
/// - [`SelectorError::PrefixIsNotBracket`] if the input does not start with `[`
/// - [`SelectorError::UnmatchedBrackets`] if brackets are unbalanced or misordered
/// - [`SelectorError::MissingName`] if a nested `[` does not follow a name
pub fn parse_filter_string(input: &str) -> Result<Arc<FilterForest>, SelectorError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Arc::new(FilterForest::default()));
    }
    if !input.starts_with('[') {
        return Err(SelectorError::PrefixIsNotBracket);
    }

    if let Some(cached) = PARSE_CACHE.get(input) {
        return Ok(Arc::clone(cached.value()));
    }

    check_bracket_pairs(input.as_bytes())?;
    let forest = Arc::new(build_forest(input)?);
    trace!(target: "portal", "parsed selector {input} into {} nodes", forest.nodes.len());
    PARSE_CACHE.insert(input.to_string(), Arc::clone(&forest));
    Ok(forest)
}

/// Build the forest from a bracket-balanced string starting with `[`.
///
/// The outer brackets are the implicit root: names directly inside them land at
/// depth 0.
fn build_forest(input: &str) -> Result<FilterForest, SelectorError> {
    let mut forest = FilterForest::default();
    let mut word = String::new();
    // One entry per open bracket: the node that owns it (`None` for the root).
    let mut open: Vec<Option<NodeId>> = Vec::new();
    let mut last: Option<NodeId> = None;

    fn flush(word: &mut String, open: &[Option<NodeId>], forest: &mut FilterForest) -> Option<NodeId> {
        if word.is_empty() {
            return None;
        }
        let depth = open.len().saturating_sub(1);
        let parent = open.last().copied().flatten();
        Some(forest.push(std::mem::take(word), parent, depth))
    }

    for ch in input.chars() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {}
            ',' => {
                flush(&mut word, &open, &mut forest);
                last = None;
            }
            '[' => {
                let owner = flush(&mut word, &open, &mut forest).or(last.take());
                if open.is_empty() {
                    open.push(None);
                } else if owner.is_none() {
                    return Err(SelectorError::MissingName);
                } else {
                    open.push(owner);
                }
            }
            ']' => {
                flush(&mut word, &open, &mut forest);
                let closed = open.pop().flatten();
                last = closed;
            }
            _ => word.push(ch),
        }
    }
    flush(&mut word, &open, &mut forest);

    Ok(forest)
}
