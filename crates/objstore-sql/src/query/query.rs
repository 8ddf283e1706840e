//! The [`Query`] builder.

use std::collections::HashMap;
use std::fmt;

use super::constraints::Constraint;
use super::nodes::{FromElement, NodeId, QueryNode};
use crate::sql::offset_cache::OffsetCache;

/// One entry of the select list with its column alias.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    node: QueryNode,
    alias: String,
}

impl SelectItem {
    /// The selected node.
    pub const fn node(&self) -> &QueryNode {
        &self.node
    }

    /// The alias the node is selected under.
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// An object query: FROM sources, a select list, an optional constraint,
/// grouping and ordering.
///
/// Every FROM source and select item gets an alias, generated as `a1_`,
/// `a2_`, ... unless given explicitly. A query also owns the cache of SQL
/// previously generated for it, so the cache lives exactly as long as the
/// query. Any mutation clears it; a clone is a distinct query with an empty
/// cache.
///
/// # Examples
///
/// ```
/// use objstore_sql::metadata::{ClassDescriptor, Model};
/// use objstore_sql::query::{Query, QueryClass};
///
/// let model = Model::new("m", vec![ClassDescriptor::new("Employee", vec![], vec![])]).unwrap();
/// let employee = QueryClass::new(&model, "Employee").unwrap();
///
/// let mut q = Query::new();
/// q.add_from(&employee).add_to_select(&employee);
/// assert_eq!(q.alias_of(employee.id()), Some("a1_"));
/// ```
pub struct Query {
    id: NodeId,
    from: Vec<FromElement>,
    aliases: HashMap<NodeId, String>,
    select: Vec<SelectItem>,
    constraint: Option<Constraint>,
    group_by: Vec<QueryNode>,
    order_by: Vec<QueryNode>,
    distinct: bool,
    alias_count: usize,
    offset_cache: OffsetCache,
}

impl Query {
    /// An empty query.
    pub fn new() -> Self {
        Self {
            id: NodeId::next(),
            from: Vec::new(),
            aliases: HashMap::new(),
            select: Vec::new(),
            constraint: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            distinct: false,
            alias_count: 0,
            offset_cache: OffsetCache::new(),
        }
    }

    /// The query identity. The offset cache is keyed by it.
    pub const fn id(&self) -> NodeId {
        self.id
    }

    fn next_alias(&mut self) -> String {
        self.alias_count += 1;
        format!("a{}_", self.alias_count)
    }

    fn touch(&mut self) {
        self.offset_cache.clear();
    }

    /// Adds a FROM source under a generated alias.
    pub fn add_from(&mut self, from: impl Into<FromElement>) -> &mut Self {
        let alias = self.next_alias();
        self.add_from_with_alias(from, alias)
    }

    /// Adds a FROM source under `alias`.
    pub fn add_from_with_alias(&mut self, from: impl Into<FromElement>, alias: impl Into<String>) -> &mut Self {
        let from = from.into();
        self.aliases.insert(from.id(), alias.into());
        self.from.push(from);
        self.touch();
        self
    }

    /// Appends to the select list.
    ///
    /// A class is selected under its FROM alias; an expression gets a
    /// generated alias.
    pub fn add_to_select(&mut self, node: impl Into<QueryNode>) -> &mut Self {
        let node = node.into();
        let alias = match &node {
            QueryNode::Class(qc) => match self.aliases.get(&qc.id()) {
                Some(alias) => alias.clone(),
                None => {
                    let alias = self.next_alias();
                    self.aliases.insert(qc.id(), alias.clone());
                    alias
                }
            },
            QueryNode::Evaluable(_) => self.next_alias(),
        };
        self.select.push(SelectItem { node, alias });
        self.touch();
        self
    }

    /// Appends an expression to the select list under `alias`.
    pub fn add_to_select_with_alias(&mut self, node: impl Into<QueryNode>, alias: impl Into<String>) -> &mut Self {
        let node = node.into();
        let alias = alias.into();
        if let QueryNode::Class(qc) = &node {
            self.aliases.insert(qc.id(), alias.clone());
        }
        self.select.push(SelectItem { node, alias });
        self.touch();
        self
    }

    /// Replaces the root constraint.
    pub fn set_constraint(&mut self, constraint: impl Into<Constraint>) -> &mut Self {
        self.constraint = Some(constraint.into());
        self.touch();
        self
    }

    /// Removes the root constraint.
    pub fn clear_constraint(&mut self) -> &mut Self {
        self.constraint = None;
        self.touch();
        self
    }

    /// Appends to the GROUP BY list.
    pub fn add_to_group_by(&mut self, node: impl Into<QueryNode>) -> &mut Self {
        self.group_by.push(node.into());
        self.touch();
        self
    }

    /// Appends to the ORDER BY list.
    pub fn add_to_order_by(&mut self, node: impl Into<QueryNode>) -> &mut Self {
        self.order_by.push(node.into());
        self.touch();
        self
    }

    /// Sets `SELECT DISTINCT`.
    pub fn set_distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self.touch();
        self
    }

    /// The FROM sources, in the order added.
    pub fn from_elements(&self) -> &[FromElement] {
        &self.from
    }

    /// The select list.
    pub fn select(&self) -> &[SelectItem] {
        &self.select
    }

    /// The root constraint.
    pub const fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    /// The GROUP BY list.
    pub fn group_by(&self) -> &[QueryNode] {
        &self.group_by
    }

    /// The explicit ORDER BY list.
    pub fn order_by(&self) -> &[QueryNode] {
        &self.order_by
    }

    /// `true` for `SELECT DISTINCT`.
    pub const fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// The alias of a FROM source or selected class.
    pub fn alias_of(&self, id: NodeId) -> Option<&str> {
        self.aliases.get(&id).map(String::as_str)
    }

    /// Returns `true` if `node` is in the select list.
    pub fn selects(&self, node: &QueryNode) -> bool {
        self.select.iter().any(|item| &item.node == node)
    }

    /// The offsets SQL is currently cached for, ascending.
    pub fn cached_offsets(&self) -> Vec<usize> {
        self.offset_cache.offsets()
    }

    pub(crate) const fn offset_cache(&self) -> &OffsetCache {
        &self.offset_cache
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Query {
    fn clone(&self) -> Self {
        Self {
            id: NodeId::next(),
            from: self.from.clone(),
            aliases: self.aliases.clone(),
            select: self.select.clone(),
            constraint: self.constraint.clone(),
            group_by: self.group_by.clone(),
            order_by: self.order_by.clone(),
            distinct: self.distinct,
            alias_count: self.alias_count,
            offset_cache: OffsetCache::new(),
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("select", &self.select)
            .field("constraint", &self.constraint)
            .field("group_by", &self.group_by)
            .field("order_by", &self.order_by)
            .field("distinct", &self.distinct)
            .field("offset_cache", &self.offset_cache)
            .finish_non_exhaustive()
    }
}
