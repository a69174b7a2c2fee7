//! Hierarchical shape detection.
//!
//! Response columns named `group__sub__column` describe nested objects.
//! Nodes live in a flat map keyed by their `__`-joined path; children are
//! referenced by key, so there are no pointer cycles and iteration order
//! is always sorted.

use super::naming::python_identifier;
use super::types::PyType;
use crate::error::GenResult;
use crate::ir::ResponseField;
use std::collections::BTreeMap;
use tracing::warn;

/// Reserved path delimiter inside response column names.
pub const PATH_DELIMITER: &str = "__";

/// A response column resolved to a Python field.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeField {
    /// Python attribute name (local segment, normalized).
    pub name: String,
    /// Full column name as returned by the database.
    pub column: String,
    pub py_type: PyType,
    pub nullable: bool,
}

impl ShapeField {
    fn from_response(local_name: &str, field: &ResponseField) -> GenResult<Self> {
        Ok(Self {
            name: python_identifier(local_name),
            column: field.name.clone(),
            py_type: PyType::convert(&field.name, &field.type_name, field.is_nullable, "response")?,
            nullable: field.is_nullable,
        })
    }
}

/// One nested object group.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub path: Vec<String>,
    /// Fields whose path is exactly `path`, in encounter order.
    pub fields: Vec<ShapeField>,
    /// Next segment -> child path key.
    pub children: BTreeMap<String, String>,
}

impl Node {
    fn new(path: &[String]) -> Self {
        Self {
            path: path.to_vec(),
            fields: Vec::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> String {
        path_key(&self.path)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn last_segment(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Attribute name of this group inside its parent record.
    pub fn attr_name(&self) -> String {
        python_identifier(self.last_segment())
    }
}

/// Detected shape: group nodes plus the root-level fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub nodes: BTreeMap<String, Node>,
    pub root_fields: Vec<ShapeField>,
}

pub fn path_key(segments: &[String]) -> String {
    segments.join(PATH_DELIMITER)
}

/// Whether any response column uses the path delimiter.
pub fn is_hierarchical(fields: &[ResponseField]) -> bool {
    fields.iter().any(|f| f.name.contains(PATH_DELIMITER))
}

/// Build the hierarchy from the flat response column list.
pub fn detect(fields: &[ResponseField]) -> GenResult<Hierarchy> {
    let mut hierarchy = Hierarchy::default();

    for field in fields {
        if !field.name.contains(PATH_DELIMITER) {
            hierarchy
                .root_fields
                .push(ShapeField::from_response(&field.name, field)?);
            continue;
        }

        let mut segments: Vec<String> = field
            .name
            .split(PATH_DELIMITER)
            .map(str::to_string)
            .collect();
        let local = segments.pop().unwrap_or_default();
        let shape = ShapeField::from_response(&local, field)?;

        let key = hierarchy.ensure_node(&segments);
        if let Some(node) = hierarchy.nodes.get_mut(&key) {
            node.fields.push(shape);
        }
    }

    for node in hierarchy.nodes.values() {
        if node.fields.is_empty() && node.depth() == 1 {
            warn!(group = %node.key(), "group has no columns of its own and is never populated");
        }
    }

    Ok(hierarchy)
}

impl Hierarchy {
    /// Create `path` and every missing ancestor, returning the path key.
    fn ensure_node(&mut self, path: &[String]) -> String {
        let key = path_key(path);
        if self.nodes.contains_key(&key) {
            return key;
        }

        self.nodes.insert(key.clone(), Node::new(path));
        if path.len() > 1 {
            let parent_key = self.ensure_node(&path[..path.len() - 1]);
            if let Some(parent) = self.nodes.get_mut(&parent_key) {
                parent
                    .children
                    .insert(path[path.len() - 1].clone(), key.clone());
            }
        }
        key
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Top-level groups, sorted by path key.
    pub fn top_level(&self) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.depth() == 1).collect()
    }

    /// Direct children of `node`, sorted by segment.
    pub fn children_of(&self, node: &Node) -> Vec<&Node> {
        node.children
            .values()
            .filter_map(|key| self.nodes.get(key))
            .collect()
    }

    /// Every node, deepest first, ties broken by path key.
    pub fn depth_ordered(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| b.depth().cmp(&a.depth()).then_with(|| a.key().cmp(&b.key())));
        nodes
    }
}

/// Root fields usable as the parent key: the first named `id` or ending in `_id`.
pub fn find_parent_key_fields(root_fields: &[ShapeField]) -> Vec<&ShapeField> {
    root_fields
        .iter()
        .find(|f| {
            let lower = f.name.to_lowercase();
            lower == "id" || lower.ends_with("_id")
        })
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: &str, nullable: bool) -> ResponseField {
        ResponseField::new(name, ty, nullable)
    }

    #[test]
    fn test_flat_fields_stay_at_root() {
        let h = detect(&[field("id", "int", false), field("name", "string", false)]).unwrap();
        assert!(h.is_empty());
        assert_eq!(h.root_fields.len(), 2);
    }

    #[test]
    fn test_ancestors_are_created_on_demand() {
        let fields = vec![
            field("board_id", "int", false),
            field("lists__cards__id", "int", true),
            field("lists__id", "int", true),
            field("lists__cards__title", "string", true),
        ];
        let h = detect(&fields).unwrap();

        assert_eq!(h.nodes.len(), 2);
        let lists = h.get("lists").unwrap();
        assert_eq!(lists.fields.len(), 1);
        assert_eq!(lists.children.get("cards").map(String::as_str), Some("lists__cards"));

        let cards = h.get("lists__cards").unwrap();
        let names: Vec<&str> = cards.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "title"]);
        assert_eq!(cards.fields[1].column, "lists__cards__title");
    }

    #[test]
    fn test_depth_ordering() {
        let fields = vec![
            field("id", "int", false),
            field("b__x", "int", true),
            field("a__c__x", "int", true),
            field("a__x", "int", true),
        ];
        let h = detect(&fields).unwrap();
        let keys: Vec<String> = h.depth_ordered().iter().map(|n| n.key()).collect();
        assert_eq!(keys, vec!["a__c", "a", "b"]);
        let top: Vec<String> = h.top_level().iter().map(|n| n.key()).collect();
        assert_eq!(top, vec!["a", "b"]);
    }

    #[test]
    fn test_parent_key_first_match() {
        let h = detect(&[
            field("name", "string", false),
            field("user_id", "int", false),
            field("id", "int", false),
        ])
        .unwrap();
        let keys = find_parent_key_fields(&h.root_fields);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "user_id");

        let h = detect(&[field("name", "string", false)]).unwrap();
        assert!(find_parent_key_fields(&h.root_fields).is_empty());
    }

    #[test]
    fn test_unsupported_type_aborts() {
        let err = detect(&[field("lists__meta", "jsonb", false)]).unwrap_err();
        assert!(err.to_string().contains("lists__meta"));
    }
}
