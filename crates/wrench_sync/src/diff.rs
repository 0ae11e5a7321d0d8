//! Top-level field diff with cycle-safe deep equality
//!
//! Comparison walks both values in lockstep and remembers every pair of
//! containers it has started comparing. Meeting the same pair again means
//! the walk went round a cycle, and that subtree is taken as equal.
//! Differences are reported per top-level field only; a nested change
//! surfaces as its whole top-level value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// One top-level field whose local and server values differ
///
/// `None` means the key is absent on that side, which is not the same as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff<T = Value> {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<T>,
}

impl FieldDiff<&Value> {
    pub fn into_owned(self) -> FieldDiff {
        FieldDiff {
            field: self.field,
            local: self.local.cloned(),
            server: self.server.cloned(),
        }
    }
}

/// Structure exposed to the walker
pub enum Shape<T> {
    Scalar(Value),
    Seq(Vec<T>),
    Map(Vec<(String, T)>),
}

/// A value the diff engine can walk
pub trait Structural: Clone {
    /// Address of a container; scalars return `None` and compare by value
    fn identity(&self) -> Option<usize>;

    fn shape(&self) -> Shape<Self>;
}

impl<'a> Structural for &'a Value {
    fn identity(&self) -> Option<usize> {
        match *self {
            Value::Array(_) | Value::Object(_) => Some(*self as *const Value as usize),
            _ => None,
        }
    }

    fn shape(&self) -> Shape<Self> {
        match *self {
            Value::Array(items) => Shape::Seq(items.iter().collect()),
            Value::Object(map) => Shape::Map(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
            scalar => Shape::Scalar(scalar.clone()),
        }
    }
}

/// Compare `local` against `server`, one entry per differing top-level key
///
/// Keys are visited in `local`'s order, then keys only the server has.
/// Array elements are keyed by index; scalars have no keys.
pub fn diff<T: Structural>(local: T, server: T) -> Vec<FieldDiff<T>> {
    let local_fields = fields(&local);
    let server_fields = fields(&server);

    let mut keys: Vec<&str> = local_fields.iter().map(|(k, _)| k.as_str()).collect();
    for (key, _) in &server_fields {
        if !keys.contains(&key.as_str()) {
            keys.push(key.as_str());
        }
    }

    let mut diffs = Vec::new();
    for key in keys {
        let local_value = lookup(&local_fields, key);
        let server_value = lookup(&server_fields, key);

        let equal = match (local_value, server_value) {
            (Some(a), Some(b)) => deep_equal(a, b, &mut HashSet::new()),
            (None, None) => true,
            _ => false,
        };

        if !equal {
            diffs.push(FieldDiff {
                field: key.to_string(),
                local: local_value.cloned(),
                server: server_value.cloned(),
            });
        }
    }
    diffs
}

fn fields<T: Structural>(value: &T) -> Vec<(String, T)> {
    match value.shape() {
        Shape::Map(entries) => entries,
        Shape::Seq(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        Shape::Scalar(_) => Vec::new(),
    }
}

fn lookup<'f, T>(fields: &'f [(String, T)], key: &str) -> Option<&'f T> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn deep_equal<T: Structural>(a: &T, b: &T, seen: &mut HashSet<(usize, usize)>) -> bool {
    if let (Some(ia), Some(ib)) = (a.identity(), b.identity()) {
        if ia == ib || !seen.insert((ia, ib)) {
            return true;
        }
    }

    match (a.shape(), b.shape()) {
        (Shape::Scalar(x), Shape::Scalar(y)) => scalar_equal(&x, &y),
        (Shape::Seq(xs), Shape::Seq(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| deep_equal(x, y, seen))
        }
        (Shape::Map(xs), Shape::Map(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|(key, x)| {
                    lookup(&ys, key).is_some_and(|y| deep_equal(x, y, seen))
                })
        }
        _ => false,
    }
}

// 1 and 1.0 are the same quantity to the server
fn scalar_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

enum NodeKind {
    Scalar(Value),
    Seq(Vec<Node>),
    Map(Vec<(String, Node)>),
}

/// Shared, mutable value that may reference itself
///
/// Cycles are built by inserting a clone of an ancestor; they keep their
/// nodes alive until broken with [`Node::remove`].
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeKind>>);

impl Node {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::wrap(NodeKind::Scalar(value.into()))
    }

    pub fn list() -> Self {
        Self::wrap(NodeKind::Seq(Vec::new()))
    }

    pub fn map() -> Self {
        Self::wrap(NodeKind::Map(Vec::new()))
    }

    fn wrap(kind: NodeKind) -> Self {
        Self(Rc::new(RefCell::new(kind)))
    }

    /// Append to a list node; ignored for other kinds
    pub fn push(&self, child: Node) {
        if let NodeKind::Seq(items) = &mut *self.0.borrow_mut() {
            items.push(child);
        }
    }

    /// Set a key on a map node, keeping its original position when it already exists
    pub fn insert(&self, key: impl Into<String>, child: Node) {
        if let NodeKind::Map(entries) = &mut *self.0.borrow_mut() {
            let key = key.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = child,
                None => entries.push((key, child)),
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<Node> {
        if let NodeKind::Map(entries) = &mut *self.0.borrow_mut() {
            let index = entries.iter().position(|(k, _)| k == key)?;
            return Some(entries.remove(index).1);
        }
        None
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                let node = Self::list();
                for item in items {
                    node.push(Self::from_value(item));
                }
                node
            }
            Value::Object(map) => {
                let node = Self::map();
                for (key, item) in map {
                    node.insert(key.clone(), Self::from_value(item));
                }
                node
            }
            scalar => Self::scalar(scalar.clone()),
        }
    }
}

impl Structural for Node {
    fn identity(&self) -> Option<usize> {
        match &*self.0.borrow() {
            NodeKind::Scalar(_) => None,
            _ => Some(Rc::as_ptr(&self.0) as usize),
        }
    }

    fn shape(&self) -> Shape<Self> {
        match &*self.0.borrow() {
            NodeKind::Scalar(value) => Shape::Scalar(value.clone()),
            NodeKind::Seq(items) => Shape::Seq(items.clone()),
            NodeKind::Map(entries) => Shape::Map(entries.clone()),
        }
    }
}

// Shallow on purpose: a derived Debug would recurse forever on cycles
impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.borrow() {
            NodeKind::Scalar(value) => write!(f, "Node({})", value),
            NodeKind::Seq(items) => write!(f, "Node([{} items])", items.len()),
            NodeKind::Map(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                write!(f, "Node({{{}}})", keys.join(", "))
            }
        }
    }
}
