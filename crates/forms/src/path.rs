//! Field paths and generic get/set over entity trees.
//!
//! Every form addresses its fields through one path syntax: dotted map keys
//! plus bracketed sequence indices, e.g. `sourceTimeslots[0].startAt`.
//! Callers never hand-parse path strings; everything goes through `FieldPath`.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty field path")]
    Empty,

    #[error("invalid path segment in `{0}`")]
    InvalidSegment(String),

    #[error("invalid sequence index in `{0}`")]
    InvalidIndex(String),

    #[error("unclosed index bracket in `{0}`")]
    UnclosedBracket(String),
}

/// One step into an entity tree: a map key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// An immutable address of one leaf or subtree of an entity tree.
///
/// Parsed from the string form (`experienceDetails[2].company`) and displayed
/// back to it losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let mut rest = raw;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let close = after
                    .find(']')
                    .ok_or_else(|| PathError::UnclosedBracket(raw.to_string()))?;
                let index: usize = after[..close]
                    .parse()
                    .map_err(|_| PathError::InvalidIndex(raw.to_string()))?;
                segments.push(Segment::Index(index));
                rest = &after[close + 1..];
                // An index may be followed by `.key`, another `[n]`, or the end.
                if let Some(after_dot) = rest.strip_prefix('.') {
                    if after_dot.is_empty() {
                        return Err(PathError::InvalidSegment(raw.to_string()));
                    }
                    rest = after_dot;
                }
            } else {
                let end = rest
                    .find(|c| c == '.' || c == '[')
                    .unwrap_or(rest.len());
                if end == 0 {
                    return Err(PathError::InvalidSegment(raw.to_string()));
                }
                segments.push(Segment::Key(rest[..end].to_string()));
                rest = &rest[end..];
                if let Some(after_dot) = rest.strip_prefix('.') {
                    if after_dot.is_empty() {
                        return Err(PathError::InvalidSegment(raw.to_string()));
                    }
                    rest = after_dot;
                }
            }
        }

        Ok(FieldPath { segments })
    }

    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(FieldPath { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The top-level map key this path lives under, if the path starts with one.
    /// Partial validation is scoped by this key.
    pub fn root_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(k) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{k}")?;
                }
                Segment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

/// Resolves `path` inside `tree`. Missing keys and out-of-range indices
/// resolve to `None`, never an error.
pub fn get<'a>(tree: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = tree;
    for segment in path.segments() {
        current = match segment {
            Segment::Key(k) => current.get(k.as_str())?,
            Segment::Index(i) => current.get(*i)?,
        };
    }
    Some(current)
}

/// Non-destructive set: returns a new tree with `path` pointing at `value`.
/// The input tree is never mutated. Intermediate containers are created when
/// absent; indices past the end of a sequence pad with nulls, and callers own
/// index contiguity.
pub fn set(tree: &Value, path: &FieldPath, value: Value) -> Value {
    let mut next = tree.clone();
    set_in(&mut next, path, value);
    next
}

/// In-place variant of [`set`] for trees the caller owns.
pub fn set_in(tree: &mut Value, path: &FieldPath, value: Value) {
    set_segments(tree, path.segments(), value);
}

fn set_segments(node: &mut Value, segments: &[Segment], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    match head {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                set_segments(slot, rest, value);
            }
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            if let Value::Array(items) = node {
                while items.len() <= *index {
                    items.push(Value::Null);
                }
                set_segments(&mut items[*index], rest, value);
            }
        }
    }
}

/// Removes the value at `path`, returning it if present.
pub fn remove_in(tree: &mut Value, path: &FieldPath) -> Option<Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = tree;
    for segment in parents {
        current = match segment {
            Segment::Key(k) => current.get_mut(k.as_str())?,
            Segment::Index(i) => current.get_mut(*i)?,
        };
    }
    match (last, current) {
        (Segment::Key(k), Value::Object(map)) => map.remove(k),
        (Segment::Index(i), Value::Array(items)) if *i < items.len() => Some(items.remove(*i)),
        _ => None,
    }
}

/// Recursive object merge: `overlay` wins on scalars and sequences, maps merge
/// key by key. Used for read defaults, submit extra data, and upload patches.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut out = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let merged = match out.get(key) {
                    Some(existing) => merge(existing, overlay_value),
                    None => overlay_value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        _ => overlay.clone(),
    }
}
