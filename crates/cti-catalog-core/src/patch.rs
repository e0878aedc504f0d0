//! JSON patch over `serde_json::Value`.
//!
//! Supports the six RFC 6902 operations with RFC 6901 pointers. A list of
//! operations is applied atomically: either all succeed or the document is
//! left untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatchError;

/// JSON patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

impl PatchOp {
    const fn name(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Replace => "replace",
            PatchOp::Move => "move",
            PatchOp::Copy => "copy",
            PatchOp::Test => "test",
        }
    }
}

/// A single mutation: `{op, path, from, value}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    fn new(op: PatchOp, path: &str) -> Self {
        Self {
            op,
            path: path.to_owned(),
            from: None,
            value: None,
        }
    }

    pub fn add(path: &str, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new(PatchOp::Add, path)
        }
    }

    pub fn remove(path: &str) -> Self {
        Self::new(PatchOp::Remove, path)
    }

    pub fn replace(path: &str, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new(PatchOp::Replace, path)
        }
    }

    pub fn move_from(from: &str, path: &str) -> Self {
        Self {
            from: Some(from.to_owned()),
            ..Self::new(PatchOp::Move, path)
        }
    }

    pub fn copy_from(from: &str, path: &str) -> Self {
        Self {
            from: Some(from.to_owned()),
            ..Self::new(PatchOp::Copy, path)
        }
    }

    pub fn test(path: &str, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new(PatchOp::Test, path)
        }
    }

    fn value(&self) -> Result<&Value, PatchError> {
        self.value.as_ref().ok_or(PatchError::MissingValue(self.op.name()))
    }

    fn from_pointer(&self) -> Result<&str, PatchError> {
        self.from.as_deref().ok_or(PatchError::MissingFrom(self.op.name()))
    }
}

/// Apply a list of operations. On error `doc` is unchanged.
pub fn apply_operations(doc: &mut Value, ops: &[PatchOperation]) -> Result<(), PatchError> {
    let mut work = doc.clone();
    for op in ops {
        apply_operation(&mut work, op)?;
    }
    *doc = work;
    Ok(())
}

/// Apply one operation in place.
pub fn apply_operation(doc: &mut Value, op: &PatchOperation) -> Result<(), PatchError> {
    check_pointer(&op.path)?;
    match op.op {
        PatchOp::Add => add(doc, &op.path, op.value()?.clone()),
        PatchOp::Remove => remove(doc, &op.path).map(|_| ()),
        PatchOp::Replace => replace(doc, &op.path, op.value()?.clone()),
        PatchOp::Move => {
            let from = op.from_pointer()?;
            check_pointer(from)?;
            if from == op.path {
                return Ok(());
            }
            if op.path.starts_with(&format!("{}/", from)) {
                return Err(PatchError::MoveIntoChild {
                    from: from.to_owned(),
                    path: op.path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, &op.path, value)
        }
        PatchOp::Copy => {
            let from = op.from_pointer()?;
            check_pointer(from)?;
            let value = doc
                .pointer(from)
                .cloned()
                .ok_or_else(|| PatchError::PathNotFound(from.to_owned()))?;
            add(doc, &op.path, value)
        }
        PatchOp::Test => {
            let expected = op.value()?;
            match doc.pointer(&op.path) {
                Some(actual) if actual == expected => Ok(()),
                _ => Err(PatchError::TestFailed(op.path.clone())),
            }
        }
    }
}

fn check_pointer(path: &str) -> Result<(), PatchError> {
    if path.is_empty() || path.starts_with('/') {
        Ok(())
    } else {
        Err(PatchError::InvalidPointer(path.to_owned()))
    }
}

/// Split a pointer into its parent pointer and unescaped last token.
fn split_last(path: &str) -> Result<(&str, String), PatchError> {
    let idx = path
        .rfind('/')
        .ok_or_else(|| PatchError::InvalidPointer(path.to_owned()))?;
    let token = path[idx + 1..].replace("~1", "/").replace("~0", "~");
    Ok((&path[..idx], token))
}

fn parent_mut<'a>(doc: &'a mut Value, parent: &str) -> Result<&'a mut Value, PatchError> {
    doc.pointer_mut(parent)
        .ok_or_else(|| PatchError::PathNotFound(parent.to_owned()))
}

fn array_index(path: &str, token: &str) -> Result<usize, PatchError> {
    token
        .parse::<usize>()
        .map_err(|_| PatchError::InvalidPointer(path.to_owned()))
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, token) = split_last(path)?;
    match parent_mut(doc, parent)? {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            let index = array_index(path, &token)?;
            if index > items.len() {
                return Err(PatchError::IndexOutOfBounds {
                    path: path.to_owned(),
                    index,
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchError::NotAContainer(parent.to_owned())),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    if path.is_empty() {
        return Err(PatchError::InvalidPointer(path.to_owned()));
    }
    let (parent, token) = split_last(path)?;
    match parent_mut(doc, parent)? {
        Value::Object(map) => map
            .remove(&token)
            .ok_or_else(|| PatchError::PathNotFound(path.to_owned())),
        Value::Array(items) => {
            let index = array_index(path, &token)?;
            if index >= items.len() {
                return Err(PatchError::IndexOutOfBounds {
                    path: path.to_owned(),
                    index,
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(PatchError::NotAContainer(parent.to_owned())),
    }
}

fn replace(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let target = doc
        .pointer_mut(path)
        .ok_or_else(|| PatchError::PathNotFound(path.to_owned()))?;
    *target = value;
    Ok(())
}
