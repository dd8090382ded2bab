// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Read-only path search. [`find_path`] walks from a root down to the
//! slot a key would occupy and classifies what it finds there, mirroring
//! the three terminal states the original `PathFinder` recognizes: an empty
//! branch, a leaf whose key matches, or a leaf whose key collides on the
//! nibble path so far but differs past it.
//!
//! `SHAMap::set_item`/`remove_item` use this to decide what kind of
//! mutation to perform before touching anything; the mutation itself is a
//! second, COW-aware descent (see `shamap.rs`) driven by the same branch
//! sequence this module computes, since re-deriving it from `key` alone on
//! the second pass is just as cheap and keeps the two concerns separate.

use crate::node::{LeafNode, Node, NodeRef};
use crate::primitives::Key;

/// What sits at the end of the path search for `key`.
pub enum Terminal<'t, 'a> {
    /// The branch at this depth is empty; `key` is absent.
    Empty,
    /// A leaf is present and its key matches `key` exactly.
    Matched(&'t LeafNode<'a>),
    /// A leaf is present but its key differs from `key` (a hash collision
    /// on the shared nibble prefix). Insertion must split this slot.
    Collided(&'t LeafNode<'a>),
}

/// The result of a path search: the branch nibble selected at each level
/// from `root` down to (and including) the branch at which `terminal` was
/// found, plus the terminal classification itself.
pub struct PathResult<'t, 'a> {
    pub branches: Vec<u8>,
    pub terminal: Terminal<'t, 'a>,
}

/// Walks `root` toward `key`, stopping at the first empty branch or leaf.
pub fn find_path<'t, 'a>(root: &'t NodeRef<'a>, key: Key) -> crate::error::Result<PathResult<'t, 'a>> {
    let mut branches = Vec::new();
    let mut node: &'t Node<'a> = root;
    loop {
        let inner = node
            .as_inner()
            .ok_or(crate::error::Error::Internal("find_path descended into a leaf"))?;
        let branch = key.select_branch(inner.depth())?;
        branches.push(branch);
        match inner.child(branch) {
            None => {
                return Ok(PathResult {
                    branches,
                    terminal: Terminal::Empty,
                })
            }
            Some(child) => match &**child {
                Node::Leaf(leaf) => {
                    let terminal = if leaf.key() == key {
                        Terminal::Matched(leaf)
                    } else {
                        Terminal::Collided(leaf)
                    };
                    return Ok(PathResult { branches, terminal });
                }
                Node::Inner(_) => {
                    node = child;
                }
            },
        }
    }
}

/// Looks up `key` starting at `root`, returning the matching item if any.
/// A thin convenience wrapper over [`find_path`] for the common read path.
pub fn get_item<'t, 'a>(root: &'t NodeRef<'a>, key: Key) -> crate::error::Result<Option<&'t crate::primitives::Item<'a>>> {
    let result = find_path(root, key)?;
    Ok(match result.terminal {
        Terminal::Matched(leaf) => Some(leaf.item()),
        Terminal::Empty | Terminal::Collided(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::LeafType;
    use crate::node::InnerNode;
    use crate::primitives::{Item, Slice};
    use std::rc::Rc;

    fn key_with_last_byte(b: u8) -> Key {
        let mut bytes = [0u8; 32];
        bytes[31] = b;
        Key::from_bytes(bytes)
    }

    #[test]
    fn empty_root_reports_empty_branch() {
        let root: NodeRef<'static> = Rc::new(Node::new_inner(0));
        let result = find_path(&root, Key::ZERO).unwrap();
        assert!(matches!(result.terminal, Terminal::Empty));
    }

    #[test]
    fn single_leaf_matches_its_own_key() {
        let key = key_with_last_byte(7);
        let item = Item::new(key, Slice::Owned(bytes::Bytes::from_static(b"x")));
        let leaf = Rc::new(Node::new_leaf(item, LeafType::AccountState));
        let mut root_inner = InnerNode::new(0);
        let branch = key.select_branch(0).unwrap();
        root_inner.set_child(branch, Some(leaf));
        let root: NodeRef<'static> = Rc::new(Node::Inner(root_inner));

        let result = find_path(&root, key).unwrap();
        assert!(matches!(result.terminal, Terminal::Matched(_)));
    }
}
