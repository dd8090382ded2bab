// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! Trie nodes: [`InnerNode`] (16 children, depth, cached hash) and
//! [`LeafNode`] (item, leaf tag, cached hash), unified under [`Node`].
//!
//! Nodes are held behind `Rc` so that [`crate::shamap::SHAMap::snapshot`]
//! can share the current tree by reference and mutation can path-copy via
//! `Rc::make_mut`, which clones a node only when it is actually shared
//! (`Rc::strong_count > 1`), exactly the "clone only if shared" contract
//! from the copy-on-write design.

use crate::hash::{self, LeafType};
use crate::primitives::{Hash256, Item, Key};
use std::cell::Cell;
use std::rc::Rc;

/// A reference-counted handle to a node, shared across snapshots until a
/// mutation forces a path-copy.
pub type NodeRef<'a> = Rc<Node<'a>>;

/// The sum-type node. A third "Placeholder" kind (a node reference that
/// exists on disk but hasn't been loaded yet) has no counterpart here since
/// this crate's in-memory trie is always fully materialized; that concept
/// belongs to the lazy mmap layout instead, see [`crate::catl2`].
#[derive(Clone, Debug)]
pub enum Node<'a> {
    Inner(InnerNode<'a>),
    Leaf(LeafNode<'a>),
}

impl<'a> Node<'a> {
    pub fn new_inner(depth: u8) -> Self {
        Node::Inner(InnerNode::new(depth))
    }

    pub fn new_leaf(item: Item<'a>, leaf_type: LeafType) -> Self {
        Node::Leaf(LeafNode::new(item, leaf_type))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn is_inner(&self) -> bool {
        matches!(self, Node::Inner(_))
    }

    pub fn as_inner(&self) -> Option<&InnerNode<'a>> {
        match self {
            Node::Inner(i) => Some(i),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_inner_mut(&mut self) -> Option<&mut InnerNode<'a>> {
        match self {
            Node::Inner(i) => Some(i),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode<'a>> {
        match self {
            Node::Leaf(l) => Some(l),
            Node::Inner(_) => None,
        }
    }

    /// The node's hash. Lazily computed and memoized;
    /// safe to invoke repeatedly on an unmutated tree.
    pub fn hash(&self) -> Hash256 {
        match self {
            Node::Inner(i) => i.hash(),
            Node::Leaf(l) => l.hash(),
        }
    }

    pub fn depth(&self) -> u8 {
        match self {
            Node::Inner(i) => i.depth(),
            // A leaf has no "depth" of its own in the usual sense; it is
            // reached at whatever depth its parent attached it. Callers
            // that need the leaf's logical depth track it externally while
            // descending.
            Node::Leaf(_) => 0,
        }
    }
}

/// A single 16-ary branch node. `depth` is the nibble depth of the node
/// itself, not of its children.
#[derive(Clone, Debug)]
pub struct InnerNode<'a> {
    depth: u8,
    children: [Option<NodeRef<'a>>; 16],
    branch_mask: u16,
    cached_hash: Cell<Option<Hash256>>,
}

const EMPTY_CHILD: Option<NodeRef<'static>> = None;

impl<'a> InnerNode<'a> {
    pub fn new(depth: u8) -> Self {
        InnerNode {
            depth,
            children: [EMPTY_CHILD; 16],
            branch_mask: 0,
            cached_hash: Cell::new(None),
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn branch_mask(&self) -> u16 {
        self.branch_mask
    }

    pub fn has_child(&self, branch: u8) -> bool {
        self.branch_mask & (1 << branch) != 0
    }

    pub fn child(&self, branch: u8) -> Option<&NodeRef<'a>> {
        self.children[branch as usize].as_ref()
    }

    pub fn child_clone(&self, branch: u8) -> Option<NodeRef<'a>> {
        self.children[branch as usize].clone()
    }

    /// Mutable access to a child slot, for recursive `Rc::make_mut`-based
    /// descent. Does not touch `branch_mask` or the hash cache; callers
    /// that replace the slot's value go through [`InnerNode::set_child`]
    /// instead; this is only for recursing into an existing occupied slot.
    pub fn child_slot_mut(&mut self, branch: u8) -> &mut Option<NodeRef<'a>> {
        &mut self.children[branch as usize]
    }

    /// Clears this node's cached hash. Used by callers that mutate a child
    /// subtree through [`InnerNode::child_slot_mut`] rather than
    /// [`InnerNode::set_child`], and so must invalidate this node's cache
    /// themselves once the recursive mutation returns.
    pub fn invalidate(&mut self) {
        self.cached_hash.set(None);
    }

    pub fn num_children(&self) -> u32 {
        self.branch_mask.count_ones()
    }

    /// Sets (or clears, with `None`) the child at `branch`. Invalidates this
    /// node's own cached hash. Ancestors are invalidated by the caller as
    /// it unwinds the path-copy recursion (every ancestor on that recursion
    /// is, by construction, also being freshly path-copied and thus starts
    /// with no valid cache of its own once *its* child slot is rewritten).
    pub fn set_child(&mut self, branch: u8, child: Option<NodeRef<'a>>) {
        let bit = 1u16 << branch;
        match &child {
            Some(_) => self.branch_mask |= bit,
            None => self.branch_mask &= !bit,
        }
        self.children[branch as usize] = child;
        self.cached_hash.set(None);
    }

    /// If exactly one child exists and it is a leaf, returns it. Used by
    /// path collapse.
    pub fn only_child_leaf(&self) -> Option<(u8, &LeafNode<'a>)> {
        if self.num_children() != 1 {
            return None;
        }
        let branch = self.branch_mask.trailing_zeros() as u8;
        self.child(branch)
            .and_then(|c| c.as_leaf())
            .map(|l| (branch, l))
    }

    /// If exactly one child exists and it is an inner node, returns it and
    /// its branch. Used by path collapse in `LEAVES_AND_INNERS` mode.
    pub fn only_child_inner(&self) -> Option<(u8, &NodeRef<'a>)> {
        if self.num_children() != 1 {
            return None;
        }
        let branch = self.branch_mask.trailing_zeros() as u8;
        let child = self.child(branch)?;
        if child.is_inner() {
            Some((branch, child))
        } else {
            None
        }
    }

    /// Deepest-left leaf key reachable from this subtree; canonical anchor
    /// for synthetic collapsed-form hashing.
    pub fn deepest_left_leaf_key(&self) -> Option<Key> {
        let branch = self.branch_mask.trailing_zeros();
        if branch >= 16 {
            return None;
        }
        match self.child(branch as u8)? {
            child if child.is_leaf() => child.as_leaf().map(|l| l.key()),
            child => child.as_inner().and_then(|i| i.deepest_left_leaf_key()),
        }
    }

    pub fn hash(&self) -> Hash256 {
        if self.branch_mask == 0 {
            return Hash256::ZERO;
        }
        if let Some(h) = self.cached_hash.get() {
            return h;
        }
        let mut children = [Hash256::ZERO; 16];
        for (i, slot) in children.iter_mut().enumerate() {
            if let Some(child) = self.child(i as u8) {
                *slot = child_slot_hash(child, self.depth);
            }
        }
        let h = hash::inner_hash(&children);
        self.cached_hash.set(Some(h));
        h
    }
}

/// The hash a child contributes to its parent's computation, synthesizing
/// the skipped single-branch inner nodes when path collapse has left a gap
/// between `parent_depth` and the child's own (unchanged) depth.
fn child_slot_hash(child: &NodeRef<'_>, parent_depth: u8) -> Hash256 {
    let inner = match child.as_inner() {
        Some(inner) => inner,
        None => return child.hash(),
    };
    if inner.depth() <= parent_depth + 1 {
        return inner.hash();
    }
    let anchor = inner
        .deepest_left_leaf_key()
        .expect("a non-empty inner node always has a deepest left leaf");
    let mut h = inner.hash();
    for depth in (parent_depth + 1..inner.depth()).rev() {
        let branch = anchor
            .select_branch(depth)
            .expect("depth below this inner node's own depth is always in range");
        let mut children = [Hash256::ZERO; 16];
        children[branch as usize] = h;
        h = hash::inner_hash(&children);
    }
    h
}

/// A leaf; immutable once constructed (replaced, never mutated in place).
#[derive(Clone, Debug)]
pub struct LeafNode<'a> {
    item: Item<'a>,
    leaf_type: LeafType,
    cached_hash: Cell<Option<Hash256>>,
}

impl<'a> LeafNode<'a> {
    pub fn new(item: Item<'a>, leaf_type: LeafType) -> Self {
        LeafNode {
            item,
            leaf_type,
            cached_hash: Cell::new(None),
        }
    }

    pub fn key(&self) -> Key {
        self.item.key()
    }

    pub fn item(&self) -> &Item<'a> {
        &self.item
    }

    pub fn leaf_type(&self) -> LeafType {
        self.leaf_type
    }

    pub fn hash(&self) -> Hash256 {
        if let Some(h) = self.cached_hash.get() {
            return h;
        }
        let h = hash::leaf_hash(self.leaf_type, self.item.value().as_bytes(), self.item.key().as_bytes());
        self.cached_hash.set(Some(h));
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Slice;

    fn leaf(byte: u8) -> NodeRef<'static> {
        let mut kb = [0u8; 32];
        kb[31] = byte;
        let key = Key::from_bytes(kb);
        let item = Item::new(key, Slice::Owned(bytes::Bytes::from_static(b"v")));
        Rc::new(Node::new_leaf(item, LeafType::AccountState))
    }

    #[test]
    fn empty_inner_hashes_to_zero() {
        let inner = InnerNode::new(0);
        assert!(inner.hash().is_zero());
    }

    #[test]
    fn set_child_invalidates_cache() {
        let mut inner = InnerNode::new(0);
        inner.set_child(0, Some(leaf(1)));
        let h1 = inner.hash();
        inner.set_child(1, Some(leaf(2)));
        let h2 = inner.hash();
        assert_ne!(h1, h2);
    }
}
