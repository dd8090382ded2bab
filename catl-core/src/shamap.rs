// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

//! The SHAMap itself: insertion, removal, lookup, snapshotting, and
//! path collapse, built on the COW node layer in `node.rs`.
//!
//! Mutation descends the tree via `Rc::make_mut`, which clones an
//! `InnerNode` only when `Rc::strong_count` says it is shared with a
//! snapshot; an unshared node is mutated in place. Every node on the
//! mutated path therefore ends up with a fresh (invalidated) hash cache,
//! while nodes outside that path, including in any snapshot taken before
//! the call, keep their caches and their old structure untouched.

use crate::error::{Error, Result};
use crate::hash::LeafType;
use crate::node::{InnerNode, LeafNode, Node, NodeRef};
use crate::primitives::{Hash256, Item, Key};
use std::rc::Rc;

/// Controls how `remove_item` collapses single-child inner nodes left
/// behind by a deletion.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CollapseMode {
    /// Collapse a chain down to its single remaining leaf, but never skip
    /// over an inner node that itself has a single inner child. This is
    /// the mode rippled's SHAMap has always used; kept as the default here
    /// for identical hash behavior against historical CATL files.
    #[default]
    LeavesOnly,
    /// Also collapse single-inner-child chains, skipping straight to the
    /// first node with two or more children (or a leaf).
    LeavesAndInners,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SHAMapOptions {
    pub collapse_mode: CollapseMode,
}

/// Selects how [`SHAMap::set_item`] treats an existing key at the target
/// slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetMode {
    /// Succeed only if the key is absent.
    AddOnly,
    /// Succeed only if the key is already present.
    UpdateOnly,
    /// Insert or replace unconditionally.
    AddOrUpdate,
}

/// The result of [`SHAMap::set_item`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetOutcome {
    Added,
    Updated,
    Failed,
}

/// Internal, four-way classification of what `insert_at` found at the
/// target slot before it is collapsed to the public [`SetOutcome`].
enum InsertOutcome {
    Added,
    Updated,
    AlreadyExists,
    NotFound,
}

impl From<InsertOutcome> for SetOutcome {
    fn from(o: InsertOutcome) -> Self {
        match o {
            InsertOutcome::Added => SetOutcome::Added,
            InsertOutcome::Updated => SetOutcome::Updated,
            InsertOutcome::AlreadyExists | InsertOutcome::NotFound => SetOutcome::Failed,
        }
    }
}

/// A 16-ary radix Merkle trie over 256-bit keys. Cloning a `SHAMap` (via
/// [`SHAMap::snapshot`]) is O(1); the clone shares the current root until
/// either map is next mutated.
pub struct SHAMap<'a> {
    map_type: LeafType,
    root: NodeRef<'a>,
    options: SHAMapOptions,
}

impl<'a> SHAMap<'a> {
    pub fn new(map_type: LeafType) -> Self {
        Self::with_options(map_type, SHAMapOptions::default())
    }

    pub fn with_options(map_type: LeafType, options: SHAMapOptions) -> Self {
        SHAMap {
            map_type,
            root: Rc::new(Node::new_inner(0)),
            options,
        }
    }

    pub fn map_type(&self) -> LeafType {
        self.map_type
    }

    pub fn options(&self) -> SHAMapOptions {
        self.options
    }

    pub fn root(&self) -> &NodeRef<'a> {
        &self.root
    }

    pub fn get_hash(&self) -> Hash256 {
        self.root.hash()
    }

    /// An O(1) snapshot: the returned map shares the current tree by
    /// reference. Mutating either map path-copies only the nodes on the
    /// path it touches.
    pub fn snapshot(&self) -> SHAMap<'a> {
        SHAMap {
            map_type: self.map_type,
            root: Rc::clone(&self.root),
            options: self.options,
        }
    }

    pub fn get_item(&self, key: Key) -> Result<Option<&Item<'a>>> {
        crate::path_finder::get_item(&self.root, key)
    }

    pub fn contains(&self, key: Key) -> Result<bool> {
        Ok(self.get_item(key)?.is_some())
    }

    /// Inserts `item`, failing if its key is already present. Equivalent to
    /// `set_item(item, SetMode::AddOnly) == SetOutcome::Added`.
    pub fn add_item(&mut self, item: Item<'a>) -> Result<bool> {
        Ok(self.set_item(item, SetMode::AddOnly)? == SetOutcome::Added)
    }

    /// Replaces the value at an existing key, failing if the key is absent.
    /// Equivalent to `set_item(item, SetMode::UpdateOnly) == SetOutcome::Updated`.
    pub fn update_item(&mut self, item: Item<'a>) -> Result<bool> {
        Ok(self.set_item(item, SetMode::UpdateOnly)? == SetOutcome::Updated)
    }

    /// Inserts or replaces `item` according to `mode`, reporting which of
    /// the three outcomes occurred.
    pub fn set_item(&mut self, item: Item<'a>, mode: SetMode) -> Result<SetOutcome> {
        let key = item.key();
        let leaf_type = self.map_type;
        Ok(insert_at(&mut self.root, key, item, leaf_type, mode)?.into())
    }

    /// Removes `key`, returning whether it was present. Collapses the path
    /// left behind per `self.options.collapse_mode`.
    pub fn remove_item(&mut self, key: Key) -> Result<bool> {
        delete_at(&mut self.root, key, self.options.collapse_mode)
    }

    /// Computes the minimal set of leaf-level changes between `self` (the
    /// older map) and `other` (the newer map): which keys were added,
    /// updated, or removed.
    ///
    /// Subtrees shared by reference (`Rc::ptr_eq`) between the two maps are
    /// skipped without inspection. This is the common case when `other` is a
    /// descendant of a [`SHAMap::snapshot`] of `self` with only a few
    /// mutations applied, which is exactly the delta a CATL writer needs
    /// between two consecutive ledgers' state maps.
    pub fn diff_items<'s>(&'s self, other: &'s SHAMap<'a>) -> Vec<DiffOp<'s, 'a>> {
        let mut out = Vec::new();
        diff_nodes(&self.root, &other.root, &mut out);
        out
    }
}

/// A single leaf-level difference produced by [`SHAMap::diff_items`].
pub enum DiffOp<'s, 'a> {
    Added(&'s Item<'a>),
    Updated(&'s Item<'a>),
    Removed(Key),
}

fn diff_nodes<'s, 'a>(old: &'s NodeRef<'a>, new: &'s NodeRef<'a>, out: &mut Vec<DiffOp<'s, 'a>>) {
    if Rc::ptr_eq(old, new) {
        return;
    }
    match (&**old, &**new) {
        (Node::Leaf(a), Node::Leaf(b)) => {
            if a.key() == b.key() {
                if a.item().value() != b.item().value() {
                    out.push(DiffOp::Updated(b.item()));
                }
            } else {
                out.push(DiffOp::Removed(a.key()));
                out.push(DiffOp::Added(b.item()));
            }
        }
        (Node::Leaf(a), Node::Inner(_)) => {
            out.push(DiffOp::Removed(a.key()));
            collect_added(new, out);
        }
        (Node::Inner(_), Node::Leaf(b)) => {
            collect_removed(old, out);
            out.push(DiffOp::Added(b.item()));
        }
        (Node::Inner(old_inner), Node::Inner(new_inner)) => {
            for branch in 0u8..16 {
                match (old_inner.child(branch), new_inner.child(branch)) {
                    (None, None) => {}
                    (None, Some(new_child)) => collect_added(new_child, out),
                    (Some(old_child), None) => collect_removed(old_child, out),
                    (Some(old_child), Some(new_child)) => diff_nodes(old_child, new_child, out),
                }
            }
        }
    }
}

fn collect_added<'s, 'a>(node: &'s NodeRef<'a>, out: &mut Vec<DiffOp<'s, 'a>>) {
    match &**node {
        Node::Leaf(leaf) => out.push(DiffOp::Added(leaf.item())),
        Node::Inner(inner) => {
            for branch in 0u8..16 {
                if let Some(child) = inner.child(branch) {
                    collect_added(child, out);
                }
            }
        }
    }
}

fn collect_removed<'s, 'a>(node: &'s NodeRef<'a>, out: &mut Vec<DiffOp<'s, 'a>>) {
    match &**node {
        Node::Leaf(leaf) => out.push(DiffOp::Removed(leaf.key())),
        Node::Inner(inner) => {
            for branch in 0u8..16 {
                if let Some(child) = inner.child(branch) {
                    collect_removed(child, out);
                }
            }
        }
    }
}

fn insert_at<'a>(
    node_rc: &mut NodeRef<'a>,
    key: Key,
    item: Item<'a>,
    leaf_type: LeafType,
    mode: SetMode,
) -> Result<InsertOutcome> {
    let inner = Rc::make_mut(node_rc)
        .as_inner_mut()
        .ok_or(Error::Internal("insert_at descended into a leaf"))?;
    let depth = inner.depth();
    let branch = key.select_branch(depth)?;
    let branch_is_leaf = inner.child(branch).map(Node::is_leaf);

    match branch_is_leaf {
        None => {
            if mode == SetMode::UpdateOnly {
                return Ok(InsertOutcome::NotFound);
            }
            inner.set_child(branch, Some(Rc::new(Node::new_leaf(item, leaf_type))));
            Ok(InsertOutcome::Added)
        }
        Some(true) => {
            let existing_key = inner.child(branch).unwrap().as_leaf().unwrap().key();
            if existing_key == key {
                if mode == SetMode::AddOnly {
                    return Ok(InsertOutcome::AlreadyExists);
                }
                inner.set_child(branch, Some(Rc::new(Node::new_leaf(item, leaf_type))));
                Ok(InsertOutcome::Updated)
            } else {
                if mode == SetMode::UpdateOnly {
                    return Ok(InsertOutcome::NotFound);
                }
                let existing_child = inner.child_clone(branch).unwrap();
                let subtree = build_collision_chain(depth + 1, existing_child, item, key, leaf_type)?;
                inner.set_child(branch, Some(subtree));
                Ok(InsertOutcome::Added)
            }
        }
        Some(false) => {
            let outcome = {
                let slot = inner.child_slot_mut(branch);
                let child_rc = slot.as_mut().expect("branch_mask says this slot is occupied");
                insert_at(child_rc, key, item, leaf_type, mode)?
            };
            if matches!(outcome, InsertOutcome::Added | InsertOutcome::Updated) {
                inner.invalidate();
            }
            Ok(outcome)
        }
    }
}

/// Builds a fresh chain of inner nodes from `depth` downward to separate
/// `existing` (a leaf whose key collides with `new_key` up to `depth - 1`)
/// from a new leaf for `new_key`/`item`. Brand-new nodes, so no COW
/// cloning is needed here; only the caller's `set_child` that attaches the
/// resulting subtree touches a possibly-shared node.
fn build_collision_chain<'a>(
    depth: u8,
    existing: NodeRef<'a>,
    item: Item<'a>,
    new_key: Key,
    leaf_type: LeafType,
) -> Result<NodeRef<'a>> {
    if depth >= 64 {
        return Err(Error::MaxDepthExceeded);
    }
    let existing_key = existing
        .as_leaf()
        .ok_or(Error::Internal("build_collision_chain given a non-leaf"))?
        .key();
    let mut inner = InnerNode::new(depth);
    let existing_branch = existing_key.select_branch(depth)?;
    let new_branch = new_key.select_branch(depth)?;
    if existing_branch == new_branch {
        let child = build_collision_chain(depth + 1, existing, item, new_key, leaf_type)?;
        inner.set_child(existing_branch, Some(child));
    } else {
        inner.set_child(existing_branch, Some(existing));
        inner.set_child(new_branch, Some(Rc::new(Node::new_leaf(item, leaf_type))));
    }
    Ok(Rc::new(Node::Inner(inner)))
}

fn delete_at<'a>(node_rc: &mut NodeRef<'a>, key: Key, mode: CollapseMode) -> Result<bool> {
    let inner = Rc::make_mut(node_rc)
        .as_inner_mut()
        .ok_or(Error::Internal("delete_at descended into a leaf"))?;
    let depth = inner.depth();
    let branch = key.select_branch(depth)?;
    let branch_is_leaf = inner.child(branch).map(Node::is_leaf);

    match branch_is_leaf {
        None => Ok(false),
        Some(true) => {
            let matches = inner.child(branch).unwrap().as_leaf().unwrap().key() == key;
            if matches {
                inner.set_child(branch, None);
            }
            Ok(matches)
        }
        Some(false) => {
            let removed = {
                let slot = inner.child_slot_mut(branch);
                let child_rc = slot.as_mut().expect("branch_mask says this slot is occupied");
                delete_at(child_rc, key, mode)?
            };
            if removed {
                inner.invalidate();
                collapse_slot(inner, branch, mode);
            }
            Ok(removed)
        }
    }
}

enum CollapseAction<'a> {
    None,
    Clear,
    ReplaceWithLeaf(LeafNode<'a>),
    ReplaceWithInner(NodeRef<'a>),
}

/// After a removal below `parent`'s child at `branch`, collapses that child
/// if it is now empty or holds a single descendant eligible to be promoted
/// directly into `parent`'s slot.
fn collapse_slot<'a>(parent: &mut InnerNode<'a>, branch: u8, mode: CollapseMode) {
    let action = match parent.child(branch) {
        None => CollapseAction::None,
        Some(child) => match child.as_inner() {
            None => CollapseAction::None,
            Some(child_inner) => {
                if child_inner.num_children() == 0 {
                    CollapseAction::Clear
                } else if let Some((_, leaf)) = child_inner.only_child_leaf() {
                    CollapseAction::ReplaceWithLeaf(leaf.clone())
                } else if mode == CollapseMode::LeavesAndInners {
                    match child_inner.only_child_inner() {
                        Some((_, inner_child)) => CollapseAction::ReplaceWithInner(Rc::clone(inner_child)),
                        None => CollapseAction::None,
                    }
                } else {
                    CollapseAction::None
                }
            }
        },
    };
    match action {
        CollapseAction::None => {}
        CollapseAction::Clear => parent.set_child(branch, None),
        CollapseAction::ReplaceWithLeaf(leaf) => parent.set_child(branch, Some(Rc::new(Node::Leaf(leaf)))),
        CollapseAction::ReplaceWithInner(inner_rc) => parent.set_child(branch, Some(inner_rc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Slice;

    fn item(last_byte: u8, value: &'static [u8]) -> Item<'static> {
        let mut kb = [0u8; 32];
        kb[31] = last_byte;
        Item::new(Key::from_bytes(kb), Slice::Borrowed(value))
    }

    #[test]
    fn empty_map_hashes_to_zero() {
        let map = SHAMap::new(LeafType::AccountState);
        assert!(map.get_hash().is_zero());
    }

    #[test]
    fn single_known_leaf_matches_fixture() {
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(Item::new(Key::ZERO, Slice::Borrowed(&[0u8; 32])), SetMode::AddOrUpdate)
            .unwrap();
        assert_eq!(
            map.get_hash().hex(),
            "B992A0C0480B32A2F32308EA2D64E85586A3DAF663F7B383806B5C4CEA84D8BF"
        );
    }

    #[test]
    fn add_then_add_again_fails() {
        let mut map = SHAMap::new(LeafType::AccountState);
        assert!(map.add_item(item(1, b"a")).unwrap());
        assert!(!map.add_item(item(1, b"b")).unwrap());
    }

    #[test]
    fn update_missing_key_fails() {
        let mut map = SHAMap::new(LeafType::AccountState);
        assert!(!map.update_item(item(1, b"a")).unwrap());
    }

    #[test]
    fn remove_then_reinsert_reproduces_hash() {
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(item(1, b"a"), SetMode::AddOrUpdate).unwrap();
        map.set_item(item(2, b"b"), SetMode::AddOrUpdate).unwrap();
        let before = map.get_hash();
        map.set_item(item(3, b"c"), SetMode::AddOrUpdate).unwrap();
        assert!(map.remove_item(Key::from_bytes({
            let mut k = [0u8; 32];
            k[31] = 3;
            k
        }))
        .unwrap());
        assert_eq!(map.get_hash(), before);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(item(1, b"a"), SetMode::AddOrUpdate).unwrap();
        let snap = map.snapshot();
        let before = snap.get_hash();
        map.set_item(item(2, b"b"), SetMode::AddOrUpdate).unwrap();
        assert_eq!(snap.get_hash(), before);
        assert_ne!(map.get_hash(), before);
    }

    #[test]
    fn collision_chain_respects_depth_limit() {
        // Two keys identical in every nibble collide maximally; inserting
        // both must succeed by diverging at the final nibble, not error.
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 0x00;
        b[31] = 0x01;
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(Item::new(Key::from_bytes(a), Slice::Borrowed(b"a")), SetMode::AddOrUpdate)
            .unwrap();
        map.set_item(Item::new(Key::from_bytes(b), Slice::Borrowed(b"b")), SetMode::AddOrUpdate)
            .unwrap();
        assert!(map.contains(Key::from_bytes(a)).unwrap());
        assert!(map.contains(Key::from_bytes(b)).unwrap());
    }

    #[test]
    fn diff_reports_added_updated_removed() {
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(item(1, b"a"), SetMode::AddOrUpdate).unwrap();
        map.set_item(item(2, b"b"), SetMode::AddOrUpdate).unwrap();
        let before = map.snapshot();

        map.set_item(item(2, b"bb"), SetMode::AddOrUpdate).unwrap(); // updated
        map.set_item(item(3, b"c"), SetMode::AddOrUpdate).unwrap(); // added
        let mut key1 = [0u8; 32];
        key1[31] = 1;
        map.remove_item(Key::from_bytes(key1)).unwrap(); // removed

        let ops = before.diff_items(&map);
        let mut added = 0;
        let mut updated = 0;
        let mut removed = 0;
        for op in &ops {
            match op {
                DiffOp::Added(_) => added += 1,
                DiffOp::Updated(_) => updated += 1,
                DiffOp::Removed(_) => removed += 1,
            }
        }
        assert_eq!((added, updated, removed), (1, 1, 1));
    }

    #[test]
    fn diff_of_identical_snapshot_is_empty() {
        let mut map = SHAMap::new(LeafType::AccountState);
        map.set_item(item(1, b"a"), SetMode::AddOrUpdate).unwrap();
        let snap = map.snapshot();
        assert!(snap.diff_items(&map).is_empty());
    }
}
