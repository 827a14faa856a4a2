//! The copy-on-write Merkle B-tree.
//!
//! Every node is an immutable block in a [`HashVerifyingStorage`]. A write
//! descends from the root to the affected node, then rebuilds the path
//! bottom-up: modified nodes are stored as new blocks and each parent is
//! re-pointed at its child's new hash. Untouched subtrees are shared with
//! earlier versions, so every historical root stays readable.
//!
//! ```text
//!            root'                root
//!           /     \              /    \
//!        A'        B   <---- A         B
//!       / \                 / \
//!      a'  c               a   c
//! ```
//!
//! Nothing in memory changes until every new block has been stored, so a
//! failed write leaves the tree exactly as it was.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use vellum_core::{ContentHash, Entry, OptionalHash, PublicKeyHash, SigningIdentity, Slot, TreeNode};
use vellum_store::{ContentAddressedStorage, HashVerifyingStorage, StorageExt};

use crate::config::TreeConfig;
use crate::error::{Error, Result};

/// A node on the descent path, opened up for editing.
///
/// `index` is the child slot the descent continued into.
struct Frame {
    entries: Vec<Entry>,
    children: Vec<ContentHash>,
    index: usize,
}

impl Frame {
    fn open(node: TreeNode, index: usize) -> Self {
        let (entries, children) = node.into_parts();
        Self {
            entries,
            children,
            index,
        }
    }
}

/// Result of settling a modified node after an insert.
enum Rebuilt {
    /// Still fits; not yet stored.
    One(TreeNode),
    /// Overflowed; both halves are stored, the median moves up.
    Split(ContentHash, Entry, ContentHash),
}

/// A Merkle B-tree mapping byte-string keys to content hashes.
pub struct MerkleBTree<S> {
    storage: Arc<HashVerifyingStorage<S>>,
    root: TreeNode,
    root_hash: ContentHash,
    config: TreeConfig,
}

impl<S> Clone for MerkleBTree<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            root: self.root.clone(),
            root_hash: self.root_hash,
            config: self.config.clone(),
        }
    }
}

impl<S> std::fmt::Debug for MerkleBTree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerkleBTree")
            .field("root_hash", &self.root_hash)
            .field("max_children", &self.config.max_children)
            .finish()
    }
}

impl<S: ContentAddressedStorage> MerkleBTree<S> {
    /// Create a new, empty tree and store its root.
    pub async fn create(
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        storage: Arc<HashVerifyingStorage<S>>,
        config: TreeConfig,
    ) -> Result<Self> {
        config.validate()?;
        let root = TreeNode::empty();
        let bytes = root.serialize()?;
        let root_hash = storage.put_signed(owner, writer, Bytes::from(bytes)).await?;
        debug!(root = %root_hash, "created empty tree");
        Ok(Self {
            storage,
            root: root.with_hash(root_hash),
            root_hash,
            config,
        })
    }

    /// Open the tree whose root is stored under `root_hash`.
    pub async fn load(
        root_hash: &ContentHash,
        storage: Arc<HashVerifyingStorage<S>>,
        config: TreeConfig,
    ) -> Result<Self> {
        config.validate()?;
        let root = fetch_node(&storage, root_hash).await?;
        Ok(Self {
            storage,
            root,
            root_hash: *root_hash,
            config,
        })
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Hash of the current root block.
    pub fn root_hash(&self) -> ContentHash {
        self.root_hash
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<HashVerifyingStorage<S>> {
        &self.storage
    }

    /// Look up `key`. `None` if absent.
    pub async fn get(&self, key: &[u8]) -> Result<OptionalHash> {
        let mut owned;
        let mut node = &self.root;
        loop {
            match node.search(key) {
                Slot::Found(i) => return Ok(node.entries()[i].value),
                Slot::Child(_) if node.is_leaf() => return Ok(None),
                Slot::Child(i) => {
                    let child = node.children()[i];
                    owned = self.fetch(&child).await?;
                    node = &owned;
                }
            }
        }
    }

    /// Map `key` to `value` if it currently maps to `existing`.
    ///
    /// Returns the new root hash. Writing the value a key already holds is
    /// a no-op that returns the unchanged root hash.
    pub async fn put(
        &mut self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        key: &[u8],
        existing: OptionalHash,
        value: ContentHash,
    ) -> Result<ContentHash> {
        let (mut path, node, slot) = self.descend(key).await?;

        let current = match slot {
            Slot::Found(i) => node.entries()[i].value,
            Slot::Child(_) => None,
        };
        check_expected(key, existing, current)?;
        if current == Some(value) {
            return Ok(self.root_hash);
        }

        let (mut entries, children) = node.into_parts();
        match slot {
            Slot::Found(i) => entries[i].value = Some(value),
            Slot::Child(i) => entries.insert(i, Entry::new(key, Some(value))),
        }

        let mut rebuilt = self
            .settle(owner, writer, TreeNode::from_parts(entries, children)?)
            .await?;
        while let Some(mut frame) = path.pop() {
            match rebuilt {
                Rebuilt::One(child) => {
                    frame.children[frame.index] = self.store(owner, writer, &child).await?;
                }
                Rebuilt::Split(left, median, right) => {
                    frame.children[frame.index] = left;
                    frame.entries.insert(frame.index, median);
                    frame.children.insert(frame.index + 1, right);
                }
            }
            rebuilt = self
                .settle(owner, writer, TreeNode::from_parts(frame.entries, frame.children)?)
                .await?;
        }

        let root = match rebuilt {
            Rebuilt::One(root) => root,
            Rebuilt::Split(left, median, right) => {
                debug!("root split, tree grows a level");
                TreeNode::internal(vec![median], vec![left, right])?
            }
        };
        self.commit(owner, writer, root).await
    }

    /// Remove `key` if it currently maps to `existing`.
    ///
    /// Removing an absent key with `existing == None` is a no-op.
    pub async fn remove(
        &mut self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        key: &[u8],
        existing: OptionalHash,
    ) -> Result<ContentHash> {
        let (mut path, node, slot) = self.descend(key).await?;

        let current = match slot {
            Slot::Found(i) => node.entries()[i].value,
            Slot::Child(_) => None,
        };
        check_expected(key, existing, current)?;
        let found = match (slot, current) {
            (Slot::Found(i), Some(_)) => i,
            _ => return Ok(self.root_hash),
        };

        // Take the entry out of a leaf. An internal entry is replaced by its
        // in-order predecessor, which is then taken from its leaf instead.
        let (mut entries, mut children) = if node.is_leaf() {
            let (mut entries, children) = node.into_parts();
            entries.remove(found);
            (entries, children)
        } else {
            let at = path.len();
            let mut child = self.fetch(&node.children()[found]).await?;
            path.push(Frame::open(node, found));
            while !child.is_leaf() {
                let last = child.children().len() - 1;
                let next = self.fetch(&child.children()[last]).await?;
                path.push(Frame::open(child, last));
                child = next;
            }
            let (mut entries, children) = child.into_parts();
            let predecessor = entries
                .pop()
                .ok_or_else(|| Error::MalformedNode("empty non-root leaf".into()))?;
            path[at].entries[found] = predecessor;
            (entries, children)
        };

        let min = self.config.min_entries();
        while let Some(mut frame) = path.pop() {
            if entries.len() >= min {
                let child = TreeNode::from_parts(entries, children)?;
                frame.children[frame.index] = self.store(owner, writer, &child).await?;
            } else {
                self.rebalance(owner, writer, &mut frame, entries, children)
                    .await?;
            }
            entries = frame.entries;
            children = frame.children;
        }

        let root = if entries.is_empty() && children.len() == 1 {
            debug!("root emptied, tree shrinks a level");
            self.fetch(&children[0]).await?
        } else {
            TreeNode::from_parts(entries, children)?
        };
        self.commit(owner, writer, root).await
    }

    /// Number of keys with a value.
    pub async fn size(&self) -> Result<usize> {
        self.apply_to_all_mappings(0usize, |n, _, _| n + 1).await
    }

    /// Fold `f` over every `(key, value)` pair in ascending key order.
    pub async fn apply_to_all_mappings<T, F>(&self, init: T, mut f: F) -> Result<T>
    where
        F: FnMut(T, &[u8], &ContentHash) -> T,
    {
        let mut acc = init;
        let mut stack: Vec<(TreeNode, usize)> = Vec::new();
        let mut pending = Some(self.root.clone());
        loop {
            if let Some(node) = pending.take() {
                if node.is_leaf() {
                    for entry in node.entries() {
                        if let Some(value) = &entry.value {
                            acc = f(acc, &entry.key, value);
                        }
                    }
                } else {
                    let first = node.children()[0];
                    stack.push((node, 0));
                    pending = Some(self.fetch(&first).await?);
                }
                continue;
            }

            // Subtree `i` of the top node is done: visit entry `i`, then subtree `i + 1`
            let Some((node, i)) = stack.pop() else {
                break;
            };
            if i < node.len() {
                let entry = &node.entries()[i];
                if let Some(value) = &entry.value {
                    acc = f(acc, &entry.key, value);
                }
                let next = node.children()[i + 1];
                stack.push((node, i + 1));
                pending = Some(self.fetch(&next).await?);
            }
        }
        Ok(acc)
    }

    /// Indented dump of the whole tree, for debugging.
    pub async fn render(&self) -> Result<String> {
        let mut out = String::new();
        let mut stack: Vec<(TreeNode, usize)> = vec![(self.root.clone(), 0)];
        while let Some((node, depth)) = stack.pop() {
            let indent = "  ".repeat(depth);
            let hash = node
                .hash()
                .map(|h| h.to_hex())
                .unwrap_or_else(|| "unstored".into());
            let keys: Vec<String> = node.entries().iter().map(|e| display_key(&e.key)).collect();
            out.push_str(&format!("{}{} [{}]\n", indent, hash, keys.join(", ")));
            for child in node.children().iter().rev() {
                stack.push((self.fetch(child).await?, depth + 1));
            }
        }
        Ok(out)
    }

    /// Walk from the root towards `key`.
    ///
    /// Returns the internal nodes passed through, the node where the search
    /// ended (the one holding `key`, or the leaf it belongs in) and the slot.
    async fn descend(&self, key: &[u8]) -> Result<(Vec<Frame>, TreeNode, Slot)> {
        let mut path = Vec::new();
        let mut node = self.root.clone();
        loop {
            match node.search(key) {
                Slot::Child(i) if !node.is_leaf() => {
                    let child = self.fetch(&node.children()[i]).await?;
                    path.push(Frame::open(node, i));
                    node = child;
                }
                slot => return Ok((path, node, slot)),
            }
        }
    }

    /// Split `node` if it is full; otherwise hand it back unstored.
    async fn settle(
        &self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        node: TreeNode,
    ) -> Result<Rebuilt> {
        if node.len() < self.config.max_children {
            return Ok(Rebuilt::One(node));
        }
        let (left, median, right) = node.split()?;
        let left = self.store(owner, writer, &left).await?;
        let right = self.store(owner, writer, &right).await?;
        debug!(%left, %right, "split node");
        Ok(Rebuilt::Split(left, median, right))
    }

    /// Refill the underfull child at `frame.index`.
    ///
    /// Borrows through the separator from the left sibling, else the right;
    /// when neither can spare an entry, merges with the left sibling, else
    /// the right.
    async fn rebalance(
        &self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        frame: &mut Frame,
        mut entries: Vec<Entry>,
        mut children: Vec<ContentHash>,
    ) -> Result<()> {
        let min = self.config.min_entries();
        let idx = frame.index;

        let mut left = None;
        if idx > 0 {
            let (mut le, mut lc) = self.fetch(&frame.children[idx - 1]).await?.into_parts();
            if le.len() > min {
                let moved = le
                    .pop()
                    .ok_or_else(|| Error::MalformedNode("empty sibling".into()))?;
                let separator = std::mem::replace(&mut frame.entries[idx - 1], moved);
                entries.insert(0, separator);
                if let Some(child) = lc.pop() {
                    children.insert(0, child);
                }
                frame.children[idx - 1] = self.store_parts(owner, writer, le, lc).await?;
                frame.children[idx] = self.store_parts(owner, writer, entries, children).await?;
                debug!(index = idx, "borrowed from left sibling");
                return Ok(());
            }
            left = Some((le, lc));
        }

        let mut right = None;
        if idx + 1 < frame.children.len() {
            let (mut re, mut rc) = self.fetch(&frame.children[idx + 1]).await?.into_parts();
            if re.len() > min {
                let moved = re.remove(0);
                let separator = std::mem::replace(&mut frame.entries[idx], moved);
                entries.push(separator);
                if !rc.is_empty() {
                    children.push(rc.remove(0));
                }
                frame.children[idx] = self.store_parts(owner, writer, entries, children).await?;
                frame.children[idx + 1] = self.store_parts(owner, writer, re, rc).await?;
                debug!(index = idx, "borrowed from right sibling");
                return Ok(());
            }
            right = Some((re, rc));
        }

        match (left, right) {
            (Some((mut le, mut lc)), _) => {
                let separator = frame.entries.remove(idx - 1);
                frame.children.remove(idx);
                le.push(separator);
                le.extend(entries);
                lc.extend(children);
                frame.children[idx - 1] = self.store_parts(owner, writer, le, lc).await?;
                debug!(index = idx, "merged into left sibling");
            }
            (None, Some((re, rc))) => {
                let separator = frame.entries.remove(idx);
                frame.children.remove(idx + 1);
                entries.push(separator);
                entries.extend(re);
                children.extend(rc);
                frame.children[idx] = self.store_parts(owner, writer, entries, children).await?;
                debug!(index = idx, "merged right sibling in");
            }
            (None, None) => {
                return Err(Error::MalformedNode(
                    "internal node with a single child".into(),
                ))
            }
        }
        Ok(())
    }

    async fn fetch(&self, hash: &ContentHash) -> Result<TreeNode> {
        fetch_node(&self.storage, hash).await
    }

    /// Store `node` unless it already has a hash.
    async fn store(
        &self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        node: &TreeNode,
    ) -> Result<ContentHash> {
        if let Some(hash) = node.hash() {
            return Ok(hash);
        }
        let bytes = node.serialize()?;
        Ok(self
            .storage
            .put_signed(owner, writer, Bytes::from(bytes))
            .await?)
    }

    async fn store_parts(
        &self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        entries: Vec<Entry>,
        children: Vec<ContentHash>,
    ) -> Result<ContentHash> {
        self.store(owner, writer, &TreeNode::from_parts(entries, children)?)
            .await
    }

    /// Store `root` and make it current.
    async fn commit(
        &mut self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        root: TreeNode,
    ) -> Result<ContentHash> {
        let hash = self.store(owner, writer, &root).await?;
        debug!(from = %self.root_hash, to = %hash, entries = root.len(), "committed root");
        self.root = root.with_hash(hash);
        self.root_hash = hash;
        Ok(hash)
    }
}

async fn fetch_node<S: ContentAddressedStorage>(
    storage: &HashVerifyingStorage<S>,
    hash: &ContentHash,
) -> Result<TreeNode> {
    let bytes = storage
        .get(hash)
        .await?
        .ok_or_else(|| Error::NotFound(format!("node {}", hash)))?;
    Ok(TreeNode::deserialize(&bytes)?.with_hash(*hash))
}

fn check_expected(key: &[u8], expected: OptionalHash, actual: OptionalHash) -> Result<()> {
    if expected != actual {
        return Err(Error::CasMismatch {
            key: key.to_vec(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Printable keys as quoted text, anything else as hex.
fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if !s.chars().any(char::is_control) => format!("{:?}", s),
        _ => hex::encode(key),
    }
}
