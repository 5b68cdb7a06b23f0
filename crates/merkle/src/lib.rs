//! # Merkle validator
//!
//! A per-SSTable tamper detector. Every serialized record written to a
//! table's data region contributes one SHA-1 leaf, in write order; the leaf
//! row is padded to the next power of two with hashes of the empty string,
//! and parents hash the concatenation of their children. Reads re-hash the
//! record bytes they decode and ask the tree whether a leaf-to-root path
//! reproduces the stored root — if not, the bytes on disk are not the bytes
//! that were written, and the lookup fails as corruption.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sha1::{Digest, Sha1};
use thiserror::Error;

/// SHA-1 digest width.
const HASH_LEN: usize = 20;

/// Upper bound on deserialized node count (guards against corrupt sizes).
const MAX_NODES: u64 = 1 << 28;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The serialized form declared an impossible shape.
    #[error("corrupt merkle tree")]
    Corrupt,
}

/// A complete binary hash tree stored as a flat level-order array.
///
/// Node `i`'s children live at `2i + 1` and `2i + 2`; the last
/// `padded_leaves` entries are the leaf row. Building from `n` leaves pads
/// to `2^⌈log2 n⌉`, so the array layout is always complete and the index
/// arithmetic needs no per-node bookkeeping.
pub struct MerkleTree {
    /// Number of real (unpadded) leaves.
    leaf_count: u64,
    nodes: Vec<[u8; HASH_LEN]>,
}

impl MerkleTree {
    /// Builds a tree over the given serialized record byte slices, in order.
    pub fn build<B: AsRef<[u8]>>(blocks: &[B]) -> Self {
        let leaf_count = blocks.len() as u64;
        let padded = blocks.len().next_power_of_two().max(1);

        let mut leaves: Vec<[u8; HASH_LEN]> = Vec::with_capacity(padded);
        for block in blocks {
            leaves.push(hash(block.as_ref()));
        }
        leaves.resize(padded, hash(&[]));

        // Level-order array, leaves last. Total nodes = 2 * padded - 1.
        let total = 2 * padded - 1;
        let mut nodes = vec![[0u8; HASH_LEN]; total];
        nodes[total - padded..].copy_from_slice(&leaves);
        for i in (0..total - padded).rev() {
            nodes[i] = hash_pair(&nodes[2 * i + 1], &nodes[2 * i + 2]);
        }

        Self { leaf_count, nodes }
    }

    /// The root hash.
    pub fn root(&self) -> &[u8; HASH_LEN] {
        &self.nodes[0]
    }

    /// Number of real leaves the tree was built over.
    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    /// Returns `true` iff some leaf carries the hash of `block` and the
    /// path from that leaf up to the root reproduces the stored root.
    pub fn verify(&self, block: &[u8]) -> bool {
        let target = hash(block);
        let padded = (self.nodes.len() + 1) / 2;
        let first_leaf = self.nodes.len() - padded;

        'leaves: for leaf in first_leaf..first_leaf + self.leaf_count.min(padded as u64) as usize {
            if self.nodes[leaf] != target {
                continue;
            }
            // Recompute the path to the root from this leaf.
            let mut idx = leaf;
            let mut acc = target;
            while idx > 0 {
                let parent = (idx - 1) / 2;
                let (left, right) = (2 * parent + 1, 2 * parent + 2);
                acc = if idx == left {
                    hash_pair(&acc, &self.nodes[right])
                } else {
                    hash_pair(&self.nodes[left], &acc)
                };
                if acc != self.nodes[parent] {
                    continue 'leaves;
                }
                idx = parent;
            }
            return acc == self.nodes[0];
        }
        false
    }

    /// Serializes the tree: `leaf_count:u64 | node_count:u64 | nodes`, all
    /// little-endian, nodes in level order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.nodes.len() * HASH_LEN);
        buf.write_u64::<LittleEndian>(self.leaf_count).unwrap();
        buf.write_u64::<LittleEndian>(self.nodes.len() as u64).unwrap();
        for node in &self.nodes {
            buf.extend_from_slice(node);
        }
        buf
    }

    /// Deserializes a tree previously written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MerkleError> {
        let mut rd = bytes;
        let leaf_count = rd.read_u64::<LittleEndian>()?;
        let node_count = rd.read_u64::<LittleEndian>()?;

        // A complete tree has 2^(h+1) - 1 nodes.
        if node_count == 0 || node_count > MAX_NODES || !(node_count + 1).is_power_of_two() {
            return Err(MerkleError::Corrupt);
        }
        let padded = ((node_count + 1) / 2) as usize;
        if leaf_count > padded as u64 {
            return Err(MerkleError::Corrupt);
        }

        let mut nodes = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            let mut node = [0u8; HASH_LEN];
            std::io::Read::read_exact(&mut rd, &mut node)?;
            nodes.push(node);
        }

        Ok(Self { leaf_count, nodes })
    }
}

impl std::fmt::Debug for MerkleTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerkleTree")
            .field("leaves", &self.leaf_count)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

fn hash(data: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn hash_pair(left: &[u8; HASH_LEN], right: &[u8; HASH_LEN]) -> [u8; HASH_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
