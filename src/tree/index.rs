//! Level-order index arithmetic
//!
//! Indices follow the TreeKEM convention: the root is 0, the children of
//! `n` are `2n + 1` and `2n + 2`. The arithmetic needs no tree access.
//! [`assign`] relabels a whole tree breadth-first, left before right; the
//! arithmetic and the labels agree exactly when the tree shape is complete.

use crate::model::{Node, NodeId};
use std::collections::{HashMap, VecDeque};

/// Parent index; `None` for the root
pub fn parent(n: usize) -> Option<usize> {
    if n == 0 {
        None
    } else {
        Some((n - 1) / 2)
    }
}

pub fn left_child(n: usize) -> usize {
    2 * n + 1
}

pub fn right_child(n: usize) -> usize {
    2 * n + 2
}

/// Sibling index; `None` for the root
pub fn sibling(n: usize) -> Option<usize> {
    if n == 0 {
        None
    } else if n % 2 == 1 {
        Some(n + 1)
    } else {
        Some(n - 1)
    }
}

pub fn is_left_child(n: usize) -> bool {
    n > 0 && n % 2 == 1
}

pub fn is_right_child(n: usize) -> bool {
    n > 0 && n % 2 == 0
}

/// Relabel every node reachable from `root` with 0, 1, 2, ... in
/// breadth-first order. Returns the number of nodes labelled.
pub(crate) fn assign(nodes: &mut HashMap<NodeId, Node>, root: Option<NodeId>) -> usize {
    let mut queue: VecDeque<NodeId> = root.into_iter().collect();
    let mut next = 0;

    while let Some(id) = queue.pop_front() {
        let Some(node) = nodes.get_mut(&id) else {
            continue;
        };
        node.index = next;
        next += 1;

        if let Some(left) = node.left {
            queue.push_back(left);
        }
        if let Some(right) = node.right {
            queue.push_back(right);
        }
    }

    next
}
