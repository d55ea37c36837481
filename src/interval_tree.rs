//! Augmented AVL interval tree with per-interval tier tags.
//!
//! Nodes live in an arena and are ordered by `(start, end, insertion order)`.
//! Every node stores the largest end coordinate of its subtree so overlap
//! queries can skip whole branches. Intervals are closed: `[start, end]`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Node<V> {
    start: u64,
    end: u64,
    value: V,
    tag: u64,
    max_end: u64,
    height: i32,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct IntervalTree<V> {
    nodes: Vec<Node<V>>,
    root: Option<usize>,
}

impl<V> Default for IntervalTree<V> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<V> IntervalTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn height(&self) -> i32 {
        self.height_of(self.root)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    pub fn add(&mut self, start: u64, end: u64, value: V) {
        self.add_tagged(start, end, value, 0);
    }

    fn add_tagged(&mut self, start: u64, end: u64, value: V, tag: u64) {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            start,
            end,
            value,
            tag,
            max_end: end,
            height: 1,
            left: None,
            right: None,
        });
        self.root = Some(self.insert_at(self.root, idx));
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64, &V)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.in_order(self.root, &mut order);
        order.into_iter().map(|idx| {
            let node = &self.nodes[idx];
            (node.start, node.end, &node.value)
        })
    }

    /// Values of every interval overlapping `[qstart, qend]`, in interval order.
    pub fn intersecting(&self, qstart: u64, qend: u64) -> Vec<&V> {
        let mut hits = Vec::new();
        self.collect_overlaps(self.root, qstart, qend, &mut hits);
        hits.into_iter().map(|idx| &self.nodes[idx].value).collect()
    }

    /// Re-tag the intervals overlapping `[qstart - deviation, qend + deviation]`.
    /// Called with decreasing deviations, every interval ends up tagged with
    /// the smallest one at which it overlaps.
    pub fn mark_intersecting_intervals(&mut self, qstart: u64, qend: u64, deviation: u64) {
        let (lo, hi) = window(qstart, qend, deviation);
        let mut hits = Vec::new();
        self.collect_overlaps(self.root, lo, hi, &mut hits);
        for idx in hits {
            self.nodes[idx].tag = deviation;
        }
    }

    fn key(&self, idx: usize) -> (u64, u64, usize) {
        let node = &self.nodes[idx];
        (node.start, node.end, idx)
    }

    fn height_of(&self, idx: Option<usize>) -> i32 {
        idx.map_or(0, |i| self.nodes[i].height)
    }

    fn max_end_of(&self, idx: Option<usize>) -> u64 {
        idx.map_or(0, |i| self.nodes[i].max_end)
    }

    fn update(&mut self, idx: usize) {
        let (left, right) = (self.nodes[idx].left, self.nodes[idx].right);
        let height = 1 + self.height_of(left).max(self.height_of(right));
        let max_end = self.nodes[idx]
            .end
            .max(self.max_end_of(left))
            .max(self.max_end_of(right));
        let node = &mut self.nodes[idx];
        node.height = height;
        node.max_end = max_end;
    }

    fn balance_factor(&self, idx: usize) -> i32 {
        self.height_of(self.nodes[idx].left) - self.height_of(self.nodes[idx].right)
    }

    fn rotate_right(&mut self, idx: usize) -> usize {
        let Some(pivot) = self.nodes[idx].left else {
            return idx;
        };
        self.nodes[idx].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(idx);
        self.update(idx);
        self.update(pivot);
        pivot
    }

    fn rotate_left(&mut self, idx: usize) -> usize {
        let Some(pivot) = self.nodes[idx].right else {
            return idx;
        };
        self.nodes[idx].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(idx);
        self.update(idx);
        self.update(pivot);
        pivot
    }

    fn rebalance(&mut self, idx: usize) -> usize {
        self.update(idx);
        let balance = self.balance_factor(idx);
        if balance > 1 {
            if let Some(left) = self.nodes[idx].left
                && self.balance_factor(left) < 0
            {
                self.nodes[idx].left = Some(self.rotate_left(left));
            }
            return self.rotate_right(idx);
        }
        if balance < -1 {
            if let Some(right) = self.nodes[idx].right
                && self.balance_factor(right) > 0
            {
                self.nodes[idx].right = Some(self.rotate_right(right));
            }
            return self.rotate_left(idx);
        }
        idx
    }

    fn insert_at(&mut self, root: Option<usize>, new: usize) -> usize {
        let Some(idx) = root else {
            return new;
        };
        if self.key(new).cmp(&self.key(idx)) == Ordering::Less {
            let child = self.insert_at(self.nodes[idx].left, new);
            self.nodes[idx].left = Some(child);
        } else {
            let child = self.insert_at(self.nodes[idx].right, new);
            self.nodes[idx].right = Some(child);
        }
        self.rebalance(idx)
    }

    fn in_order(&self, idx: Option<usize>, out: &mut Vec<usize>) {
        let Some(idx) = idx else {
            return;
        };
        self.in_order(self.nodes[idx].left, out);
        out.push(idx);
        self.in_order(self.nodes[idx].right, out);
    }

    fn collect_overlaps(&self, idx: Option<usize>, lo: u64, hi: u64, out: &mut Vec<usize>) {
        let Some(idx) = idx else {
            return;
        };
        let node = &self.nodes[idx];
        if node.max_end < lo {
            return;
        }
        self.collect_overlaps(node.left, lo, hi, out);
        if node.start > hi {
            return;
        }
        if node.end >= lo {
            out.push(idx);
        }
        self.collect_overlaps(node.right, lo, hi, out);
    }
}

impl<V: Clone> IntervalTree<V> {
    // Copies the hits into `out`, tagged with `deviation`.
    pub fn get_intersecting_intervals(
        &self,
        qstart: u64,
        qend: u64,
        deviation: u64,
        out: &mut IntervalTree<V>,
    ) {
        let (lo, hi) = window(qstart, qend, deviation);
        let mut hits = Vec::new();
        self.collect_overlaps(self.root, lo, hi, &mut hits);
        for idx in hits {
            let node = &self.nodes[idx];
            out.add_tagged(node.start, node.end, node.value.clone(), deviation);
        }
    }

    pub fn get_marked_values(&self, out: &mut BTreeMap<u64, Vec<V>>) {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.in_order(self.root, &mut order);
        for idx in order {
            let node = &self.nodes[idx];
            out.entry(node.tag).or_default().push(node.value.clone());
        }
    }
}

fn window(qstart: u64, qend: u64, deviation: u64) -> (u64, u64) {
    (qstart.saturating_sub(deviation), qend.saturating_add(deviation))
}
