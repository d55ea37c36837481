use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::meta::{MetaInfo, MetaRef, RowView};

#[derive(Debug, Clone, Copy)]
pub struct TableKey(pub f64);

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TableKey {}

impl PartialOrd for TableKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug)]
pub struct MetaCrossTable {
    info: MetaInfo,
    title: String,
    x: MetaRef,
    y: MetaRef,
    cells: BTreeMap<TableKey, BTreeMap<TableKey, usize>>,
    x_totals: BTreeMap<TableKey, usize>,
    y_totals: BTreeMap<TableKey, usize>,
    /// Rows where x is missing, by y value.
    x_na: BTreeMap<TableKey, usize>,
    /// Rows where y is missing, by x value.
    y_na: BTreeMap<TableKey, usize>,
    both_na: usize,
    total: usize,
    numeric: bool,
}

impl MetaCrossTable {
    pub fn new(info: MetaInfo, title: impl Into<String>, x: MetaRef, y: MetaRef) -> Self {
        Self {
            info,
            title: title.into(),
            x,
            y,
            cells: BTreeMap::new(),
            x_totals: BTreeMap::new(),
            y_totals: BTreeMap::new(),
            x_na: BTreeMap::new(),
            y_na: BTreeMap::new(),
            both_na: 0,
            total: 0,
            numeric: true,
        }
    }

    pub fn info(&self) -> &MetaInfo {
        &self.info
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn put_row(&mut self, row: &RowView<'_>) {
        if !self.numeric {
            return;
        }
        let (Some(x), Some(y)) = (row.get(self.x), row.get(self.y)) else {
            return;
        };
        if !x.is_numeric() || !y.is_numeric() {
            return;
        }
        match (x.is_na(), y.is_na()) {
            (false, false) => {
                let (kx, ky) = (TableKey(x.value()), TableKey(y.value()));
                *self.cells.entry(kx).or_default().entry(ky).or_insert(0) += 1;
                *self.x_totals.entry(kx).or_insert(0) += 1;
                *self.y_totals.entry(ky).or_insert(0) += 1;
                self.total += 1;
            }
            (true, false) => *self.x_na.entry(TableKey(y.value())).or_insert(0) += 1,
            (false, true) => *self.y_na.entry(TableKey(x.value())).or_insert(0) += 1,
            (true, true) => self.both_na += 1,
        }
    }

    pub fn finalize(&mut self, row: &RowView<'_>) {
        let numeric = [self.x, self.y]
            .into_iter()
            .all(|meta| row.get(meta).is_some_and(|m| m.is_numeric()));
        if !numeric {
            self.numeric = false;
            self.cells.clear();
            self.x_totals.clear();
            self.y_totals.clear();
            self.x_na.clear();
            self.y_na.clear();
        }
    }

    pub fn count(&self, x: f64, y: f64) -> usize {
        self.cells
            .get(&TableKey(x))
            .and_then(|row| row.get(&TableKey(y)))
            .copied()
            .unwrap_or(0)
    }

    pub fn x_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.x_totals.keys().map(|k| k.0)
    }

    pub fn y_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.y_totals.keys().map(|k| k.0)
    }

    pub fn x_total(&self, x: f64) -> usize {
        self.x_totals.get(&TableKey(x)).copied().unwrap_or(0)
    }

    pub fn y_total(&self, y: f64) -> usize {
        self.y_totals.get(&TableKey(y)).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn x_na_by_y(&self) -> impl Iterator<Item = (f64, usize)> + '_ {
        self.x_na.iter().map(|(k, n)| (k.0, *n))
    }

    pub fn y_na_by_x(&self) -> impl Iterator<Item = (f64, usize)> + '_ {
        self.y_na.iter().map(|(k, n)| (k.0, *n))
    }

    pub fn both_na(&self) -> usize {
        self.both_na
    }
}
