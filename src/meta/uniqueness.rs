use std::mem::size_of;

use crate::error::{QcError, Result};
use crate::meta::{Accumulate, HEAP_INCREMENT, MetaInfo};
use crate::types::cmp_ignore_case;

#[derive(Debug)]
pub struct MetaUniqueness {
    info: MetaInfo,
    values: Vec<String>,
    value_bytes: usize,
    duplicates: Vec<String>,
    na_value: bool,
    n: usize,
    na: usize,
    finalized: bool,
}

impl MetaUniqueness {
    pub fn new(info: MetaInfo, capacity: usize) -> Result<Self> {
        let mut values = Vec::new();
        values
            .try_reserve_exact(capacity)
            .map_err(|_| QcError::allocation(&info.actual_name, capacity, size_of::<String>()))?;
        Ok(Self {
            info,
            values,
            value_bytes: 0,
            duplicates: Vec::new(),
            na_value: false,
            n: 0,
            na: 0,
            finalized: false,
        })
    }

    /// Every value seen more than once, once each, in case-insensitive order.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn na_count(&self) -> usize {
        self.na
    }
}

impl Accumulate for MetaUniqueness {
    fn info(&self) -> &MetaInfo {
        &self.info
    }

    fn put(&mut self, token: &str) -> Result<()> {
        if self.info.is_na_token(token) {
            self.na_value = true;
            self.na += 1;
            return Ok(());
        }
        self.na_value = false;
        if self.values.len() == self.values.capacity() {
            let requested = self.values.capacity() + HEAP_INCREMENT;
            self.values
                .try_reserve_exact(HEAP_INCREMENT)
                .map_err(|_| QcError::allocation(&self.info.actual_name, requested, size_of::<String>()))?;
        }
        self.value_bytes += token.len();
        self.values.push(token.to_string());
        self.n += 1;
        Ok(())
    }

    fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        let mut values = std::mem::take(&mut self.values);
        values.sort_by(|a, b| cmp_ignore_case(a, b));

        let mut start = 0;
        while start < values.len() {
            let mut end = start + 1;
            while end < values.len() && values[end].eq_ignore_ascii_case(&values[start]) {
                end += 1;
            }
            if end - start > 1 {
                self.duplicates.push(std::mem::take(&mut values[start]));
            }
            start = end;
        }
        self.value_bytes = 0;
    }

    fn is_na(&self) -> bool {
        self.na_value
    }

    fn memory_usage(&self) -> usize {
        self.values.capacity() * size_of::<String>() + self.value_bytes
    }
}
