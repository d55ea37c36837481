use std::cmp::Ordering;
use std::collections::HashMap;
use std::mem::size_of;

use crate::error::Result;
use crate::meta::{Accumulate, MetaInfo};
use crate::types::CasePolicy;

#[derive(Debug)]
pub struct MetaGroup {
    info: MetaInfo,
    case: CasePolicy,
    counts: HashMap<String, usize>,
    groups: Vec<(String, usize)>,
    na_value: bool,
    n: usize,
    na: usize,
    finalized: bool,
}

impl MetaGroup {
    pub fn new(info: MetaInfo, case: CasePolicy) -> Self {
        Self {
            info,
            case,
            counts: HashMap::new(),
            groups: Vec::new(),
            na_value: false,
            n: 0,
            na: 0,
            finalized: false,
        }
    }

    pub fn case_policy(&self) -> CasePolicy {
        self.case
    }

    pub fn groups(&self) -> &[(String, usize)] {
        &self.groups
    }

    pub fn count(&self, value: &str) -> Option<usize> {
        let key = self.case.key(value);
        if self.finalized {
            self.groups
                .iter()
                .find(|(group, _)| *group == key.as_ref())
                .map(|(_, count)| *count)
        } else {
            self.counts.get(key.as_ref()).copied()
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn na_count(&self) -> usize {
        self.na
    }
}

/// Integer-valued keys first in numeric order, then the rest lexicographically.
fn group_order(left: &str, right: &str) -> Ordering {
    match (left.parse::<i64>(), right.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| left.cmp(right)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

impl Accumulate for MetaGroup {
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
        self.n += 1;
        let key = self.case.key(token);
        if let Some(count) = self.counts.get_mut(key.as_ref()) {
            *count += 1;
        } else {
            self.counts.insert(key.into_owned(), 1);
        }
        Ok(())
    }

    fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        let mut groups: Vec<(String, usize)> = self.counts.drain().collect();
        groups.sort_by(|a, b| group_order(&a.0, &b.0));
        self.groups = groups;
    }

    fn is_na(&self) -> bool {
        self.na_value
    }

    fn memory_usage(&self) -> usize {
        let entries = self.counts.len() + self.groups.len();
        let keys: usize = self
            .counts
            .keys()
            .map(String::capacity)
            .chain(self.groups.iter().map(|(k, _)| k.capacity()))
            .sum();
        entries * size_of::<(String, usize)>() + keys
    }
}
