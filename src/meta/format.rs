use crate::error::Result;
use crate::meta::numeric::{ParsedToken, parse_token};
use crate::meta::{Accumulate, MetaInfo};

/// Numeric type check without statistics, for columns such as position.
#[derive(Debug)]
pub struct MetaFormat {
    info: MetaInfo,
    numeric: bool,
    na_value: bool,
    value: f64,
    n: usize,
    na: usize,
}

impl MetaFormat {
    pub fn new(info: MetaInfo) -> Self {
        Self {
            info,
            numeric: true,
            na_value: false,
            value: f64::NAN,
            n: 0,
            na: 0,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn is_na(&self) -> bool {
        self.na_value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn na_count(&self) -> usize {
        self.na
    }

    fn mark_na(&mut self) {
        self.na_value = true;
        self.na += 1;
        self.value = f64::NAN;
    }
}

impl Accumulate for MetaFormat {
    fn info(&self) -> &MetaInfo {
        &self.info
    }

    fn put(&mut self, token: &str) -> Result<()> {
        if !self.numeric {
            return Ok(());
        }
        if self.info.is_na_token(token) {
            self.mark_na();
            return Ok(());
        }
        match parse_token(token) {
            ParsedToken::Value(value) => {
                self.na_value = false;
                self.value = value;
                self.n += 1;
            }
            ParsedToken::Missing => self.mark_na(),
            ParsedToken::Invalid => {
                self.numeric = false;
                self.na_value = true;
                self.value = f64::NAN;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) {
        if self.n == 0 {
            self.numeric = false;
        }
    }

    fn is_na(&self) -> bool {
        self.na_value
    }

    fn memory_usage(&self) -> usize {
        0
    }
}
