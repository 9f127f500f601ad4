//! Offset pagination shared by every listing operation.

use serde::{Deserialize, Serialize};

use crate::domain::constraints::MAX_PAGING_LIMIT;

/// Sanitized skip/take window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Paging {
    skip: i64,
    take: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Paging {
    /// Clamp raw caller input: `take` into `[0, 40]` (default 40), `skip` to `>= 0`.
    pub fn new(skip: Option<i64>, take: Option<i64>) -> Self {
        let take = match take {
            None => MAX_PAGING_LIMIT,
            Some(value) if value < 1 => 0,
            Some(value) if value > MAX_PAGING_LIMIT => MAX_PAGING_LIMIT,
            Some(value) => value,
        };
        let skip = match skip {
            Some(value) if value > 0 => value,
            _ => 0,
        };
        Self { skip, take }
    }

    pub fn first(count: i64) -> Self {
        Self::new(None, Some(count))
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn limit(&self) -> i64 {
        self.take
    }

    /// 1-based page the window starts on. A zero-sized window always reports page 1.
    pub fn current_page(&self) -> i64 {
        if self.take == 0 {
            return 1;
        }
        (self.skip as f64 / self.take as f64 + 1.0).floor() as i64
    }

    fn pages_left(&self, total: i64) -> i64 {
        if self.take == 0 {
            return 0;
        }
        let take = self.take as f64;
        let total_pages = (total as f64 / take).ceil();
        let left = (total_pages - (self.skip as f64 / take + 1.0)).floor() as i64;
        left.max(0)
    }

    pub fn build<T>(&self, data: Vec<T>, total: i64) -> PageResult<T> {
        let count = data.len() as i64;
        PageResult {
            count,
            current_page: self.current_page(),
            pages_left: self.pages_left(total),
            has_more: self.skip + count < total,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub count: i64,
    pub current_page: i64,
    pub pages_left: i64,
    pub has_more: bool,
}

impl<T> PageResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            data: self.data.into_iter().map(f).collect(),
            count: self.count,
            current_page: self.current_page,
            pages_left: self.pages_left,
            has_more: self.has_more,
        }
    }

    /// Swap the data for an already transformed list of the same length.
    pub fn with_data<U>(self, data: Vec<U>) -> PageResult<U> {
        PageResult {
            count: data.len() as i64,
            data,
            current_page: self.current_page,
            pages_left: self.pages_left,
            has_more: self.has_more,
        }
    }
}
