use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Offset/limit window requested through `?page=&size=`. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    pub fn size(&self) -> i64 {
        self.size
            .filter(|s| *s >= 1)
            .map(|s| s.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.size()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total: i64,
    pub total_pages: i64,
    pub first: bool,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total: i64) -> Self {
        let size = request.size();
        let page = request.page();
        let total_pages = if total == 0 { 0 } else { (total + size - 1) / size };
        Self {
            items,
            page,
            size,
            total,
            total_pages,
            first: page == 1,
            last: page >= total_pages,
        }
    }

    /// Cuts one page out of a fully materialised, already ordered list.
    pub fn slice(all: Vec<T>, request: &PageRequest) -> Self {
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size() as usize)
            .collect();
        Self::new(items, request, total)
    }
}
