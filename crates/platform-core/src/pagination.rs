//! `?page&limit` pagination helpers shared by every list endpoint (§6).

use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl PageParams {
    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.limit
    }
}

impl From<PageQuery> for PageParams {
    fn from(q: PageQuery) -> Self {
        let page = q.page.unwrap_or(1).max(1);
        let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Self { page, limit }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, params: PageParams, total: u64) -> Self {
        let total_pages = if params.limit == 0 {
            0
        } else {
            total.div_ceil(params.limit as u64)
        };
        Self {
            data,
            pagination: Pagination {
                page: params.page,
                limit: params.limit,
                total,
                total_pages,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limit_to_max() {
        let params: PageParams = PageQuery {
            page: Some(1),
            limit: Some(500),
        }
        .into();
        assert_eq!(params.limit, MAX_LIMIT);
    }

    #[test]
    fn defaults_page_to_one_when_zero() {
        let params: PageParams = PageQuery {
            page: Some(0),
            limit: None,
        }
        .into();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn computes_total_pages() {
        let params = PageParams { page: 1, limit: 10 };
        let page: Paginated<u32> = Paginated::new(vec![], params, 25);
        assert_eq!(page.pagination.total_pages, 3);
    }
}
