use serde::{Deserialize, Serialize};

use crate::constants::RECIPE_COUNT_PER_PAGE;

/// Window into a listing, expressed the way the store consumes it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.max(1),
            offset: offset.max(0),
        }
    }

    /// One-based page number, as the web layer receives it.
    pub fn number(page: i64, limit: i64) -> Self {
        let limit = limit.max(1);
        Self::new(limit, (page.max(1) - 1).saturating_mul(limit))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(RECIPE_COUNT_PER_PAGE, 0)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: Page) -> Self {
        if rows.is_empty() && page.offset == 0 {
            return Self::no_rows();
        }

        let next_offset = page
            .offset
            .checked_add(page.limit)
            .filter(|next| *next < total_rows);
        let prev_offset = (page.offset > 0).then(|| (page.offset - page.limit).max(0));

        Self {
            rows,
            total_rows,
            next_offset,
            prev_offset,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            next_offset: None,
            prev_offset: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_is_one_based() {
        assert_eq!(Page::number(1, 6), Page::new(6, 0));
        assert_eq!(Page::number(3, 6), Page::new(6, 12));
        assert_eq!(Page::number(0, 6), Page::new(6, 0));
    }

    #[test]
    fn first_page_links_forward_only() {
        let page = PageContext::from_rows(vec![1, 2], 5, Page::new(2, 0));
        assert_eq!(page.next_offset, Some(2));
        assert_eq!(page.prev_offset, None);
        assert_eq!(page.total_rows, 5);
    }

    #[test]
    fn last_page_links_back_only() {
        let page = PageContext::from_rows(vec![5], 5, Page::new(2, 4));
        assert_eq!(page.next_offset, None);
        assert_eq!(page.prev_offset, Some(2));
    }

    #[test]
    fn huge_page_number_has_no_next_page() {
        let page = Page::number(i64::MAX, 6);
        assert_eq!(page.offset, i64::MAX);

        let context = PageContext::from_rows(vec![1], 1, page);
        assert_eq!(context.next_offset, None);
        assert_eq!(context.prev_offset, Some(i64::MAX - 6));
    }

    #[test]
    fn empty_listing_has_no_links() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, Page::default());
        assert!(page.rows.is_empty());
        assert_eq!(page.next_offset, None);
        assert_eq!(page.prev_offset, None);
    }
}
