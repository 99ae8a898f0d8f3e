//! Page-number → `LIMIT offset, count` normalization.

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number consistent with `offset`.
    pub page: u64,
    pub page_size: u64,
    pub offset: u64,
    pub limit: u64,
}

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Normalize a 1-based page number and page size.
///
/// `page == 0` means the first page, a non-positive `page_size` falls back to
/// [`DEFAULT_PAGE_SIZE`], and negative pages clamp to offset 0. Offsets
/// past `u64::MAX` saturate.
pub fn normalize_page(page: i64, page_size: i64) -> PageWindow {
    let page = if page == 0 { 1 } else { page };
    let page_size = if page_size <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size as u64
    };

    let offset = (page.saturating_sub(1).max(0) as u64).saturating_mul(page_size);
    PageWindow {
        page: offset / page_size + 1,
        page_size,
        offset,
        limit: page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page() {
        let w = normalize_page(1, 10);
        assert_eq!((w.offset, w.limit, w.page), (0, 10, 1));
    }

    #[test]
    fn later_pages() {
        let w = normalize_page(3, 25);
        assert_eq!((w.offset, w.limit, w.page), (50, 25, 3));
    }

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(normalize_page(0, 0), normalize_page(1, 10));
        let w = normalize_page(-4, 20);
        assert_eq!((w.offset, w.page), (0, 1));
        assert_eq!(normalize_page(2, -1).limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn extreme_pages_saturate() {
        let w = normalize_page(i64::MIN, 10);
        assert_eq!((w.offset, w.limit, w.page), (0, 10, 1));

        let w = normalize_page(i64::MAX, 10);
        assert_eq!(w.offset, u64::MAX);
        assert_eq!(w.page, u64::MAX / 10 + 1);

        let w = normalize_page(i64::MAX, i64::MAX);
        assert_eq!(w.offset, u64::MAX);
        assert_eq!(w.limit, i64::MAX as u64);
    }
}
