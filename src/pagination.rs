/// Number of pages needed to show `total_records`. Zero records means zero pages.
pub fn compute_total_pages(total_records: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_records.div_ceil(page_size)
}

/// Validate a navigation request against the currently known page count.
///
/// Returns `None` when the request must be ignored. Before the first successful
/// fetch the page count is 0, page 1 is still let through so that fetch can
/// establish the real total.
pub fn clamp_page_request(requested_page: u64, total_pages: u64) -> Option<u64> {
    if requested_page < 1 {
        return None;
    }
    if total_pages == 0 {
        return (requested_page == 1).then_some(1);
    }
    (requested_page <= total_pages).then_some(requested_page)
}

/// 1-based inclusive range of records shown on `page`, `None` for an empty page.
pub fn visible_range(page: u64, page_size: u64, total_records: u64) -> Option<(u64, u64)> {
    let first = page.saturating_sub(1).saturating_mul(page_size) + 1;
    if total_records == 0 || first > total_records {
        return None;
    }
    let last = page.saturating_mul(page_size).min(total_records);
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn total_pages_for_known_sizes() {
        assert_eq!(compute_total_pages(0, 50), 0);
        assert_eq!(compute_total_pages(1, 50), 1);
        assert_eq!(compute_total_pages(50, 50), 1);
        assert_eq!(compute_total_pages(51, 50), 2);
        assert_eq!(compute_total_pages(120, 50), 3);
    }

    #[test]
    fn clamp_rejects_out_of_range() {
        assert_eq!(clamp_page_request(0, 3), None);
        assert_eq!(clamp_page_request(4, 3), None);
        assert_eq!(clamp_page_request(3, 3), Some(3));
        assert_eq!(clamp_page_request(1, 3), Some(1));
    }

    #[test]
    fn clamp_allows_only_first_page_when_total_unknown() {
        assert_eq!(clamp_page_request(1, 0), Some(1));
        assert_eq!(clamp_page_request(2, 0), None);
    }

    #[test]
    fn visible_range_of_last_partial_page() {
        assert_eq!(visible_range(3, 50, 120), Some((101, 120)));
        assert_eq!(visible_range(1, 50, 120), Some((1, 50)));
        assert_eq!(visible_range(1, 50, 0), None);
        assert_eq!(visible_range(4, 50, 120), None);
    }

    proptest! {
        #[test]
        fn total_pages_is_ceiling(total in 0u64..1_000_000, size in 1u64..500) {
            let pages = compute_total_pages(total, size);
            prop_assert!(pages * size >= total);
            if pages > 0 {
                prop_assert!((pages - 1) * size < total);
            } else {
                prop_assert_eq!(total, 0);
            }
        }

        #[test]
        fn clamp_passes_through_in_range(total_pages in 1u64..10_000, seed in any::<u64>()) {
            let page = seed % total_pages + 1;
            prop_assert_eq!(clamp_page_request(page, total_pages), Some(page));
        }

        #[test]
        fn clamp_rejects_beyond_total(total_pages in 0u64..10_000, extra in 1u64..1000) {
            let page = total_pages.max(1) + extra;
            prop_assert_eq!(clamp_page_request(page, total_pages), None);
        }
    }
}
