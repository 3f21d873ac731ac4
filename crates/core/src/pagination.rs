//! Compact pagination windows for list views.

use serde::{Serialize, Serializer};

/// One slot in the rendered pagination strip. Serializes as a bare page
/// number or the literal string `"..."`, the shape the front end renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

impl Serialize for PageItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Page(number) => serializer.serialize_u32(*number),
            Self::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

/// Computes the pagination window for `current` out of `total` pages.
///
/// With ten or fewer pages the full range is returned. Beyond that the
/// strip shows either the leading six pages, the trailing six, or a
/// five-page window centered on the current page, with ellipses and the
/// boundary pages filled in. The exact boundary arithmetic is relied on by
/// UI stability tests, so changes here are breaking.
pub fn compute_range(current: u32, total: u32) -> Vec<PageItem> {
    let mut range = Vec::new();

    if total <= 10 {
        range.extend((1..=total).map(PageItem::Page));
        return range;
    }

    if current <= 6 {
        range.extend((1..=6).map(PageItem::Page));
        range.push(PageItem::Ellipsis);
        range.push(PageItem::Page(total));
    } else if current >= total - 5 {
        range.push(PageItem::Page(1));
        range.push(PageItem::Ellipsis);
        range.extend((total - 5..=total).map(PageItem::Page));
    } else {
        range.push(PageItem::Page(1));
        range.push(PageItem::Ellipsis);
        range.extend((current - 2..=current + 2).map(PageItem::Page));
        range.push(PageItem::Ellipsis);
        range.push(PageItem::Page(total));
    }

    range
}

#[cfg(test)]
mod tests {
    use super::{compute_range, PageItem};

    fn pages(items: &[PageItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                PageItem::Page(n) => n.to_string(),
                PageItem::Ellipsis => "...".to_string(),
            })
            .collect()
    }

    #[test]
    fn short_lists_are_returned_in_full() {
        assert_eq!(pages(&compute_range(1, 5)), ["1", "2", "3", "4", "5"]);
        assert_eq!(pages(&compute_range(7, 10)).len(), 10);
    }

    #[test]
    fn leading_window_for_early_pages() {
        assert_eq!(pages(&compute_range(3, 20)), ["1", "2", "3", "4", "5", "6", "...", "20"]);
        assert_eq!(pages(&compute_range(6, 20)), ["1", "2", "3", "4", "5", "6", "...", "20"]);
    }

    #[test]
    fn trailing_window_for_late_pages() {
        assert_eq!(pages(&compute_range(18, 20)), ["1", "...", "15", "16", "17", "18", "19", "20"]);
        assert_eq!(pages(&compute_range(15, 20)), ["1", "...", "15", "16", "17", "18", "19", "20"]);
    }

    #[test]
    fn centered_window_for_middle_pages() {
        assert_eq!(
            pages(&compute_range(10, 20)),
            ["1", "...", "8", "9", "10", "11", "12", "...", "20"]
        );
    }

    #[test]
    fn boundary_between_leading_and_centered_windows() {
        // 7 is the first page that earns a centered window on 20 pages.
        assert_eq!(
            pages(&compute_range(7, 20)),
            ["1", "...", "5", "6", "7", "8", "9", "...", "20"]
        );
    }

    #[test]
    fn serializes_pages_as_numbers_and_ellipsis_as_string() {
        let encoded = serde_json::to_string(&compute_range(3, 20)).expect("serialize");
        assert_eq!(encoded, r#"[1,2,3,4,5,6,"...",20]"#);
    }
}
