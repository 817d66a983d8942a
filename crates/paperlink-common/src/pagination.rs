use serde::{Deserialize, Serialize};

/// Offset/limit arithmetic for paginated listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(number: u32, per_page: u32) -> Self {
        Self {
            number: number.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.number - 1) * self.per_page
    }

    pub fn total_pages(&self, total_items: u64) -> u32 {
        if total_items == 0 {
            return 1;
        }
        total_items.div_ceil(self.per_page as u64) as u32
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::Page;

    #[test]
    fn page_numbers_are_clamped_to_one() {
        let page = Page::new(0, 10);
        assert_eq!(page.number, 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(Page::new(3, 10).offset(), 20);
        assert_eq!(Page::new(1, 25).offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::new(1, 10);
        assert_eq!(page.total_pages(0), 1);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
        assert_eq!(page.total_pages(95), 10);
    }
}
