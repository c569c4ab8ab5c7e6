use serde::Deserialize;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 10;

/// `?page=&size=` as sent by clients. Values are kept as raw strings so a
/// junk or out-of-range parameter falls back to a default instead of
/// failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

impl PageQuery {
    /// `(page, size)`: a negative or unparseable page is 0, and a size
    /// outside `1..=10` is 10.
    pub fn resolve(&self) -> (u32, u32) {
        let page = parse(self.page.as_deref())
            .map_or(0, |page| page.clamp(0, i64::from(u32::MAX)) as u32);
        let size = parse(self.size.as_deref())
            .filter(|size| (1..=i64::from(MAX_PAGE_SIZE)).contains(size))
            .map_or(DEFAULT_PAGE_SIZE, |size| size as u32);
        (page, size)
    }

    pub fn offset(page: u32, size: u32) -> u64 {
        u64::from(page) * u64::from(size)
    }
}

pub fn total_pages(total: u64, size: u32) -> u32 {
    total.div_ceil(u64::from(size)) as u32
}

fn parse(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse().ok()
}
