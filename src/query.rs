use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

/// Filter name -> selected value. A missing key means "no filter applied".
pub type Filters = BTreeMap<String, String>;

/// Date-range filters every collection endpoint accepts, as `YYYY-MM-DD`.
pub const DATE_FILTERS: [&str; 2] = ["dateFrom", "dateTo"];

/// Values a collection endpoint accepts for each enumerated filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    allowed: BTreeMap<String, Vec<String>>,
}

impl FilterSpec {
    pub fn new(allowed: BTreeMap<String, Vec<String>>) -> Self {
        Self { allowed }
    }

    pub fn with(mut self, name: &str, values: &[&str]) -> Self {
        self.allowed.insert(
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn accepts(&self, name: &str, value: &str) -> bool {
        if DATE_FILTERS.contains(&name) {
            return NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
        }
        self.allowed
            .get(name)
            .map(|values| values.iter().any(|v| v == value))
            .unwrap_or(false)
    }

    /// Drop every filter the endpoint would not accept, so it reads as "all".
    pub fn sanitize(&self, filters: &Filters) -> Filters {
        filters
            .iter()
            .filter(|(name, value)| {
                let ok = self.accepts(name, value);
                if !ok {
                    warn!(filter = %name, value = %value, "dropping unsupported filter value");
                }
                ok
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.allowed.keys().map(String::as_str)
    }
}

/// Parameters of one page request against a collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub search: String,
    pub filters: Filters,
}

impl ListQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            search: String::new(),
            filters: Filters::new(),
        }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }

    /// Query string pairs: `skip`, `limit`, then `search` when non-blank and
    /// the filters in name order.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("skip".to_string(), self.skip().to_string()),
            ("limit".to_string(), self.page_size.to_string()),
        ];
        let search = self.search.trim();
        if !search.is_empty() {
            params.push(("search".to_string(), search.to_string()));
        }
        for (name, value) in &self.filters {
            params.push((name.clone(), value.clone()));
        }
        params
    }
}

/// Parse a `name=value` filter argument. The value may be empty or contain `=`.
pub fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

/// Pages needed to show `total` rows; never less than one.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
