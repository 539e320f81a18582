use serde::{Deserialize, Serialize};

// Endangered person record as the backend serves it
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UgrozenoLice {
    pub ugrozeno_lice_id: u64,
    pub redni_broj: String,
    pub ime: String,
    pub prezime: String,
    pub jmbg: String,
    pub ptt_broj: String,
    pub grad_opstina: String,
    pub mesto: String,
    pub ulica_i_broj: String,
    pub osnov_sticanja_statusa: String,
}

// Paged listing, same shape the backend returns
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: usize,
    pub total_pages: usize,
    pub number: usize,
    pub size: usize,
}

// Paging read from the listing query; the raw query is what gets forwarded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl PageQuery {
    /// Picks `page` and `size` out of a raw query. Values that are not
    /// unsigned integers are ignored rather than rejected.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for pair in raw.unwrap_or_default().split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim().parse().ok();
            match key {
                "page" => query.page = value,
                "size" => query.size = value,
                _ => {}
            }
        }
        query
    }
}

// Body of a 429 issued by the gateway itself
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedBody {
    pub error: String,
    pub retry_after: u64,
}

// Body of a 429 reported by the backend and passed through
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRateLimitedBody {
    pub error: String,
    pub retry_after: u64,
    pub suggestion: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_is_lenient() {
        let q = PageQuery::parse_lenient(Some("page=2&size=5&prezime=Ilic"));
        assert_eq!(q, PageQuery { page: Some(2), size: Some(5) });

        let q = PageQuery::parse_lenient(Some("page=abc&size=&page2=1"));
        assert_eq!(q, PageQuery::default());

        assert_eq!(PageQuery::parse_lenient(Some("page=-1")).page, None);
        assert_eq!(PageQuery::parse_lenient(None), PageQuery::default());
    }
}
