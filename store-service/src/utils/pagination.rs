use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 25;
pub const MAX_LIMIT: u64 = 100;

/// `?page=&limit=&search=` query parameters shared by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

/// Which document fields a free-text search may touch.
#[derive(Debug, Clone, Copy)]
pub struct SearchFields {
    pub text: &'static [&'static str],
    pub numeric: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub response: Vec<T>,
    pub page: u64,
    pub limit: u64,
}

impl PageQuery {
    /// Page and limit, falling back to `default_limit` when absent or unparsable.
    pub fn resolve(&self, default_limit: u64) -> (u64, u64) {
        let page = parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(self.limit.as_deref())
            .unwrap_or(default_limit)
            .min(MAX_LIMIT);
        (page, limit)
    }

    /// Documents to skip, capped at what the driver accepts as a signed 64-bit value.
    pub fn skip(&self, default_limit: u64) -> u64 {
        let (page, limit) = self.resolve(default_limit);
        (page - 1).saturating_mul(limit).min(i64::MAX as u64)
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `base` and the search clause combined with `$and`; either side may be empty.
    pub fn filter(&self, base: Document, fields: SearchFields) -> Document {
        let search = self
            .search_term()
            .map(|term| search_clause(term, fields))
            .unwrap_or_default();

        match (base.is_empty(), search.is_empty()) {
            (true, _) => search,
            (false, true) => base,
            (false, false) => doc! { "$and": [base, search] },
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok()).filter(|n| *n >= 1)
}

/// `$or` of case-insensitive regex over text fields plus equality over numeric
/// fields when the term is a number.
pub fn search_clause(term: &str, fields: SearchFields) -> Document {
    let escaped = regex::escape(term);
    let mut clauses: Vec<Bson> = fields
        .text
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(*field, doc! { "$regex": escaped.clone(), "$options": "i" });
            Bson::Document(clause)
        })
        .collect();

    if let Ok(number) = term.parse::<f64>() {
        clauses.extend(
            fields
                .numeric
                .iter()
                .map(|field| {
                    let mut clause = Document::new();
                    clause.insert(*field, number);
                    Bson::Document(clause)
                }),
        );
    }

    if clauses.is_empty() {
        Document::new()
    } else {
        doc! { "$or": clauses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: SearchFields = SearchFields {
        text: &["title", "description"],
        numeric: &["price"],
    };

    fn query(page: Option<&str>, limit: Option<&str>, search: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(String::from),
            limit: limit.map(String::from),
            search: search.map(String::from),
        }
    }

    #[test]
    fn defaults_apply_for_missing_or_bad_values() {
        assert_eq!(query(None, None, None).resolve(DEFAULT_LIMIT), (1, 25));
        assert_eq!(query(Some("abc"), Some("0"), None).resolve(10), (1, 10));
        assert_eq!(query(Some("3"), Some("500"), None).resolve(10), (3, MAX_LIMIT));
        assert_eq!(query(Some("3"), Some("20"), None).skip(10), 40);
    }

    #[test]
    fn huge_page_numbers_saturate_instead_of_overflowing() {
        let skip = query(Some("18446744073709551615"), None, None).skip(DEFAULT_LIMIT);
        assert_eq!(skip, i64::MAX as u64);
    }

    #[test]
    fn blank_search_keeps_base_filter() {
        let base = doc! { "status": "VISIBLE" };
        let filter = query(None, None, Some("   ")).filter(base.clone(), FIELDS);
        assert_eq!(filter, base);
    }

    #[test]
    fn text_search_escapes_regex_metacharacters() {
        let filter = query(None, None, Some("a+b")).filter(Document::new(), FIELDS);
        let or = filter.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
        let first = or[0].as_document().unwrap().get_document("title").unwrap();
        assert_eq!(first.get_str("$regex").unwrap(), r"a\+b");
    }

    #[test]
    fn numeric_terms_also_match_numeric_fields() {
        let filter = query(None, None, Some("12.5")).filter(doc! { "status": "VISIBLE" }, FIELDS);
        let and = filter.get_array("$and").unwrap();
        let or = and[1].as_document().unwrap().get_array("$or").unwrap();
        assert_eq!(or.len(), 3);
        assert_eq!(or[2].as_document().unwrap().get_f64("price").unwrap(), 12.5);
    }
}
