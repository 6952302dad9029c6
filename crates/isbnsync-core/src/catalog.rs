use isbnsync_config::CatalogConfig;

/// Builds list-table URLs for one catalog section.
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    base_url: String,
    book_type: u32,
    book_sort: u32,
}

impl CatalogQuery {
    pub fn new(base_url: impl Into<String>, book_type: u32, book_sort: u32) -> Self {
        Self {
            base_url: base_url.into(),
            book_type,
            book_sort,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.base_url.clone(), config.book_type, config.book_sort)
    }

    pub fn page_url(&self, language_code: &str, page: u32) -> String {
        format!(
            "{}?BookType={}&PlanetLanguage={}&BookSort={}&page={}",
            self.base_url, self.book_type, language_code, self.book_sort, page
        )
    }
}
