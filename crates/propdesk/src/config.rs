use std::env;

/// Log output format for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table name (default: "propdesk")
    /// Note: Only used when the `dynamodb` feature is enabled.
    #[allow(dead_code)]
    pub table_name: String,
    /// Create the table on startup when missing (default: false)
    #[allow(dead_code)]
    pub create_table: bool,
    /// Page size when a list request does not ask for one (default: 25)
    pub page_size: usize,
    /// Upper bound on a requested page size (default: 100)
    pub max_page_size: usize,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_TABLE_NAME` - table name (default: "propdesk")
    /// - `DYNAMODB_CREATE_TABLE` - create the table when missing (default: false)
    /// - `QUERY_PAGE_SIZE` - default page size (default: 25)
    /// - `QUERY_MAX_PAGE_SIZE` - maximum page size (default: 100)
    /// - `LOG_FORMAT` - `pretty` or `json` (default: pretty)
    pub fn from_env() -> Self {
        let page_size = env::var("QUERY_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|size: &usize| *size > 0)
            .unwrap_or(25);
        let max_page_size = env::var("QUERY_MAX_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100)
            .max(page_size);

        Self {
            table_name: env::var("DYNAMODB_TABLE_NAME").unwrap_or_else(|_| "propdesk".to_string()),
            create_table: env::var("DYNAMODB_CREATE_TABLE")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(false),
            page_size,
            max_page_size,
            log_format: env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        }
    }

    /// Page size for a request, clamped to `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: "propdesk".to_string(),
            create_table: false,
            page_size: 25,
            max_page_size: 100,
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_clamped() {
        let config = Config::default();

        assert_eq!(config.page_size(None), 25);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(10)), 10);
        assert_eq!(config.page_size(Some(5_000)), 100);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Pretty);
    }
}
