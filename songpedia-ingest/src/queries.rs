//! Crawl query list loading
//!
//! `.json` files hold a JSON array of strings. Anything else is read as one
//! query per line; blank lines and `#` comments are skipped.

use songpedia_common::{Error, Result};
use std::path::Path;

pub fn load_queries(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidInput(format!("Read {} failed: {}", path.display(), e)))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let queries: Vec<String> = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidInput(format!(
                "{} is not a JSON array of strings: {}",
                path.display(),
                e
            ))
        })?;
        return Ok(queries);
    }

    Ok(parse_query_lines(&content))
}

pub fn parse_query_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
