//! Internal utilities.

/// Ensures `url` ends with a slash so list keys can be appended directly.
#[must_use]
pub fn normalize_base_url(url: &str) -> String {
    if url.is_empty() {
        return "/".to_string();
    }
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Builds the locator for list `key` under `base_url`.
#[must_use]
pub fn list_locator(base_url: &str, key: &str) -> String {
    format!("{}{}", normalize_base_url(base_url), urlencoding::encode(key))
}

/// Splits `items` into consecutive chunks of at most `size` elements.
///
/// Always returns at least one chunk, so an empty input yields `[[]]`.
/// `size` must be positive; config validation guarantees this.
#[must_use]
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Name of the chunk at zero-based `index`: `base`, `base-2`, `base-3`, ...
#[must_use]
pub fn split_group_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}-{}", index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        assert_eq!(normalize_base_url("https://x.test/data"), "https://x.test/data/");
        assert_eq!(normalize_base_url("https://x.test/data/"), "https://x.test/data/");
        assert_eq!(normalize_base_url(""), "/");
    }

    #[test]
    fn locator_encodes_key() {
        assert_eq!(
            list_locator("https://x.test/data", "category-ads all"),
            "https://x.test/data/category-ads%20all"
        );
        assert_eq!(list_locator("mock://", "other"), "mock://other");
    }

    #[test]
    fn chunk_counts_round_up() {
        let items: Vec<u32> = (0..205).collect();
        let chunks = chunk(&items, 50);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[4].len(), 5);
        assert_eq!(chunks.concat(), items);
    }

    #[test]
    fn empty_input_yields_one_empty_chunk() {
        let chunks = chunk::<String>(&[], 10);
        assert_eq!(chunks, vec![Vec::<String>::new()]);
    }

    #[test]
    fn split_names() {
        let names: Vec<_> = (0..3).map(|i| split_group_name("domain-list0", i)).collect();
        assert_eq!(names, vec!["domain-list0", "domain-list0-2", "domain-list0-3"]);
    }
}
