//! Topic exchange binding patterns

/// Whether `routing_key` matches the binding `pattern`.
///
/// Words are separated by `.`; `*` matches exactly one word and `#` matches
/// zero or more words.
pub(crate) fn matches(pattern: &str, routing_key: &str) -> bool {
    let pattern = words(pattern);
    let key = words(routing_key);
    matches_words(&pattern, &key)
}

fn words(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split('.').collect()
    }
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && matches_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && matches_words(rest, &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn literal_words() {
        assert!(matches("stock.usd.nyse", "stock.usd.nyse"));
        assert!(!matches("stock.usd.nyse", "stock.eur.nyse"));
        assert!(!matches("stock.usd", "stock.usd.nyse"));
        assert!(matches("", ""));
    }

    #[test]
    fn star_matches_one_word() {
        assert!(matches("stock.*.nyse", "stock.usd.nyse"));
        assert!(!matches("stock.*", "stock"));
        assert!(!matches("stock.*", "stock.usd.nyse"));
    }

    #[test]
    fn hash_matches_any_number_of_words() {
        assert!(matches("#", ""));
        assert!(matches("#", "a.b.c"));
        assert!(matches("stock.#", "stock"));
        assert!(matches("stock.#", "stock.usd.nyse"));
        assert!(matches("#.nyse", "stock.usd.nyse"));
        assert!(matches("stock.#.nyse", "stock.nyse"));
        assert!(!matches("stock.#.nyse", "stock.usd.lse"));
    }
}
