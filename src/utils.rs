// Utility functions

/// Returns the text between the first `prefix` and the next `suffix` after it.
pub fn extract_between<'a>(text: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let start = text.find(prefix)? + prefix.len();
    let rest = &text[start..];
    let end = rest.find(suffix)?;
    Some(&rest[..end])
}

/// Percent-encodes the characters the market rejects in listing URLs.
pub fn encode_market_hash_name(name: &str) -> String {
    name.replace(' ', "%20")
        .replace('\'', "%27")
        .replace('(', "%28")
        .replace(')', "%29")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_marker_pair() {
        let text = "a var line1=[1,2]; var line2=[3];";
        assert_eq!(extract_between(text, "var line1=", ";"), Some("[1,2]"));
        assert_eq!(extract_between(text, "var line3=", ";"), None);
        assert_eq!(extract_between("var line1=[1]", "var line1=", ";"), None);
    }

    #[test]
    fn encodes_listing_names() {
        assert_eq!(
            encode_market_hash_name("Gamer's Crate (Field)"),
            "Gamer%27s%20Crate%20%28Field%29"
        );
    }
}
