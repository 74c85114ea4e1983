use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hasher},
};

/// Suffix appended to an attribute name that carries bindings, so the markup
/// parser treats the attribute as an ordinary (if oddly named) one rather
/// than applying any name-specific handling.
pub const BOUND_ATTRIBUTE_SUFFIX: &str = "$weft$";

/// Matches the tail of a literal chunk that ends inside an attribute
/// assignment: trailing whitespace, the as-authored attribute name, and the
/// `=` with the opening of the value. A chunk matching this expression means
/// the following interpolation sits in attribute position.
pub static LAST_ATTRIBUTE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"([ \x09\x0a\x0c\x0d])([^\x00-\x1F\x7F-\x9F "'>=/]+)([ \x09\x0a\x0c\x0d]*=[ \x09\x0a\x0c\x0d]*(?:[^ \x09\x0a\x0c\x0d"'`<>=]*|"[^"]*|'[^']*))$"#,
    )
    .expect("attribute name expression should parse")
});

static MARKER: Lazy<Marker> = Lazy::new(Marker::generate);

/// The per-process binding token and its derived forms.
///
/// The token is substituted into template source at each interpolation
/// boundary, survives markup parsing, and is unlikely to collide with
/// literal template text thanks to a random suffix.
#[derive(Debug)]
pub struct Marker {
    /// The bare token, used inside attribute values.
    token: String,
    /// The token wrapped in a comment node, used at node positions.
    node: String,
    /// The token padded with spaces, used inside an already-open comment
    /// so the substitution cannot close it early.
    comment: String,
}

impl Marker {
    /// Return the process-wide [`Marker`].
    pub fn get() -> &'static Marker {
        &MARKER
    }

    fn generate() -> Self {
        let entropy = RandomState::new().build_hasher().finish();
        let token = format!("{{{{weft-{entropy:x}}}}}");
        let node = format!("<!--{token}-->");
        let comment = format!(" {token} ");

        Self {
            token,
            node,
            comment,
        }
    }

    /// Return the bare token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Return the comment-node form of the token.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Return the padded form of the token, safe inside an open comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Return true when the given text contains the token in any form.
    pub fn is_in(&self, text: &str) -> bool {
        text.contains(&self.token)
    }

    /// Split the given text at every occurrence of the token, in either its
    /// bare or comment-node form, returning the static pieces between
    /// interpolation boundaries.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let normalized = text.replace(&self.node, &self.token);

        normalized
            .split(self.token.as_str())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Marker, LAST_ATTRIBUTE_NAME};

    #[test]
    fn test_stable_within_process() {
        assert_eq!(Marker::get().token(), Marker::get().token());
    }

    #[test]
    fn test_forms() {
        let marker = Marker::get();

        assert_eq!(marker.node(), format!("<!--{}-->", marker.token()));
        assert_eq!(marker.comment(), format!(" {} ", marker.token()));
    }

    #[test]
    fn test_split_text() {
        let marker = Marker::get();
        let text = format!("a{}b{}c", marker.token(), marker.node());

        assert_eq!(marker.split_text(&text), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_attribute_name() {
        let captures = LAST_ATTRIBUTE_NAME.captures("<div class=\"big").unwrap();
        assert_eq!(&captures[2], "class");

        let captures = LAST_ATTRIBUTE_NAME.captures("<input ?disabled=").unwrap();
        assert_eq!(&captures[2], "?disabled");

        let captures = LAST_ATTRIBUTE_NAME.captures("<a .relList=").unwrap();
        assert_eq!(&captures[2], ".relList");

        assert!(LAST_ATTRIBUTE_NAME.captures("<div>text ").is_none());
        assert!(LAST_ATTRIBUTE_NAME.captures("-").is_none());
    }
}
