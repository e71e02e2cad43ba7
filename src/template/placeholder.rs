//! Placeholder substitution for `{{key}}` tokens in text nodes.
//!
//! Tokens are found in one left-to-right scan of the original text, so a
//! substituted value is never rescanned and the order in which keys are
//! applied cannot change the result.

use std::collections::{BTreeSet, HashMap};

use super::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, Template, TextNode};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Convert literal `\n` sequences (backslash, `n`) into real line breaks.
pub fn unescape_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}

/// Keys of all `{{key}}` tokens in `text`, in order of appearance.
pub fn tokens(text: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        keys.push(&after_open[..end]);
        rest = &after_open[end + CLOSE.len()..];
    }
    keys
}

/// Result of substituting one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    /// Keys that matched at least one token.
    pub matched: Vec<String>,
}

/// Replace every `{{key}}` whose key is in `vars` with a non-empty value.
///
/// Unknown tokens and tokens whose value is empty stay verbatim.
pub fn substitute(text: &str, vars: &HashMap<String, String>) -> Substituted {
    let mut out = String::with_capacity(text.len());
    let mut matched: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        let key = &after_open[..end];
        let token_len = OPEN.len() + end + CLOSE.len();

        out.push_str(&rest[..start]);
        match vars.get(key).filter(|v| !v.is_empty()) {
            Some(value) => {
                out.push_str(&unescape_newlines(value));
                if !matched.iter().any(|k| k == key) {
                    matched.push(key.to_string());
                }
            }
            None => out.push_str(&rest[start..start + token_len]),
        }
        rest = &rest[start + token_len..];
    }
    out.push_str(rest);

    Substituted { text: out, matched }
}

impl TextNode {
    /// Substitute placeholders in this node's text.
    ///
    /// When anything matched, unset `fontFamily`/`fontSize` are filled with
    /// the defaults. Returns the keys that matched.
    pub fn resolve_placeholders(&mut self, vars: &HashMap<String, String>) -> Vec<String> {
        if !self.text.contains(OPEN) {
            return Vec::new();
        }
        let result = substitute(&self.text, vars);
        if result.matched.is_empty() {
            return result.matched;
        }

        self.text = result.text;
        if self.font_family.as_deref().is_none_or(str::is_empty) {
            self.font_family = Some(DEFAULT_FONT_FAMILY.to_string());
        }
        if self.font_size.is_none_or(|s| s <= 0.0) {
            self.font_size = Some(DEFAULT_FONT_SIZE);
        }
        result.matched
    }
}

/// Substitute placeholders in every text node of a working copy.
///
/// Returns the set of caller keys consumed by at least one token.
pub fn resolve_template(template: &mut Template, vars: &HashMap<String, String>) -> BTreeSet<String> {
    let mut consumed = BTreeSet::new();
    for node in template.text_nodes_mut() {
        consumed.extend(node.resolve_placeholders(vars));
    }
    consumed
}

/// Every placeholder key that appears in the template's text nodes.
pub fn template_tokens(template: &Template) -> BTreeSet<String> {
    template
        .text_nodes()
        .flat_map(|n| tokens(&n.text))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hello_world() {
        let result = substitute("Hello {{name}}", &vars(&[("name", "World")]));
        assert_eq!(result.text, "Hello World");
        assert_eq!(result.matched, vec!["name".to_string()]);
    }

    #[test]
    fn test_unmatched_token_left_verbatim() {
        let result = substitute("Hi {{first}} {{last}}", &vars(&[("first", "Ada")]));
        assert_eq!(result.text, "Hi Ada {{last}}");
    }

    #[test]
    fn test_empty_value_leaves_token() {
        let result = substitute("Hi {{name}}!", &vars(&[("name", "")]));
        assert_eq!(result.text, "Hi {{name}}!");
        assert!(result.matched.is_empty());
    }

    #[test]
    fn test_newline_escape() {
        let result = substitute("{{body}}", &vars(&[("body", "line one\\nline two")]));
        assert_eq!(result.text, "line one\nline two");
    }

    #[test]
    fn test_unmatched_caller_keys_have_no_effect() {
        let text = "Static {{title}}";
        let result = substitute(text, &vars(&[("unrelated", "x"), ("other", "y")]));
        assert_eq!(result.text, text);
        assert!(result.matched.is_empty());
    }

    #[test]
    fn test_values_are_not_rescanned() {
        // A value that itself looks like a token must not be expanded again
        let result = substitute(
            "{{a}} {{b}}",
            &vars(&[("a", "{{b}}"), ("b", "B")]),
        );
        assert_eq!(result.text, "{{b}} B");
    }

    #[test]
    fn test_repeated_and_unclosed_tokens() {
        let result = substitute("{{x}}-{{x}} {{open", &vars(&[("x", "1")]));
        assert_eq!(result.text, "1-1 {{open");
        assert_eq!(result.matched, vec!["x".to_string()]);
    }

    #[test]
    fn test_tokens() {
        assert_eq!(tokens("{{a}} and {{b c}} and {{unclosed"), vec!["a", "b c"]);
        assert!(tokens("no tokens").is_empty());
    }

    #[test]
    fn test_defaults_filled_only_on_match() {
        let mut node = TextNode::new("Hello {{name}}");
        node.resolve_placeholders(&vars(&[("other", "x")]));
        assert_eq!(node.font_family, None);
        assert_eq!(node.font_size, None);

        let matched = node.resolve_placeholders(&vars(&[("name", "World")]));
        assert_eq!(matched, vec!["name".to_string()]);
        assert_eq!(node.text, "Hello World");
        assert_eq!(node.font_family.as_deref(), Some(DEFAULT_FONT_FAMILY));
        assert_eq!(node.font_size, Some(DEFAULT_FONT_SIZE));
    }

    #[test]
    fn test_existing_font_kept() {
        let mut node = TextNode::new("{{name}}");
        node.font_family = Some("Roboto".into());
        node.font_size = Some(60.0);
        node.resolve_placeholders(&vars(&[("name", "Ada")]));
        assert_eq!(node.font_family.as_deref(), Some("Roboto"));
        assert_eq!(node.font_size, Some(60.0));
    }
}
