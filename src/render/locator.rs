use serde::{Deserialize, Serialize};
use std::fmt;

/// One way of locating an element
///
/// Every variant compiles to a single CSS selector plus an optional minimum
/// amount of visible text, so all rendering backends evaluate a locator the
/// same way. Locators are declared in the configuration as inline tables
/// tagged by `by`:
///
/// ```toml
/// body = [
///   { by = "attribute", tag = "span", name = "data-text-content" },
///   { by = "within", scope = { by = "class", contains = ["post-content"] }, target = { by = "tag", name = "p" } },
///   { by = "text-length", tag = "p", min-chars = 10 },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "kebab-case")]
pub enum Locator {
    /// A raw CSS selector
    Css { selector: String },

    /// Any element with the given tag name
    Tag { name: String },

    /// Elements carrying an attribute, optionally with an exact or partial value
    Attribute {
        #[serde(default)]
        tag: Option<String>,
        name: String,
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
    },

    /// Elements whose class attribute contains every `contains` substring and
    /// none of the `excludes` substrings
    Class {
        #[serde(default)]
        tag: Option<String>,
        #[serde(default)]
        contains: Vec<String>,
        #[serde(default)]
        excludes: Vec<String>,
    },

    /// Elements of a tag whose whitespace-normalised text is longer than
    /// `min_chars` characters
    TextLength {
        tag: String,
        #[serde(rename = "min-chars")]
        min_chars: usize,
        #[serde(default)]
        excludes: Vec<String>,
    },

    /// `target` elements that are descendants of `scope` elements
    Within {
        scope: Box<Locator>,
        target: Box<Locator>,
    },
}

impl Locator {
    /// Shorthand for a raw CSS locator
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    /// Renders the locator as a CSS selector
    pub fn to_css(&self) -> String {
        match self {
            Locator::Css { selector } => selector.clone(),
            Locator::Tag { name } => name.clone(),
            Locator::Attribute {
                tag,
                name,
                equals,
                contains,
            } => {
                let mut css = tag.clone().unwrap_or_default();
                match (equals, contains) {
                    (Some(value), _) => css.push_str(&format!("[{}=\"{}\"]", name, quote(value))),
                    (None, Some(part)) => {
                        css.push_str(&format!("[{}*=\"{}\"]", name, quote(part)))
                    }
                    (None, None) => css.push_str(&format!("[{}]", name)),
                }
                css
            }
            Locator::Class {
                tag,
                contains,
                excludes,
            } => {
                let mut css = tag.clone().unwrap_or_default();
                for part in contains {
                    css.push_str(&format!("[class*=\"{}\"]", quote(part)));
                }
                push_excludes(&mut css, excludes);
                if css.is_empty() || css.starts_with(':') {
                    css.insert(0, '*');
                }
                css
            }
            Locator::TextLength { tag, excludes, .. } => {
                let mut css = tag.clone();
                push_excludes(&mut css, excludes);
                css
            }
            Locator::Within { scope, target } => {
                format!("{} {}", scope.to_css(), target.to_css())
            }
        }
    }

    /// Minimum text length (exclusive) an element must exceed to match
    pub fn min_text_chars(&self) -> Option<usize> {
        match self {
            Locator::TextLength { min_chars, .. } => Some(*min_chars),
            Locator::Within { target, .. } => target.min_text_chars(),
            _ => None,
        }
    }

    /// Applies the text predicate of the locator to an element's text
    pub fn accepts_text(&self, text: &str) -> bool {
        match self.min_text_chars() {
            Some(min) => normalized_len(text) > min,
            None => true,
        }
    }

    /// Replaces `{id}` in every string of the locator
    pub fn with_id(&self, id: &str) -> Locator {
        let sub = |s: &String| s.replace("{id}", id);
        let sub_all = |v: &Vec<String>| -> Vec<String> { v.iter().map(sub).collect() };

        match self {
            Locator::Css { selector } => Locator::Css {
                selector: sub(selector),
            },
            Locator::Tag { name } => Locator::Tag { name: sub(name) },
            Locator::Attribute {
                tag,
                name,
                equals,
                contains,
            } => Locator::Attribute {
                tag: tag.as_ref().map(sub),
                name: sub(name),
                equals: equals.as_ref().map(sub),
                contains: contains.as_ref().map(sub),
            },
            Locator::Class {
                tag,
                contains,
                excludes,
            } => Locator::Class {
                tag: tag.as_ref().map(sub),
                contains: sub_all(contains),
                excludes: sub_all(excludes),
            },
            Locator::TextLength {
                tag,
                min_chars,
                excludes,
            } => Locator::TextLength {
                tag: sub(tag),
                min_chars: *min_chars,
                excludes: sub_all(excludes),
            },
            Locator::Within { scope, target } => Locator::Within {
                scope: Box::new(scope.with_id(id)),
                target: Box::new(target.with_id(id)),
            },
        }
    }

    /// Compiles the locator for the `scraper` engine
    pub fn selector(&self) -> Result<scraper::Selector, String> {
        let css = self.to_css();
        scraper::Selector::parse(&css).map_err(|e| format!("'{}': {:?}", css, e))
    }

    /// Checks that the locator compiles, with any `{id}` placeholder filled in
    pub fn check(&self) -> Result<(), String> {
        self.with_id("0").selector().map(|_| ())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min_text_chars() {
            Some(min) => write!(f, "{} (text > {} chars)", self.to_css(), min),
            None => write!(f, "{}", self.to_css()),
        }
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn push_excludes(css: &mut String, excludes: &[String]) {
    for part in excludes {
        css.push_str(&format!(":not([class*=\"{}\"])", quote(part)));
    }
}

/// Character count after collapsing whitespace runs
fn normalized_len(text: &str) -> usize {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1
}
