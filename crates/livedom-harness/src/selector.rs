#![forbid(unsafe_code)]

//! A deliberately small selector engine for the fake tree.
//!
//! Supported: type (`li`), universal (`*`), class (`.item`), id (`#main`),
//! compounds of those (`li.item.active`), and the descendant combinator
//! (`ul li`). Anything else is rejected at parse time.

/// One compound selector, e.g. `li.item#first`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Compound {
    /// Match against one element's own data.
    #[must_use]
    pub fn matches(&self, tag: &str, id: Option<&str>, classes: &[String]) -> bool {
        self.tag.as_deref().is_none_or(|t| t.eq_ignore_ascii_case(tag))
            && self.id.as_deref().is_none_or(|want| id == Some(want))
            && self.classes.iter().all(|c| classes.contains(c))
    }
}

/// A descendant chain of compounds, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<Compound>,
}

/// Reason a selector failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError(pub String);

impl core::fmt::Display for SelectorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unsupported selector: {:?}", self.0)
    }
}

impl std::error::Error for SelectorError {}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn parse_compound(src: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let split = src.find(['.', '#']).unwrap_or(src.len());
    let (tag, mut rest) = src.split_at(split);
    match tag {
        "" | "*" => {}
        t if is_ident(t) => compound.tag = Some(t.to_ascii_lowercase()),
        _ => return None,
    }
    while let Some(marker) = rest.chars().next() {
        let body = &rest[marker.len_utf8()..];
        let end = body.find(['.', '#']).unwrap_or(body.len());
        let name = &body[..end];
        if !is_ident(name) {
            return None;
        }
        match marker {
            '.' => compound.classes.push(name.to_owned()),
            _ => compound.id = Some(name.to_owned()),
        }
        rest = &body[end..];
    }
    Some(compound)
}

impl Selector {
    pub fn parse(src: &str) -> Result<Self, SelectorError> {
        let parts = src
            .split_whitespace()
            .map(parse_compound)
            .collect::<Option<Vec<_>>>()
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| SelectorError(src.to_owned()))?;
        Ok(Self { parts })
    }

    /// Match an element given its ancestry.
    ///
    /// `chain` yields `(tag, id, classes)` for the element itself first, then
    /// each ancestor from nearest to farthest.
    pub fn matches<'a, I>(&self, mut chain: I) -> bool
    where
        I: Iterator<Item = (&'a str, Option<&'a str>, &'a [String])>,
    {
        let mut parts = self.parts.iter().rev();
        let Some(subject) = parts.next() else {
            return false;
        };
        let Some((tag, id, classes)) = chain.next() else {
            return false;
        };
        if !subject.matches(tag, id, classes) {
            return false;
        }
        // Descendant combinators only: greedy nearest-ancestor matching is exact.
        'outer: for part in parts {
            for (tag, id, classes) in chain.by_ref() {
                if part.matches(tag, id, classes) {
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }
}
