use serde::{Deserialize, Serialize};
use std::fmt;

const FIELD: char = '.';
const TYPE: char = '$';

fn is_separator(c: char) -> bool {
    c == FIELD || c == TYPE
}

/// True when `name` cannot serve as a single path step.
pub fn contains_separator(name: &str) -> bool {
    name.chars().any(is_separator)
}

/// Canonical name for a location inside a flattened entity. The first part
/// is the root property name; each later part starts with `.` (field step)
/// or `$` (type step). Paths order by their string form, which keeps every
/// prefix range contiguous.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(String);

impl Path {
    pub fn empty() -> Path {
        Path(String::new())
    }

    pub fn root(name: &str) -> Path {
        debug_assert!(!name.chars().any(is_separator), "root name contains a separator");
        Path(name.to_string())
    }

    /// Extends with a field step. On the empty path this starts the root part.
    pub fn field(&self, name: &str) -> Path {
        debug_assert!(!name.is_empty() && !name.chars().any(is_separator));
        if self.0.is_empty() {
            Path(name.to_string())
        } else {
            Path(format!("{}{}{}", self.0, FIELD, name))
        }
    }

    /// Extends with a type-discriminator step.
    pub fn meta(&self, name: &str) -> Path {
        debug_assert!(!name.is_empty() && !name.chars().any(is_separator));
        Path(format!("{}{}{}", self.0, TYPE, name))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parts(&self) -> Parts<'_> {
        Parts { rest: &self.0 }
    }

    pub fn first_part(&self) -> Option<Part<'_>> {
        self.parts().next()
    }

    /// The path with its first part removed; empty when there is none left.
    pub fn tail(&self) -> Path {
        match self.0.char_indices().skip(1).find(|(_, c)| is_separator(*c)) {
            Some((i, _)) => Path(self.0[i..].to_string()),
            None => Path::empty(),
        }
    }

    /// True exactly when the string form starts with `prefix` and is
    /// followed by end-of-string or a separator, so `foo` is not a prefix
    /// of `foobar`. The empty path is a prefix of everything.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        prefix.0.is_empty()
            || (self.0.starts_with(&prefix.0)
                && (self.0.len() == prefix.0.len()
                    || self.0[prefix.0.len()..].starts_with(is_separator)))
    }

    /// The part immediately following `prefix`; None when `prefix` does not
    /// apply or nothing follows it.
    pub fn first_part_after_prefix(&self, prefix: &Path) -> Option<Part<'_>> {
        if !self.has_prefix(prefix) || self.0.len() == prefix.0.len() {
            return None;
        }
        Parts { rest: &self.0[prefix.0.len()..] }.next()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.0)
    }
}

/// One step of a path, separator included for non-root parts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Part<'a> {
    text: &'a str,
}

impl<'a> Part<'a> {
    pub fn is_field(&self) -> bool {
        self.text.starts_with(FIELD)
    }

    pub fn is_type(&self) -> bool {
        self.text.starts_with(TYPE)
    }

    pub fn is_root(&self) -> bool {
        !self.is_field() && !self.is_type()
    }

    pub fn name(&self) -> &'a str {
        if self.is_root() {
            self.text
        } else {
            &self.text[1..]
        }
    }
}

pub struct Parts<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Parts<'a> {
    type Item = Part<'a>;

    fn next(&mut self) -> Option<Part<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        let split = self
            .rest
            .char_indices()
            .skip(1)
            .find(|(_, c)| is_separator(*c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(split);
        self.rest = tail;
        Some(Part { text: head })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_splits_parts() {
        let p = Path::root("contact").field("address").meta("class").field("line");
        assert_eq!(p.as_str(), "contact.address$class.line");
        let parts: Vec<_> = p.parts().collect();
        assert_eq!(parts.len(), 4);
        assert!(parts[0].is_root());
        assert_eq!(parts[0].name(), "contact");
        assert!(parts[1].is_field());
        assert_eq!(parts[1].name(), "address");
        assert!(parts[2].is_type());
        assert!(!parts[2].is_field());
        assert_eq!(parts[2].name(), "class");
        assert_eq!(parts[3].name(), "line");
    }

    #[test]
    fn field_on_empty_starts_root() {
        let p = Path::empty().field("name");
        assert_eq!(p.as_str(), "name");
        assert!(p.first_part().unwrap().is_root());
    }

    #[test]
    fn prefix_requires_separator_boundary() {
        let foo = Path::root("foo");
        let foobar = Path::root("foobar");
        let foo_bar = Path::root("foo").field("bar");
        assert!(!foobar.has_prefix(&foo));
        assert!(foo_bar.has_prefix(&foo));
        assert!(foo.has_prefix(&foo));
        assert!(foo.has_prefix(&Path::empty()));
    }

    #[test]
    fn first_part_after_prefix_returns_next_step() {
        let p = Path::root("a").field("b").field("c");
        let prefix = Path::root("a");
        let part = p.first_part_after_prefix(&prefix).unwrap();
        assert!(part.is_field());
        assert_eq!(part.name(), "b");
        assert!(p.first_part_after_prefix(&p).is_none());
        assert_eq!(p.first_part_after_prefix(&Path::empty()).unwrap().name(), "a");
    }

    #[test]
    fn tail_drops_first_part() {
        let p = Path::root("a").field("b").meta("t");
        assert_eq!(p.tail().as_str(), ".b$t");
        assert_eq!(Path::root("a").tail(), Path::empty());
    }

    #[test]
    fn ordering_keeps_prefix_ranges_contiguous() {
        let q = Path::root("things");
        let mut all = vec![
            Path::root("things").field("b"),
            Path::root("thingsmore"),
            Path::root("things"),
            Path::root("things").field("a"),
            Path::root("thing"),
        ];
        all.sort();
        let flags: Vec<bool> = all.iter().map(|p| p.has_prefix(&q)).collect();
        // prefixed paths form one contiguous run
        let first = flags.iter().position(|b| *b).unwrap();
        let last = flags.iter().rposition(|b| *b).unwrap();
        assert!(flags[first..=last].iter().all(|b| *b));
        assert_eq!(last - first + 1, 3);
    }
}
