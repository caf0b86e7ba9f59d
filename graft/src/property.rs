use crate::client::NativeValue;
use crate::path::Path;
use serde::{Deserialize, Serialize};

/// One flattened slot of an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub path: Path,
    pub value: NativeValue,
    pub indexed: bool,
}

impl Property {
    pub fn new(path: Path, value: NativeValue, indexed: bool) -> Property {
        Property { path, value, indexed }
    }
}

/// A path-sorted collection of properties representing one entity's
/// contents. Inserting at an existing path appends after the last equal
/// path, which is how ordered sequences are encoded (repeated paths,
/// emission order = element order).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    props: Vec<Property>,
}

impl PropertySet {
    pub fn new() -> PropertySet {
        PropertySet { props: Vec::new() }
    }

    pub fn singleton(property: Property) -> PropertySet {
        PropertySet { props: vec![property] }
    }

    pub fn push(&mut self, property: Property) {
        let at = self.props.partition_point(|p| p.path <= property.path);
        self.props.insert(at, property);
    }

    pub fn merge(&mut self, other: PropertySet) {
        for p in other.props {
            self.push(p);
        }
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.props.iter()
    }

    pub fn as_slice(&self) -> &[Property] {
        &self.props
    }

    /// The contiguous run of properties whose paths have `prefix` as a
    /// prefix. Relies on the path ordering contiguity guarantee.
    pub fn slice_with_prefix(&self, prefix: &Path) -> &[Property] {
        slice_with_prefix(&self.props, prefix)
    }

    pub fn find(&self, path: &Path) -> Option<&Property> {
        let at = self.props.partition_point(|p| p.path < *path);
        self.props.get(at).filter(|p| p.path == *path)
    }
}

impl FromIterator<Property> for PropertySet {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> PropertySet {
        let mut set = PropertySet::new();
        for p in iter {
            set.push(p);
        }
        set
    }
}

impl IntoIterator for PropertySet {
    type Item = Property;
    type IntoIter = std::vec::IntoIter<Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.props.into_iter()
    }
}

/// Prefix slicing over any path-sorted run of properties.
pub fn slice_with_prefix<'a>(props: &'a [Property], prefix: &Path) -> &'a [Property] {
    let start = props.partition_point(|p| p.path.as_str() < prefix.as_str());
    let mut end = start;
    while end < props.len() && props[end].path.has_prefix(prefix) {
        end += 1;
    }
    &props[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NativeValue;

    fn prop(path: Path, v: i64) -> Property {
        Property::new(path, NativeValue::I64(v), false)
    }

    #[test]
    fn push_keeps_paths_sorted() {
        let mut set = PropertySet::new();
        set.push(prop(Path::root("b"), 2));
        set.push(prop(Path::root("a"), 1));
        set.push(prop(Path::root("c"), 3));
        let order: Vec<&str> = set.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_paths_keep_insertion_order() {
        let mut set = PropertySet::new();
        set.push(prop(Path::root("things"), 10));
        set.push(prop(Path::root("things"), 20));
        set.push(prop(Path::root("things"), 30));
        let values: Vec<_> = set.iter().map(|p| p.value.clone()).collect();
        assert_eq!(
            values,
            vec![NativeValue::I64(10), NativeValue::I64(20), NativeValue::I64(30)]
        );
    }

    #[test]
    fn slices_by_prefix() {
        let mut set = PropertySet::new();
        set.push(prop(Path::root("addr").field("line"), 1));
        set.push(prop(Path::root("addr").field("zip"), 2));
        set.push(prop(Path::root("addrx"), 3));
        set.push(prop(Path::root("aaa"), 4));
        let slice = set.slice_with_prefix(&Path::root("addr"));
        assert_eq!(slice.len(), 2);
        assert!(slice.iter().all(|p| p.path.has_prefix(&Path::root("addr"))));
    }

    #[test]
    fn find_locates_exact_path() {
        let mut set = PropertySet::new();
        set.push(prop(Path::root("x"), 1));
        set.push(prop(Path::root("y"), 2));
        assert_eq!(set.find(&Path::root("y")).unwrap().value, NativeValue::I64(2));
        assert!(set.find(&Path::root("z")).is_none());
    }
}
