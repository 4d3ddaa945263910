//! The type lattice for expression checking.

use indexmap::IndexMap;

/// The type of an object value.
///
/// Property names are case-insensitive: they are stored lowercased and
/// looked up lowercased. A *strict* object rejects unknown properties;
/// a *loose* one resolves them to its mapped type (or [`ExprType::Unknown`]).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ObjectType {
    /// Whether unknown property accesses are errors.
    pub strict: bool,
    /// Known properties, keyed by lowercased name.
    pub props: IndexMap<String, ExprType>,
    /// The element type for arbitrary properties, if any.
    pub mapped: Option<Box<ExprType>>,
}

impl ObjectType {
    /// A loose object with no known properties.
    pub fn any() -> Self {
        Self::default()
    }

    /// A strict object with the given properties.
    pub fn strict(props: impl IntoIterator<Item = (impl Into<String>, ExprType)>) -> Self {
        Self {
            strict: true,
            props: Self::normalize(props),
            mapped: None,
        }
    }

    /// A loose object with the given known properties.
    pub fn loose(props: impl IntoIterator<Item = (impl Into<String>, ExprType)>) -> Self {
        Self {
            strict: false,
            props: Self::normalize(props),
            mapped: None,
        }
    }

    /// A loose object whose every property has type `elem`.
    pub fn map_of(elem: ExprType) -> Self {
        Self {
            strict: false,
            props: IndexMap::new(),
            mapped: Some(elem.into()),
        }
    }

    fn normalize(
        props: impl IntoIterator<Item = (impl Into<String>, ExprType)>,
    ) -> IndexMap<String, ExprType> {
        props
            .into_iter()
            .map(|(k, v)| (k.into().to_ascii_lowercase(), v))
            .collect()
    }

    /// Looks up a property case-insensitively.
    pub fn prop(&self, name: &str) -> Option<&ExprType> {
        self.props.get(&name.to_ascii_lowercase())
    }

    /// Inserts (or replaces) a property.
    pub fn insert(&mut self, name: impl Into<String>, ty: ExprType) {
        self.props.insert(name.into().to_ascii_lowercase(), ty);
    }
}

/// The type of an expression.
///
/// `Unknown` deliberately unifies with everything in both directions:
/// it is the result of every unresolved access, so one missing context
/// schema doesn't cascade into spurious errors downstream.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ExprType {
    /// An unknown ("any") type.
    #[default]
    Unknown,
    /// The null type.
    Null,
    /// A number.
    Number,
    /// A boolean.
    Bool,
    /// A string.
    String,
    /// An array with the given element type.
    Array(Box<ExprType>),
    /// An object.
    Object(ObjectType),
}

impl ExprType {
    /// An array of `elem`.
    pub fn array_of(elem: ExprType) -> Self {
        Self::Array(elem.into())
    }

    /// A loose object with no known properties.
    pub fn any_object() -> Self {
        Self::Object(ObjectType::any())
    }

    /// Whether a value of this type could also be of type `other`.
    ///
    /// This is a symmetric compatibility check, not subtyping:
    /// `Unknown` is compatible with everything, arrays are compared
    /// element-wise, and objects are compared on their shared
    /// properties only.
    pub fn compatible(&self, other: &ExprType) -> bool {
        match (self, other) {
            (ExprType::Unknown, _) | (_, ExprType::Unknown) => true,
            (ExprType::Array(a), ExprType::Array(b)) => a.compatible(b),
            (ExprType::Object(a), ExprType::Object(b)) => a
                .props
                .iter()
                .all(|(k, v)| b.prop(k).is_none_or(|other| v.compatible(other))),
            (a, b) => a == b,
        }
    }

    /// Fuses two types into the type of a value that may be either.
    ///
    /// Used when building aggregate types (matrix rows, fused array
    /// elements): identical types stay as-is, objects merge their
    /// properties, and everything else collapses to `Unknown`.
    pub fn fuse(self, other: ExprType) -> ExprType {
        match (self, other) {
            (a, b) if a == b => a,
            (ExprType::Unknown, _) | (_, ExprType::Unknown) => ExprType::Unknown,
            (ExprType::Array(a), ExprType::Array(b)) => ExprType::Array(a.fuse(*b).into()),
            (ExprType::Object(mut a), ExprType::Object(b)) => {
                for (k, v) in b.props {
                    match a.props.shift_remove(&k) {
                        Some(existing) => {
                            a.props.insert(k, existing.fuse(v));
                        }
                        None => {
                            a.props.insert(k, v);
                        }
                    }
                }
                a.strict = a.strict && b.strict;
                a.mapped = match (a.mapped, b.mapped) {
                    (Some(x), Some(y)) => Some(x.fuse(*y).into()),
                    (one, two) => one.or(two),
                };
                ExprType::Object(a)
            }
            _ => ExprType::Unknown,
        }
    }
}

impl std::fmt::Display for ExprType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprType::Unknown => write!(f, "any"),
            ExprType::Null => write!(f, "null"),
            ExprType::Number => write!(f, "number"),
            ExprType::Bool => write!(f, "bool"),
            ExprType::String => write!(f, "string"),
            ExprType::Array(elem) => write!(f, "array<{elem}>"),
            ExprType::Object(_) => write!(f, "object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_prop_lookup_is_case_insensitive() {
        let obj = ObjectType::strict([("Foo", ExprType::String)]);
        assert_eq!(obj.prop("foo"), Some(&ExprType::String));
        assert_eq!(obj.prop("FOO"), Some(&ExprType::String));
        assert_eq!(obj.prop("bar"), None);
    }

    #[test]
    fn test_unknown_is_compatible_with_everything() {
        for ty in [
            ExprType::Null,
            ExprType::Number,
            ExprType::Bool,
            ExprType::String,
            ExprType::array_of(ExprType::String),
            ExprType::any_object(),
        ] {
            assert!(ExprType::Unknown.compatible(&ty));
            assert!(ty.compatible(&ExprType::Unknown));
        }
    }

    #[test]
    fn test_fuse_objects_merges_props() {
        let a = ExprType::Object(ObjectType::strict([("os", ExprType::String)]));
        let b = ExprType::Object(ObjectType::strict([
            ("os", ExprType::String),
            ("version", ExprType::Number),
        ]));

        let ExprType::Object(fused) = a.fuse(b) else {
            panic!("expected an object");
        };
        assert!(fused.strict);
        assert_eq!(fused.prop("os"), Some(&ExprType::String));
        assert_eq!(fused.prop("version"), Some(&ExprType::Number));
    }

    #[test]
    fn test_fuse_mismatched_collapses() {
        assert_eq!(
            ExprType::String.fuse(ExprType::Number),
            ExprType::Unknown
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ExprType::array_of(ExprType::String).to_string(), "array<string>");
        assert_eq!(ExprType::Unknown.to_string(), "any");
    }
}
