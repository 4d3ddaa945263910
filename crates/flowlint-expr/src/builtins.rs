//! The closed set of built-in function signatures.

use crate::types::ExprType;

/// A coarse parameter kind, loose enough to model the engine's
/// coercion rules without a full subtype relation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Any value.
    Any,
    /// A string, or anything that coerces to one (numbers, booleans).
    Stringish,
    /// An array, or a single value treated as a one-element array
    /// (the `contains` haystack rule).
    Searchable,
    /// An array of strings, or a single string.
    StringArray,
}

impl ParamKind {
    /// Whether `ty` is acceptable for this parameter.
    pub fn accepts(&self, ty: &ExprType) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::Stringish => !matches!(ty, ExprType::Array(_) | ExprType::Object(_)),
            ParamKind::Searchable => !matches!(ty, ExprType::Object(_)),
            ParamKind::StringArray => match ty {
                ExprType::Unknown | ExprType::String => true,
                ExprType::Array(elem) => {
                    matches!(**elem, ExprType::String | ExprType::Unknown)
                }
                _ => false,
            },
        }
    }

    /// A human-readable name for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ParamKind::Any => "any",
            ParamKind::Stringish => "string",
            ParamKind::Searchable => "array or string",
            ParamKind::StringArray => "array of strings",
        }
    }
}

/// A built-in function's signature.
#[derive(Clone, Debug)]
pub struct Signature {
    /// The function's canonical name.
    pub name: &'static str,
    /// Fixed (leading) parameters.
    pub params: &'static [ParamKind],
    /// The kind of any trailing variadic parameters, if the function
    /// is variadic.
    pub rest: Option<ParamKind>,
    /// How many of `params` may be omitted, counted from the end.
    pub optional: usize,
    /// The call's result type.
    pub ret: ExprType,
}

impl Signature {
    /// The minimum number of arguments the function accepts.
    pub fn min_args(&self) -> usize {
        self.params.len() - self.optional
    }

    /// The maximum number of arguments, or `None` if variadic.
    pub fn max_args(&self) -> Option<usize> {
        self.rest.is_none().then_some(self.params.len())
    }

    /// The parameter kind for the argument at `idx`.
    pub fn param_at(&self, idx: usize) -> Option<ParamKind> {
        self.params.get(idx).copied().or(self.rest)
    }
}

/// Looks up a built-in function signature case-insensitively.
///
/// `cancelled` and `canceled` are both accepted: the engine this
/// language comes from registers both spellings.
pub fn lookup(name: &str) -> Option<Signature> {
    use ExprType::*;
    use ParamKind::*;

    let sig = match name.to_ascii_lowercase().as_str() {
        "contains" => Signature {
            name: "contains",
            params: &[Searchable, Any],
            rest: None,
            optional: 0,
            ret: Bool,
        },
        "startswith" => Signature {
            name: "startsWith",
            params: &[Stringish, Stringish],
            rest: None,
            optional: 0,
            ret: Bool,
        },
        "endswith" => Signature {
            name: "endsWith",
            params: &[Stringish, Stringish],
            rest: None,
            optional: 0,
            ret: Bool,
        },
        "format" => Signature {
            name: "format",
            params: &[Stringish],
            rest: Some(Any),
            optional: 0,
            ret: String,
        },
        "join" => Signature {
            name: "join",
            params: &[StringArray, Stringish],
            rest: None,
            optional: 1,
            ret: String,
        },
        "tojson" => Signature {
            name: "toJSON",
            params: &[Any],
            rest: None,
            optional: 0,
            ret: String,
        },
        "fromjson" => Signature {
            name: "fromJSON",
            params: &[Stringish],
            rest: None,
            optional: 0,
            ret: Unknown,
        },
        "hashfiles" => Signature {
            name: "hashFiles",
            params: &[Stringish],
            rest: Some(Stringish),
            optional: 0,
            ret: String,
        },
        "success" => Signature {
            name: "success",
            params: &[],
            rest: None,
            optional: 0,
            ret: Bool,
        },
        "failure" => Signature {
            name: "failure",
            params: &[],
            rest: None,
            optional: 0,
            ret: Bool,
        },
        "cancelled" | "canceled" => Signature {
            name: "cancelled",
            params: &[],
            rest: None,
            optional: 0,
            ret: Bool,
        },
        "always" => Signature {
            name: "always",
            params: &[],
            rest: None,
            optional: 0,
            ret: Bool,
        },
        _ => return None,
    };

    Some(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExprType;

    #[test]
    fn test_lookup_case_insensitive() {
        assert!(lookup("FORMAT").is_some());
        assert!(lookup("fromJson").is_some());
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_cancelled_aliases() {
        assert!(lookup("cancelled").is_some());
        assert!(lookup("canceled").is_some());
    }

    #[test]
    fn test_arity_bounds() {
        let join = lookup("join").unwrap();
        assert_eq!(join.min_args(), 1);
        assert_eq!(join.max_args(), Some(2));

        let format = lookup("format").unwrap();
        assert_eq!(format.min_args(), 1);
        assert_eq!(format.max_args(), None);
    }

    #[test]
    fn test_param_kinds() {
        assert!(ParamKind::Stringish.accepts(&ExprType::Number));
        assert!(!ParamKind::Stringish.accepts(&ExprType::any_object()));
        assert!(ParamKind::StringArray.accepts(&ExprType::array_of(ExprType::String)));
        assert!(!ParamKind::StringArray.accepts(&ExprType::array_of(ExprType::Number)));
    }
}
