//! Resolved type shapes attached to declarations by the front-end.
//!
//! Shapes are compared structurally and never mutated. `Named` shapes refer
//! to a type declaration by package and name; resolving them to their
//! underlying shape goes through the snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resolved type of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TypeShape {
    /// The front-end could not resolve a type.
    #[default]
    Unknown,
    /// Predeclared type (`int`, `string`, `error`, ...).
    Basic { name: String },
    /// Defined type, referenced by package and name.
    Named { package: String, name: String },
    Pointer { elem: Box<TypeShape> },
    Slice { elem: Box<TypeShape> },
    Array { len: Option<u64>, elem: Box<TypeShape> },
    Map {
        key: Box<TypeShape>,
        value: Box<TypeShape>,
    },
    Chan { elem: Box<TypeShape> },
    Func { sig: Signature },
    Struct { fields: Vec<FieldShape> },
    Interface { methods: Vec<MethodSig> },
}

/// Parameter and result types, compared positionally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Signature {
    pub params: Vec<TypeShape>,
    pub results: Vec<TypeShape>,
    #[serde(default)]
    pub variadic: bool,
}

/// Named method signature within an interface or method set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    pub sig: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldShape {
    pub name: String,
    pub ty: TypeShape,
    #[serde(default)]
    pub embedded: bool,
}

impl TypeShape {
    pub fn basic(name: impl Into<String>) -> Self {
        TypeShape::Basic { name: name.into() }
    }

    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        TypeShape::Named {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn pointer(elem: TypeShape) -> Self {
        TypeShape::Pointer {
            elem: Box::new(elem),
        }
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, TypeShape::Interface { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeShape::Unknown)
    }

    /// Short description of the shape's kind, e.g. `struct` or `interface`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeShape::Unknown => "unknown",
            TypeShape::Basic { .. } => "basic",
            TypeShape::Named { .. } => "named",
            TypeShape::Pointer { .. } => "pointer",
            TypeShape::Slice { .. } => "slice",
            TypeShape::Array { .. } => "array",
            TypeShape::Map { .. } => "map",
            TypeShape::Chan { .. } => "chan",
            TypeShape::Func { .. } => "func",
            TypeShape::Struct { .. } => "struct",
            TypeShape::Interface { .. } => "interface",
        }
    }

    /// Strip one level of pointer indirection.
    pub fn deref(&self) -> &TypeShape {
        match self {
            TypeShape::Pointer { elem } => elem,
            other => other,
        }
    }

    /// Structural identity.
    ///
    /// Interface method sets compare without regard to order; `Unknown` is
    /// never identical to anything, itself included.
    pub fn identical(&self, other: &TypeShape) -> bool {
        use TypeShape::*;
        match (self, other) {
            (Unknown, _) | (_, Unknown) => false,
            (Basic { name: a }, Basic { name: b }) => a == b,
            (
                Named {
                    package: pa,
                    name: na,
                },
                Named {
                    package: pb,
                    name: nb,
                },
            ) => pa == pb && na == nb,
            (Pointer { elem: a }, Pointer { elem: b })
            | (Slice { elem: a }, Slice { elem: b })
            | (Chan { elem: a }, Chan { elem: b }) => a.identical(b),
            (Array { len: la, elem: a }, Array { len: lb, elem: b }) => la == lb && a.identical(b),
            (Map { key: ka, value: va }, Map { key: kb, value: vb }) => {
                ka.identical(kb) && va.identical(vb)
            }
            (Func { sig: a }, Func { sig: b }) => a.identical(b),
            (Struct { fields: a }, Struct { fields: b }) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(fa, fb)| {
                        fa.name == fb.name && fa.embedded == fb.embedded && fa.ty.identical(&fb.ty)
                    })
            }
            (Interface { methods: a }, Interface { methods: b }) => {
                a.len() == b.len() && a.iter().all(|ma| contains_identical(b, ma))
            }
            _ => false,
        }
    }
}

impl Signature {
    pub fn new(params: Vec<TypeShape>, results: Vec<TypeShape>) -> Self {
        Signature {
            params,
            results,
            variadic: false,
        }
    }

    /// Positional identity of parameter and result types.
    pub fn identical(&self, other: &Signature) -> bool {
        self.variadic == other.variadic
            && self.params.len() == other.params.len()
            && self.results.len() == other.results.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.identical(b))
            && self
                .results
                .iter()
                .zip(&other.results)
                .all(|(a, b)| a.identical(b))
    }
}

impl MethodSig {
    pub fn new(name: impl Into<String>, sig: Signature) -> Self {
        MethodSig {
            name: name.into(),
            sig,
        }
    }
}

/// Whether `set` has a method with `method`'s name and an identical signature.
pub fn contains_identical(set: &[MethodSig], method: &MethodSig) -> bool {
    set.iter()
        .any(|m| m.name == method.name && m.sig.identical(&method.sig))
}

// ============================================================================
// Canonical Rendering
// ============================================================================

fn write_list(f: &mut fmt::Formatter<'_>, shapes: &[TypeShape], variadic: bool) -> fmt::Result {
    for (i, shape) in shapes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if variadic && i + 1 == shapes.len() {
            match shape {
                TypeShape::Slice { elem } => write!(f, "...{}", elem)?,
                other => write!(f, "...{}", other)?,
            }
        } else {
            write!(f, "{}", shape)?;
        }
    }
    Ok(())
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_list(f, &self.params, self.variadic)?;
        write!(f, ")")?;
        match self.results.len() {
            0 => Ok(()),
            1 => write!(f, " {}", self.results[0]),
            _ => {
                write!(f, " (")?;
                write_list(f, &self.results, false)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Unknown => write!(f, "<unknown>"),
            TypeShape::Basic { name } => write!(f, "{}", name),
            TypeShape::Named { package, name } => write!(f, "{}.{}", package, name),
            TypeShape::Pointer { elem } => write!(f, "*{}", elem),
            TypeShape::Slice { elem } => write!(f, "[]{}", elem),
            TypeShape::Array { len, elem } => match len {
                Some(len) => write!(f, "[{}]{}", len, elem),
                None => write!(f, "[...]{}", elem),
            },
            TypeShape::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeShape::Chan { elem } => write!(f, "chan {}", elem),
            TypeShape::Func { sig } => write!(f, "func{}", sig),
            TypeShape::Struct { fields } => {
                write!(f, "struct{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    if field.embedded {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{} {}", field.name, field.ty)?;
                    }
                }
                write!(f, "}}")
            }
            TypeShape::Interface { methods } => {
                let mut sorted: Vec<&MethodSig> = methods.iter().collect();
                sorted.sort_by(|a, b| a.name.cmp(&b.name));
                write!(f, "interface{{")?;
                for (i, method) in sorted.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}{}", method.name, method.sig)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes() -> TypeShape {
        TypeShape::Slice {
            elem: Box::new(TypeShape::basic("byte")),
        }
    }

    fn storage() -> TypeShape {
        TypeShape::Interface {
            methods: vec![
                MethodSig::new(
                    "Save",
                    Signature::new(
                        vec![TypeShape::basic("string"), bytes()],
                        vec![TypeShape::basic("error")],
                    ),
                ),
                MethodSig::new(
                    "Load",
                    Signature::new(
                        vec![TypeShape::basic("string")],
                        vec![bytes(), TypeShape::basic("error")],
                    ),
                ),
            ],
        }
    }

    #[test]
    fn interface_identity_ignores_method_order() {
        let a = storage();
        let TypeShape::Interface { mut methods } = storage() else {
            unreachable!()
        };
        methods.reverse();
        let b = TypeShape::Interface { methods };
        assert!(a.identical(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_is_never_identical() {
        assert!(!TypeShape::Unknown.identical(&TypeShape::Unknown));
    }

    #[test]
    fn signature_identity_ignores_names_but_not_arity() {
        let one = Signature::new(vec![TypeShape::basic("int")], vec![]);
        let two = Signature::new(vec![TypeShape::basic("int"), TypeShape::basic("int")], vec![]);
        assert!(!one.identical(&two));
        assert!(one.identical(&one.clone()));
    }

    #[test]
    fn canonical_rendering() {
        assert_eq!(
            storage().to_string(),
            "interface{Load(string) ([]byte, error); Save(string, []byte) error}"
        );
        assert_eq!(
            TypeShape::pointer(TypeShape::named("store", "Mem")).to_string(),
            "*store.Mem"
        );
        let variadic = Signature {
            params: vec![bytes()],
            results: vec![],
            variadic: true,
        };
        assert_eq!(TypeShape::Func { sig: variadic }.to_string(), "func(...byte)");
    }
}
