// Parameter and return type descriptors for C function definitions.
// Shapes drive every later stage: capture, result parsing and synthesis all
// match on `ParamShape` exhaustively.

use serde::Serialize;

/// Memory shape of a single parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ParamShape {
    /// Plain value: integers, floating point, enums, unknown typedefs.
    Scalar,
    /// `T *name`. `pointee` is the spelled `T`.
    Pointer { pointee: String },
    /// `T name[]` or `T name[][N]`. `inner_dims` keeps everything after the
    /// first dimension, e.g. `[20]`.
    Array { element: String, inner_dims: String },
    /// A named record passed by value.
    Struct { type_name: String },
}

impl ParamShape {
    pub fn is_pointer_like(&self) -> bool {
        matches!(self, ParamShape::Pointer { .. } | ParamShape::Array { .. })
    }

    /// Element type whose size the layout pass asks the debugger for.
    pub fn element_type(&self) -> Option<&str> {
        match self {
            ParamShape::Pointer { pointee } => Some(pointee),
            ParamShape::Array { element, .. } => Some(element),
            ParamShape::Scalar | ParamShape::Struct { .. } => None,
        }
    }
}

/// One declared parameter of a function definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDescriptor {
    pub name: String,
    /// Declared type text before the name, e.g. `const int *`.
    pub type_prefix: String,
    /// Declarator text after the name, e.g. `[][20]`.
    pub type_suffix: String,
    pub shape: ParamShape,
}

impl ParameterDescriptor {
    /// The declared type with the name removed: `int *`, `int [][20]`.
    pub fn declared_type(&self) -> String {
        if self.type_suffix.is_empty() {
            self.type_prefix.clone()
        } else {
            format!("{} {}", self.type_prefix, self.type_suffix)
        }
    }

    /// Type used to cast the driver's local variable at the call site.
    /// Struct arguments are passed as-is; C has no cast to a record type.
    pub fn call_cast(&self) -> Option<String> {
        match &self.shape {
            ParamShape::Scalar | ParamShape::Pointer { .. } => Some(self.type_prefix.clone()),
            ParamShape::Array {
                element,
                inner_dims,
            } => {
                if inner_dims.is_empty() {
                    Some(format!("{} *", element))
                } else {
                    Some(format!("{} (*){}", element, inner_dims))
                }
            }
            ParamShape::Struct { .. } => None,
        }
    }

    /// Floating point scalars are dumped and printed in decimal.
    pub fn is_floating(&self) -> bool {
        matches!(self.shape, ParamShape::Scalar)
            && self
                .type_prefix
                .split_whitespace()
                .any(|t| t == "float" || t == "double")
    }
}

/// Coarse classification of a return type, enough to pick a printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Void,
    Integer,
    Floating,
    Pointer,
    Struct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnType {
    pub spelled: String,
    pub kind: ReturnKind,
}

impl ReturnType {
    pub fn new(spelled: impl Into<String>, kind: ReturnKind) -> Self {
        Self {
            spelled: spelled.into(),
            kind,
        }
    }

    pub fn void() -> Self {
        Self::new("void", ReturnKind::Void)
    }

    pub fn is_void(&self) -> bool {
        self.kind == ReturnKind::Void
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(prefix: &str, name: &str, suffix: &str, shape: ParamShape) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            type_prefix: prefix.to_string(),
            type_suffix: suffix.to_string(),
            shape,
        }
    }

    #[test]
    fn test_array_cast_keeps_inner_dimensions() {
        let p = param(
            "int",
            "arr3",
            "[][20]",
            ParamShape::Array {
                element: "int".to_string(),
                inner_dims: "[20]".to_string(),
            },
        );
        assert_eq!(p.call_cast().as_deref(), Some("int (*)[20]"));
        assert_eq!(p.declared_type(), "int [][20]");
    }

    #[test]
    fn test_flat_array_cast_is_plain_pointer() {
        let p = param(
            "unsigned char",
            "buf",
            "[]",
            ParamShape::Array {
                element: "unsigned char".to_string(),
                inner_dims: String::new(),
            },
        );
        assert_eq!(p.call_cast().as_deref(), Some("unsigned char *"));
    }

    #[test]
    fn test_struct_has_no_cast() {
        let p = param(
            "rgb",
            "color",
            "",
            ParamShape::Struct {
                type_name: "rgb".to_string(),
            },
        );
        assert_eq!(p.call_cast(), None);
        assert_eq!(p.shape.element_type(), None);
    }

    #[test]
    fn test_floating_detection() {
        assert!(param("double", "x", "", ParamShape::Scalar).is_floating());
        assert!(!param("unsigned int", "x", "", ParamShape::Scalar).is_floating());
    }
}
