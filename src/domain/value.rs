// Values captured at the breakpoint, rebuilt as C initializers.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CapturedValue {
    /// A literal token exactly as the debugger printed it.
    Scalar(String),
    Sequence(Vec<CapturedValue>),
    /// Fields in declaration order.
    Struct(Vec<(String, CapturedValue)>),
}

impl CapturedValue {
    pub fn scalar(text: impl Into<String>) -> Self {
        CapturedValue::Scalar(text.into())
    }

    /// Number of top-level elements (fields for a struct, 1 for a scalar).
    pub fn element_count(&self) -> usize {
        match self {
            CapturedValue::Scalar(_) => 1,
            CapturedValue::Sequence(items) => items.len(),
            CapturedValue::Struct(fields) => fields.len(),
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        match self {
            CapturedValue::Struct(fields) => fields.iter().map(|(n, _)| n.as_str()).collect(),
            CapturedValue::Scalar(_) | CapturedValue::Sequence(_) => vec![],
        }
    }

    /// Render as a C initializer: `0x2`, `{0x1, 0x2}`, `{0xff, {0x1, 0x2}}`.
    /// Struct initializers are positional, in field order.
    pub fn to_initializer(&self) -> String {
        match self {
            CapturedValue::Scalar(text) => text.clone(),
            CapturedValue::Sequence(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_initializer()).collect();
                format!("{{{}}}", inner.join(", "))
            }
            CapturedValue::Struct(fields) => {
                let inner: Vec<String> = fields.iter().map(|(_, v)| v.to_initializer()).collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initializer_rendering() {
        let v = CapturedValue::Struct(vec![
            ("size".to_string(), CapturedValue::scalar("0x14")),
            (
                "data".to_string(),
                CapturedValue::Sequence(vec![CapturedValue::scalar("0x1"), CapturedValue::scalar("0x2")]),
            ),
        ]);
        assert_eq!(v.to_initializer(), "{0x14, {0x1, 0x2}}");
        assert_eq!(v.field_names(), vec!["size", "data"]);
        assert_eq!(v.element_count(), 2);
    }

    #[test]
    fn test_scalar_counts_as_one() {
        assert_eq!(CapturedValue::scalar("0x2").element_count(), 1);
        assert!(CapturedValue::scalar("0x2").field_names().is_empty());
    }
}
