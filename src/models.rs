use serde::Serialize;
use std::fmt;

/// Placeholders that count as "no value" when rendering / 视为空值的占位符
const NULL_MARKERS: &[&str] = &["nan", "none", "null"];

/// Scalar stored in one cell of the master table / 主表单元格的值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    /// Empty, SQL NULL or a null-like placeholder ("nan", "None", "null") / 是否为空值
    pub fn is_null_like(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Real(v) => v.is_nan(),
            FieldValue::Text(s) => {
                let s = s.trim();
                s.is_empty() || NULL_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m))
            }
            FieldValue::Blob(b) => b.is_empty(),
            FieldValue::Integer(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Integer(v) => write!(f, "{}", v),
            // Spreadsheet imports store whole numbers as REAL
            FieldValue::Real(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            FieldValue::Real(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s.trim()),
            FieldValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// One row of the master table, columns in table order / 主表中的一行
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    pub fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    /// Look up a value by column name (case-insensitive) / 按列名取值
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    /// Columns worth displaying / 需要展示的列
    pub fn visible_fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .filter(|(_, value)| !value.is_null_like())
            .map(|(name, value)| (name.as_str(), value))
    }
}
