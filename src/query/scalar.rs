use std::cmp::Ordering;
use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Serialize, Serializer};

/// A single cell read from the relationship store.
///
/// Numeric schedule columns are frequently stored as text (and sometimes as
/// blanks), so cells are kept in whatever shape SQLite hands back and only
/// interpreted on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    /// Numeric interpretation, parsing text when possible.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Null => None,
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Real(r) => Some(*r),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Null or blank text. Missing cells can never be selected as a facet value.
    pub fn is_missing(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Literal text form, used for chart keys and lexical ordering.
    pub fn to_key(&self) -> String {
        self.to_string()
    }

    /// Parseable values as a number, whole numbers as `Integer`, so that
    /// `"5"`, `"5.0"` and `5` compare and key alike. Anything else is
    /// returned unchanged.
    pub fn normalized(self) -> Scalar {
        match self.as_number() {
            Some(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                Scalar::Integer(n as i64)
            }
            Some(n) => Scalar::Real(n),
            None => self,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Real(r) => write!(f, "{r}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Numeric order with a text fallback: parseable values first, by value;
/// everything else after, lexically.
pub fn numeric_order(a: &Scalar, b: &Scalar) -> Ordering {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_key().cmp(&b.to_key()),
    }
}

pub fn lexical_order(a: &Scalar, b: &Scalar) -> Ordering {
    a.to_key().cmp(&b.to_key())
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}

impl FromSql for Scalar {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Scalar::Null,
            ValueRef::Integer(i) => Scalar::Integer(i),
            ValueRef::Real(r) => Scalar::Real(r),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Scalar::Text(String::from_utf8_lossy(t).into_owned())
            }
        })
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Scalar::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Real(r) => serializer.serialize_f64(*r),
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}
