//! Item values: the null placeholders, numbers with standard uncertainties
//! and conversions between text and typed values.

/// `true` for the values that mean "no value": empty, `.` (inapplicable)
/// and `?` (unknown).
pub fn is_null(value: &str) -> bool {
    matches!(value, "" | "." | "?")
}

/// Strip a trailing standard uncertainty, `1.23(4)` becomes `1.23`.
pub fn strip_uncertainty(value: &str) -> &str {
    match value.strip_suffix(')').and_then(|v| v.rfind('(').map(|open| (v, open))) {
        Some((v, open)) if v[open + 1..].bytes().all(|b| b.is_ascii_digit()) => &v[..open],
        _ => value,
    }
}

/// Read a CIF number, ignoring any standard uncertainty.
pub fn parse_number(value: &str) -> Option<f64> {
    let value = strip_uncertainty(value.trim());
    let first = *value.as_bytes().first()?;
    if !(first.is_ascii_digit() || matches!(first, b'+' | b'-' | b'.')) {
        // rules out "inf", "NaN" and friends
        return None;
    }
    value.parse().ok()
}

/// A name/value pair used to build or update a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub value: String,
}

impl Item {
    pub fn new(name: impl Into<String>, value: impl IntoItemValue) -> Self {
        Self {
            name: name.into(),
            value: value.into_item_value(),
        }
    }
}

/// Conversion of a typed value into item text.
pub trait IntoItemValue {
    fn into_item_value(self) -> String;
}

impl IntoItemValue for String {
    fn into_item_value(self) -> String {
        self
    }
}

impl IntoItemValue for &str {
    fn into_item_value(self) -> String {
        self.to_string()
    }
}

impl IntoItemValue for &String {
    fn into_item_value(self) -> String {
        self.clone()
    }
}

impl IntoItemValue for char {
    fn into_item_value(self) -> String {
        self.to_string()
    }
}

impl IntoItemValue for bool {
    fn into_item_value(self) -> String {
        let text = if self { "y" } else { "n" };
        text.to_string()
    }
}

/// `None` is written as `?`, the unknown value.
impl<T: IntoItemValue> IntoItemValue for Option<T> {
    fn into_item_value(self) -> String {
        match self {
            Some(value) => value.into_item_value(),
            None => "?".to_string(),
        }
    }
}

macro_rules! display_into_item_value {
    ($($t:ty),*) => {
        $(impl IntoItemValue for $t {
            fn into_item_value(self) -> String {
                self.to_string()
            }
        })*
    };
}

display_into_item_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Conversion of item text into a typed value. Null values convert to `None`.
pub trait FromItemValue: Sized {
    fn from_item_value(value: &str) -> Option<Self>;
}

impl FromItemValue for String {
    fn from_item_value(value: &str) -> Option<Self> {
        (!is_null(value)).then(|| value.to_string())
    }
}

impl FromItemValue for bool {
    fn from_item_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(true),
            "n" | "no" => Some(false),
            _ => None,
        }
    }
}

macro_rules! parse_from_item_value {
    ($($t:ty),*) => {
        $(impl FromItemValue for $t {
            fn from_item_value(value: &str) -> Option<Self> {
                strip_uncertainty(value.trim()).parse().ok()
            }
        })*
    };
}

parse_from_item_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromItemValue for f64 {
    fn from_item_value(value: &str) -> Option<Self> {
        parse_number(value)
    }
}

impl FromItemValue for f32 {
    fn from_item_value(value: &str) -> Option<Self> {
        parse_number(value).map(|v| v as f32)
    }
}
