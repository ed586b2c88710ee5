use std::fmt;

use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeStruct},
};

use crate::error::FeatureError;

/// One value in a [`ResultRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Float(f64),
    Int(i64),
    Text(String),
    Tuple(Vec<f64>),
    IntTuple(Vec<usize>),
    /// Computation failed for this key; the rest of the run carried on
    Error(FeatureError),
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for FeatureValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<[f64; 3]> for FeatureValue {
    fn from(v: [f64; 3]) -> Self {
        Self::Tuple(v.to_vec())
    }
}

impl From<[usize; 3]> for FeatureValue {
    fn from(v: [usize; 3]) -> Self {
        Self::IntTuple(v.to_vec())
    }
}

impl From<std::result::Result<f64, FeatureError>> for FeatureValue {
    fn from(outcome: std::result::Result<f64, FeatureError>) -> Self {
        match outcome {
            Ok(v) => Self::Float(v),
            Err(e) => Self::Error(e),
        }
    }
}

impl fmt::Display for FeatureValue {
    /// Flat text form, used for CSV output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
        }
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Tuple(v) => write!(f, "({})", join(v)),
            Self::IntTuple(v) => write!(f, "({})", join(v)),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

impl Serialize for FeatureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Tuple(v) => v.serialize(serializer),
            Self::IntTuple(v) => v.serialize(serializer),
            Self::Error(e) => {
                let mut s = serializer.serialize_struct("FeatureError", 1)?;
                s.serialize_field("error", &e.to_string())?;
                s.end()
            }
        }
    }
}

/// Ordered, append-only mapping from result key to value.
///
/// Keys keep insertion order. Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRecord {
    entries: Vec<(String, FeatureValue)>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<FeatureValue>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn extend(&mut self, other: ResultRecord) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries whose key does not start with `diagnostics_`.
    pub fn features(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.iter().filter(|(k, _)| !k.starts_with("diagnostics_"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `key,value` lines with a header row.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("key,value\n");
        for (key, value) in self.iter() {
            let text = value.to_string();
            if text.contains([',', '"', '\n']) {
                out.push_str(&format!("{key},\"{}\"\n", text.replace('"', "\"\"")));
            } else {
                out.push_str(&format!("{key},{text}\n"));
            }
        }
        out
    }
}

impl Serialize for ResultRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a ResultRecord {
    type Item = (&'a str, &'a FeatureValue);
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscretizationError;

    #[test]
    fn test_insertion_order_is_kept() {
        let mut record = ResultRecord::new();
        record.push("b", 1.0);
        record.push("a", 2usize);
        record.push("c", "text");
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(record.get("a"), Some(&FeatureValue::Int(2)));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_json_keeps_order_and_marks_errors() {
        let mut record = ResultRecord::new();
        record.push("z_first", 1.5);
        record.push("a_second", [1usize, 2, 3]);
        record.push(
            "m_third",
            FeatureValue::Error(DiscretizationError::SingleValuedRegion { value: 3.0 }.into()),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with(r#"{"z_first":1.5,"a_second":[1,2,3],"m_third":{"error":"#));
    }

    #[test]
    fn test_csv_quotes_commas() {
        let mut record = ResultRecord::new();
        record.push("settings", "{\"a\":1,\"b\":2}");
        record.push("spacing", [1.0, 1.0, 2.5]);
        let csv = record.to_csv();
        assert_eq!(
            csv,
            "key,value\nsettings,\"{\"\"a\"\":1,\"\"b\"\":2}\"\nspacing,(1 1 2.5)\n"
        );
    }

    #[test]
    fn test_feature_iterator_skips_diagnostics() {
        let mut record = ResultRecord::new();
        record.push("diagnostics_Versions_Radiomics", "0.1.0");
        record.push("original_firstorder_Mean", 2.0);
        assert_eq!(record.features().count(), 1);
    }
}
