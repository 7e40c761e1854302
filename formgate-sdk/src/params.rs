//! Request parameter model.
//!
//! Query strings and request bodies are both decoded into [`Params`]: a
//! key-sorted map whose values are strings, lists, or one level of nested
//! maps. Form bodies follow the usual bracket conventions:
//!
//! ```text
//! name=Jo        -> {"name": "Jo"}
//! tags[]=a&tags[]=b -> {"tags": ["a", "b"]}
//! address[city]=Delft -> {"address": {"city": "Delft"}}
//! ```
//!
//! A plain key given twice keeps the last value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parameter mapping. Keys are kept sorted, which makes every
/// serialization of a `Params` value deterministic.
pub type Params = BTreeMap<String, ParamValue>;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// The string value, if this is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `true` for an empty string, an empty list or an empty map.
    pub fn is_blank(&self) -> bool {
        match self {
            ParamValue::Text(s) => s.is_empty(),
            ParamValue::List(items) => items.is_empty(),
            ParamValue::Map(map) => map.is_empty(),
        }
    }

    /// Convert a JSON value. Numbers and booleans become their textual
    /// form; `null` has no parameter representation and yields `None`.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ParamValue::Text(b.to_string())),
            Value::Number(n) => Some(ParamValue::Text(n.to_string())),
            Value::String(s) => Some(ParamValue::Text(s)),
            Value::Array(items) => Some(ParamValue::List(
                items.into_iter().filter_map(ParamValue::from_json).collect(),
            )),
            Value::Object(map) => Some(ParamValue::Map(
                map.into_iter()
                    .filter_map(|(k, v)| ParamValue::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Errors produced when decoding a request body or encoding a query string.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json body must be an object")]
    NotAnObject,
    #[error("parameter {0:?} nests deeper than a query string can carry")]
    TooDeep(String),
}

/// Decode an `application/x-www-form-urlencoded` string (a query string or
/// a form body).
pub fn parse_query(input: &str) -> Params {
    let mut params = Params::new();
    for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
        insert_pair(&mut params, &key, value.into_owned());
    }
    params
}

/// Decode a JSON object body.
pub fn parse_json(input: &str) -> Result<Params, ParamsError> {
    if input.trim().is_empty() {
        return Ok(Params::new());
    }
    match serde_json::from_str::<serde_json::Value>(input)? {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(k, v)| ParamValue::from_json(v).map(|v| (k, v)))
            .collect()),
        _ => Err(ParamsError::NotAnObject),
    }
}

fn insert_pair(params: &mut Params, key: &str, value: String) {
    let Some(open) = key.find('[') else {
        params.insert(key.to_owned(), ParamValue::Text(value));
        return;
    };
    let (name, rest) = key.split_at(open);
    let Some(inner) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) else {
        params.insert(key.to_owned(), ParamValue::Text(value));
        return;
    };
    if name.is_empty() {
        params.insert(key.to_owned(), ParamValue::Text(value));
        return;
    }

    let slot = params.entry(name.to_owned());
    if inner.is_empty() {
        let entry = slot.or_insert_with(|| ParamValue::List(Vec::new()));
        match entry {
            ParamValue::List(items) => items.push(ParamValue::Text(value)),
            other => *other = ParamValue::List(vec![ParamValue::Text(value)]),
        }
    } else {
        let entry = slot.or_insert_with(|| ParamValue::Map(BTreeMap::new()));
        match entry {
            ParamValue::Map(map) => {
                map.insert(inner.to_owned(), ParamValue::Text(value));
            }
            other => {
                *other = ParamValue::Map(BTreeMap::from([(
                    inner.to_owned(),
                    ParamValue::Text(value),
                )]));
            }
        }
    }
}

/// Serialize parameters into a query string, percent-encoding keys and
/// values once. Inverse of [`parse_query`] for the shapes it produces.
///
/// Lists and maps may only hold strings. Anything nested deeper has no
/// bracket form that [`parse_query`] reads back, so it is refused instead of
/// being dropped from the output.
pub fn to_query_string(params: &Params) -> Result<String, ParamsError> {
    let mut pairs: Vec<String> = Vec::new();
    for (key, value) in params {
        let too_deep = || ParamsError::TooDeep(key.clone());
        let encoded_key = urlencoding::encode(key);
        match value {
            ParamValue::Text(s) => pairs.push(format!("{encoded_key}={}", urlencoding::encode(s))),
            ParamValue::List(items) => {
                for item in items {
                    let item = item.as_str().ok_or_else(too_deep)?;
                    pairs.push(format!("{encoded_key}%5B%5D={}", urlencoding::encode(item)));
                }
            }
            ParamValue::Map(map) => {
                for (sub, item) in map {
                    let item = item.as_str().ok_or_else(too_deep)?;
                    pairs.push(format!(
                        "{encoded_key}%5B{}%5D={}",
                        urlencoding::encode(sub),
                        urlencoding::encode(item)
                    ));
                }
            }
        }
    }
    Ok(pairs.join("&"))
}
