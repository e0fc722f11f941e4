//! Query string encoding for loader options.
//!
//! Options travel through the host as the `?query` part of a request, so they
//! are flattened into `key=value` fragments joined by `&`. Only strings and
//! `true` flags survive the trip: `true` is written as a bare key, while
//! `false` and `null` are dropped.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{IndexError, Result};

/// Ordered option mapping carried in a query string.
pub type OptionSet = IndexMap<String, Value>;

/// Encode an option set as a query string, preserving insertion order.
pub fn encode(options: &OptionSet) -> Result<String> {
    let mut fragments = Vec::with_capacity(options.len());

    for (key, value) in options {
        match value {
            Value::String(value) => fragments.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )),
            Value::Bool(true) => fragments.push(urlencoding::encode(key).into_owned()),
            Value::Bool(false) | Value::Null => {}
            other => {
                return Err(IndexError::UnsupportedValue {
                    key: key.clone(),
                    value: other.clone(),
                });
            }
        }
    }

    Ok(fragments.join("&"))
}

/// Decode a query string produced by [`encode`].
///
/// Fragments without `=` decode to `true`. Empty fragments are skipped so
/// that the empty string decodes to the empty set.
pub fn decode(query: &str) -> Result<OptionSet> {
    let mut options = OptionSet::new();

    for fragment in query.split('&').filter(|f| !f.is_empty()) {
        match fragment.split_once('=') {
            Some((key, value)) => {
                let key = urlencoding::decode(key)?.into_owned();
                let value = urlencoding::decode(value)?.into_owned();
                options.insert(key, Value::String(value));
            }
            None => {
                let key = urlencoding::decode(fragment)?.into_owned();
                options.insert(key, Value::Bool(true));
            }
        }
    }

    Ok(options)
}

/// Split a request at its last `?` into the path part and the query part.
pub fn split_request(request: &str) -> Option<(&str, &str)> {
    request
        .rfind('?')
        .map(|i| (&request[..i], &request[i + 1..]))
}
