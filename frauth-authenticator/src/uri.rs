//! Query handling shared by the QR code parsers.

use std::{borrow::Cow, collections::HashMap};

use percent_encoding::percent_decode_str;
use url::Url;

fn decode_component(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

// `+` is kept as is: the values are base64 and nobody form encodes them.
pub(crate) fn query_params(uri: &Url) -> HashMap<String, String> {
    uri.query()
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (decode_component(k).into_owned(), decode_component(v).into_owned()))
        .collect()
}

/// `(issuer, label)` from a `/<issuer>:<label>` path; a single component is the label.
pub(crate) fn issuer_and_label(uri: &Url) -> (String, String) {
    let path = decode_component(uri.path().trim_start_matches('/'));
    match path.split_once(':') {
        Some((issuer, label)) => (issuer.to_owned(), label.to_owned()),
        None => (String::new(), path.into_owned()),
    }
}
