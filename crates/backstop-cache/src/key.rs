use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Derives the cache key for a request identity.
///
/// The identity is `url + "?" + params` with parameters serialized as
/// `key=value` pairs joined by `&`, sorted lexicographically by key (the
/// `BTreeMap` iteration order). The sorted serialization is what makes two
/// permutations of the same parameter map collide to the same key. The
/// digest is hex-encoded SHA-256, which is also safe to use directly as a
/// file name on the persistent tier.
pub fn cache_key(url: &str, params: &BTreeMap<String, String>) -> String {
    let mut identity = String::from(url);
    if !params.is_empty() {
        identity.push('?');
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        identity.push_str(&query);
    }

    let digest = Sha256::digest(identity.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
