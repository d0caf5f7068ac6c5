//! Thing-relative URI resolution (spec §4.7).

use crate::error::CoreError;

/// Split a URI into `(scheme_and_authority, rest)` if it carries a
/// scheme; a path-only URI has no scheme/authority prefix.
fn scheme_authority(uri: &str) -> Option<(&str, &str)> {
    let scheme_end = uri.find("://")?;
    let after_scheme = scheme_end + 3;
    let authority_end = uri[after_scheme..]
        .find(['/', '?', '#'])
        .map(|i| after_scheme + i)
        .unwrap_or(uri.len());
    Some((&uri[..authority_end], &uri[authority_end..]))
}

/// Compute the URI `u` as seen relative to a thing `native_uri`
/// (`None` means the thing is not hosted at all, which behaves like a
/// purely local/path-only native URI for resolution purposes).
///
/// - `uid://` URIs are always returned verbatim (administrative scheme).
/// - If the thing is hosted locally (its native URI is path-only, or
///   absent), any `u` — absolute or relative — is returned verbatim.
/// - If the thing is remote (native URI has scheme+authority) and `u`
///   shares that scheme+authority, the prefix is stripped and the
///   remainder returned; otherwise `u` is returned verbatim.
/// - A path-only `u` against a remote thing fails with
///   `UnassociatedResource`.
pub fn get_relative(native_uri: Option<&str>, u: &str) -> Result<String, CoreError> {
    if u.starts_with("uid://") {
        return Ok(u.to_owned());
    }

    let Some(native_uri) = native_uri else {
        return Ok(u.to_owned());
    };

    match scheme_authority(native_uri) {
        None => Ok(u.to_owned()),
        Some((this_prefix, _)) => match scheme_authority(u) {
            Some((u_prefix, u_rest)) if u_prefix == this_prefix => Ok(u_rest.to_owned()),
            Some(_) => Ok(u.to_owned()),
            None => Err(CoreError::UnassociatedResource(u.to_owned())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE: &str = "coap://1.2.3.4/1/";

    #[test]
    fn same_authority_is_stripped() {
        let got = get_relative(Some(NATIVE), "coap://1.2.3.4/2/?blah#frag").unwrap();
        assert_eq!(got, "/2/?blah#frag");
    }

    #[test]
    fn different_authority_is_verbatim() {
        let other = "coap://4.5.6.7/2/?blah#frag";
        let got = get_relative(Some(NATIVE), other).unwrap();
        assert_eq!(got, other);
    }

    #[test]
    fn path_only_against_remote_is_unassociated() {
        let err = get_relative(Some(NATIVE), "/2/").unwrap_err();
        assert!(matches!(err, CoreError::UnassociatedResource(_)));
    }

    #[test]
    fn locally_hosted_thing_returns_verbatim() {
        let got = get_relative(Some("/1/"), "coap://4.5.6.7/2/").unwrap();
        assert_eq!(got, "coap://4.5.6.7/2/");
        let got2 = get_relative(Some("/1/"), "/2/").unwrap();
        assert_eq!(got2, "/2/");
    }

    #[test]
    fn uid_scheme_always_verbatim() {
        let got = get_relative(Some(NATIVE), "uid://some-thing").unwrap();
        assert_eq!(got, "uid://some-thing");
    }
}
