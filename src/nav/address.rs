//! Display tokens and application addresses
//!
//! A display token has the shape `?key=val&key=val#screen`; the query part is
//! omitted when there are no parameters. Keys come out in sorted order because
//! [`Params`] is ordered, so the same `(name, params)` always yields the same
//! token.

use urlencoding::encode;

use super::state::Params;

/// Build the display token shown by the backend for a screen
pub fn display_token(name: &str, params: Option<&Params>) -> String {
    let mut token = String::new();
    if let Some(params) = params.filter(|p| !p.is_empty()) {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        token.push('?');
        token.push_str(&query);
    }
    token.push('#');
    token.push_str(&encode(name));
    token
}

/// Strip query and fragment from an address, leaving the part that identifies
/// the application itself
pub fn pure_address(address: &str) -> &str {
    match address.find(['?', '#']) {
        Some(end) => &address[..end],
        None => address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::state::params;

    #[test]
    fn test_token_without_params() {
        assert_eq!(display_token("list", None), "#list");
        assert_eq!(display_token("list", Some(&Params::new())), "#list");
    }

    #[test]
    fn test_token_with_params_is_sorted_and_encoded() {
        let p = params([("tab", "my profile"), ("id", "4&2")]);
        assert_eq!(
            display_token("detail", Some(&p)),
            "?id=4%262&tab=my%20profile#detail"
        );
    }

    #[test]
    fn test_token_is_deterministic() {
        let a = params([("b", "2"), ("a", "1")]);
        let b = params([("a", "1"), ("b", "2")]);
        assert_eq!(display_token("x", Some(&a)), display_token("x", Some(&b)));
    }

    #[test]
    fn test_pure_address() {
        assert_eq!(
            pure_address("https://host/app/index.html?x=1#home"),
            "https://host/app/index.html"
        );
        assert_eq!(pure_address("https://host/app/#home"), "https://host/app/");
        assert_eq!(pure_address("https://host/app/"), "https://host/app/");
        assert_eq!(pure_address(""), "");
    }
}
