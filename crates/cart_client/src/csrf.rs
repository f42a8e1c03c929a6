use serde::{Deserialize, Serialize};

use crate::surface::CartSurface;

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
pub const DEFAULT_CSRF_FIELD: &str = "csrfmiddlewaretoken";

/// Where the anti-forgery token is read from on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum CsrfSource {
    Cookie(String),
    HiddenField(String),
}

impl CsrfSource {
    pub fn cookie() -> Self {
        CsrfSource::Cookie(DEFAULT_CSRF_COOKIE.to_string())
    }

    pub fn hidden_field() -> Self {
        CsrfSource::HiddenField(DEFAULT_CSRF_FIELD.to_string())
    }

    pub fn get_csrf_token(&self, surface: &dyn CartSurface) -> Option<String> {
        match self {
            CsrfSource::Cookie(name) => surface
                .cookie_header()
                .and_then(|header| cookie_value(&header, name)),
            CsrfSource::HiddenField(name) => surface.hidden_field(name),
        }
    }
}

impl Default for CsrfSource {
    fn default() -> Self {
        Self::cookie()
    }
}

/// Looks `name` up in a `a=1; b=2` cookie string and percent-decodes it.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let value = pair.trim().strip_prefix(name)?.strip_prefix('=')?;
        Some(
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cookie_among_others() {
        let header = "sessionid=abc; csrftoken=tok%2Fen; theme=dark";
        assert_eq!(cookie_value(header, "csrftoken").as_deref(), Some("tok/en"));
    }

    #[test]
    fn prefix_names_do_not_match() {
        assert_eq!(cookie_value("csrftokenx=1", "csrftoken"), None);
        assert_eq!(cookie_value("", "csrftoken"), None);
    }

    #[test]
    fn empty_cookie_value_is_kept() {
        assert_eq!(cookie_value("csrftoken=", "csrftoken").as_deref(), Some(""));
    }

    #[test]
    fn source_serializes_as_tagged_name() {
        assert_eq!(
            serde_json::to_value(CsrfSource::cookie()).unwrap(),
            serde_json::json!({ "source": "cookie", "name": "csrftoken" })
        );
        let field: CsrfSource = serde_json::from_value(serde_json::json!({
            "source": "hidden_field",
            "name": "csrfmiddlewaretoken",
        }))
        .unwrap();
        assert_eq!(field, CsrfSource::hidden_field());
    }
}
