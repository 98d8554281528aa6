//! Anonymous author identity carried in the `anon_id` cookie.

use std::convert::Infallible;

use log::debug;
use uuid::Uuid;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::canvas::AuthorId;

pub const ANON_ID_COOKIE: &str = "anon_id";
const COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365;
/// Length of the hyphenated form, the only one accepted from the cookie.
const HYPHENATED_LEN: usize = 36;

/// The caller's author id, and whether it was minted for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub author_id: AuthorId,
    pub issued: bool,
}

impl Identity {
    /// Reuses a well-formed cookie value; anything else gets a fresh v4 id.
    ///
    /// Well-formed means the hyphenated `8-4-4-4-12` form. Simple, braced and
    /// `urn:uuid:` spellings are treated as garbled.
    pub fn from_cookie(value: Option<String>) -> Self {
        match value.as_deref().and_then(parse_hyphenated) {
            Some(author_id) => Self {
                author_id,
                issued: false,
            },
            _ => {
                let author_id = Uuid::new_v4();
                debug!("Issuing anonymous id {}", author_id);
                Self {
                    author_id,
                    issued: true,
                }
            }
        }
    }

    pub fn set_cookie_header(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            ANON_ID_COOKIE, self.author_id, COOKIE_MAX_AGE_SECS
        )
    }

    /// A `Set-Cookie` value that makes the browser drop its id; the next
    /// request is issued a new one.
    pub fn clear_cookie_header() -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", ANON_ID_COOKIE)
    }

    /// Adds the `Set-Cookie` header when the id was minted for this request.
    pub fn attach(&self, response: Response) -> Response {
        if !self.issued {
            return response;
        }
        warp::reply::with_header(response, "set-cookie", self.set_cookie_header()).into_response()
    }
}

fn parse_hyphenated(value: &str) -> Option<AuthorId> {
    if value.len() != HYPHENATED_LEN {
        return None;
    }
    Uuid::try_parse(value).ok()
}

/// Extracts the caller's [`Identity`]. Never rejects.
pub fn identity() -> impl Filter<Extract = (Identity,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(ANON_ID_COOKIE).map(Identity::from_cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    #[test]
    fn valid_cookie_is_kept() {
        let id = Uuid::new_v4();
        let identity = Identity::from_cookie(Some(id.to_string()));
        assert_eq!(identity.author_id, id);
        assert!(!identity.issued);
    }

    #[test]
    fn missing_or_garbled_cookie_gets_fresh_id() {
        assert!(Identity::from_cookie(None).issued);
        let garbled = Identity::from_cookie(Some("not-a-uuid".into()));
        assert!(garbled.issued);
        assert_eq!(garbled.author_id.get_version_num(), 4);
    }

    #[test]
    fn only_hyphenated_ids_are_accepted() {
        let id = Uuid::new_v4();
        let upper = Identity::from_cookie(Some(id.to_string().to_uppercase()));
        assert_eq!(upper.author_id, id);
        assert!(!upper.issued);

        for spelling in [
            id.simple().to_string(),
            id.braced().to_string(),
            id.urn().to_string(),
        ] {
            let identity = Identity::from_cookie(Some(spelling.clone()));
            assert!(identity.issued, "{} should be rejected", spelling);
            assert_ne!(identity.author_id, id);
        }
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let header = Identity::clear_cookie_header();
        assert!(header.starts_with("anon_id=;"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn set_cookie_only_for_issued_ids() {
        let issued = Identity::from_cookie(None);
        let response = issued.attach(StatusCode::OK.into_response());
        let header = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(header.starts_with(&format!("anon_id={}", issued.author_id)));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Max-Age=31536000"));

        let known = Identity::from_cookie(Some(Uuid::new_v4().to_string()));
        let response = known.attach(StatusCode::OK.into_response());
        assert!(response.headers().get("set-cookie").is_none());
    }
}
