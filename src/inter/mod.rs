/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `store`.)

Pages are rendered from the Handlebars templates registered by `init()`.
Logins are tracked with a session key cookie, and one-shot status messages
("flashes") ride along in a second cookie across redirects until the next
rendered page displays them.
*/
use std::{
    fmt::Debug,
    path::Path,
};

use axum::{
    http::{header, StatusCode},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use cookie::{Cookie, SameSite, time::Duration};
use handlebars::{Handlebars, RenderError};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::json;

use crate::{
    config::Glob,
    store::DbError,
    user::{Role, User},
    Error,
};

pub mod account;
pub mod faculty;
pub mod student;

static TEMPLATES: OnceCell<Handlebars<'static>> = OnceCell::new();

pub const SESSION_COOKIE: &str = "enroll_session";
pub const FLASH_COOKIE: &str = "enroll_flash";
/// Tells the browser-side script to clear out anything it has cached.
pub const CLEAR_TOKENS_COOKIE: &str = "clear_tokens";


static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>enroll | Error</title>
<link rel="stylesheet" href="/static/enroll.css">
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

trait AddHeaders: IntoResponse + Sized {
    fn add_headers(self, mut new_headers: Vec<(HeaderName, HeaderValue)>) -> Response {
        let mut r = self.into_response();
        let r_headers = r.headers_mut();
        // append, not insert; there may be several Set-Cookies
        for (name, value) in new_headers.drain(..) {
            r_headers.append(name, value);
        }

        r
    }
}

impl<T: IntoResponse + Sized> AddHeaders for T {}

/**
Initializes the resources used in this module. This function should be called
before any functionality of this module or any of its submodules is used.

Currently the only thing that happens here is loading the templates used by
`serve_template()`, which will respond with a 500 until `init()` has been
called.

The argument is the path to the directory where the templates used by
`serve_template()` can be found.
*/
pub fn init<P: AsRef<Path>>(template_dir: P) -> Result<(), String> {
    if TEMPLATES.get().is_some() {
        log::warn!("Templates directory already initialized; ignoring.");
        return Ok(())
    }

    let template_dir = template_dir.as_ref();

    let mut h = Handlebars::new();
    #[cfg(debug_assertions)]
    h.set_dev_mode(true);
    h.register_templates_directory(".html", template_dir)
        .map_err(|e| format!(
            "Error registering templates directory {}: {}",
            template_dir.display(), &e
        ))?;

    TEMPLATES.set(h)
        .map_err(|old_h| {
            let mut estr = String::from("Templates directory already registered w/templates:");
            for template_name in old_h.get_templates().keys() {
                estr.push('\n');
                estr.push_str(template_name.as_str());
            }
            estr
        })?;

    Ok(())
}

/**
Return an HTML response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)
*/
pub fn html_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(HTML_500)
    ).into_response()
}

pub fn render<S>(template_name: &str, data: &S) -> Result<String, RenderError>
where
    S: Serialize
{
    match TEMPLATES.get() {
        Some(h) => h.render(template_name, data),
        None => Err(RenderError::new("templates not initialized")),
    }
}

pub fn serve_template<S>(
    code: StatusCode,
    template_name: &str,
    data: &S,
    addl_headers: Vec<(HeaderName, HeaderValue)>
) -> Response
where
    S: Serialize + Debug
{
    log::trace!("serve_template( {}, {:?}, ... ) called.", &code, template_name);

    match render(template_name, data) {
        Ok(response_body) => (
            code,
            Html(response_body)
        ).add_headers(addl_headers),
        Err(e) => {
            log::error!(
                "Error rendering template {:?} with data {:?}:\n{}",
                template_name, data, &e
            );
            html_500()
        },
    }
}

/// Text of a `Set-Cookie` header for one of our HTTP-only cookies.
///
/// A `max_age` of `Some(0)` deletes the cookie.
pub fn set_cookie(name: &str, value: &str, max_age: Option<u32>) -> String {
    let mut c = Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    if let Some(n) = max_age {
        c.set_max_age(Duration::seconds(n.into()));
    }
    c.to_string()
}

/// Value of the request cookie `name`, if present.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE).iter() {
        let s = match value.to_str() {
            Ok(s) => s,
            Err(_) => { continue; },
        };
        let found = Cookie::split_parse(s)
            .filter_map(Result::ok)
            .find(|c| c.name() == name);
        if let Some(c) = found {
            return Some(c.value().to_owned());
        }
    }

    None
}

pub fn with_cookies<R: IntoResponse>(r: R, cookies: Vec<String>) -> Response {
    let mut addl_headers = Vec::with_capacity(cookies.len());
    for c in cookies.iter() {
        match HeaderValue::from_str(c) {
            Ok(v) => { addl_headers.push((header::SET_COOKIE, v)); },
            Err(e) => {
                log::error!("Error converting {:?} into header value: {}", c, &e);
                return html_500();
            },
        }
    }

    r.add_headers(addl_headers)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

/// A message to show the user on the next page they see.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Flash {
    pub level: Level,
    pub text: String,
}

impl Flash {
    pub fn success<S: Into<String>>(text: S) -> Flash {
        Flash { level: Level::Success, text: text.into() }
    }

    pub fn error<S: Into<String>>(text: S) -> Flash {
        Flash { level: Level::Error, text: text.into() }
    }

    fn encode(&self) -> String {
        let tag = match self.level {
            Level::Success => "s",
            Level::Error => "e",
        };
        format!("{}.{}", tag, URL_SAFE_NO_PAD.encode(self.text.as_bytes()))
    }

    fn decode(s: &str) -> Option<Flash> {
        let (tag, text) = s.split_once('.')?;
        let level = match tag {
            "s" => Level::Success,
            "e" => Level::Error,
            _ => { return None; },
        };
        let bytes = URL_SAFE_NO_PAD.decode(text).ok()?;
        let text = String::from_utf8(bytes).ok()?;

        Some(Flash { level, text })
    }

    pub fn cookie(&self) -> String {
        set_cookie(FLASH_COOKIE, &self.encode(), None)
    }
}

impl From<&Error> for Flash {
    fn from(e: &Error) -> Flash { Flash::error(e.to_string()) }
}

/// 303 redirect to `path`, optionally leaving a message for the page
/// at the other end.
pub fn redirect(path: &str, flash: Option<Flash>) -> Response {
    let cookies = match flash {
        Some(f) => vec![f.cookie()],
        None => Vec::new(),
    };
    with_cookies(Redirect::to(path), cookies)
}

/**
Render `template_name` with `data`, which must be a JSON object.

If the request carries a flash message, it's added to `data` under the key
`"flash"` and its cookie is cleared.
*/
pub fn serve_page(
    headers: &HeaderMap,
    code: StatusCode,
    template_name: &str,
    mut data: serde_json::Value,
) -> Response {
    let mut cookies: Vec<String> = Vec::new();

    if let Some(raw) = get_cookie(headers, FLASH_COOKIE) {
        match Flash::decode(&raw) {
            Some(flash) => {
                if let Some(obj) = data.as_object_mut() {
                    obj.insert("flash".to_owned(), json!(flash));
                }
            },
            None => {
                log::warn!("Unable to decode flash cookie value {:?}.", raw);
            },
        }
        cookies.push(set_cookie(FLASH_COOKIE, "", Some(0)));
    }

    with_cookies(serve_template(code, template_name, &data, Vec::new()), cookies)
}

/// Turn the outcome of a dashboard action into the message to show the
/// user; failures on our end get logged and answered with a 500 instead.
pub fn outcome_flash<T, F>(res: Result<T, Error>, on_success: F) -> Result<Flash, Response>
where
    F: FnOnce(T) -> String
{
    match res {
        Ok(x) => Ok(Flash::success(on_success(x))),
        Err(e) if e.is_domain() => Ok(Flash::from(&e)),
        Err(e) => {
            log::error!("{}", &e);
            Err(html_500())
        },
    }
}

/// A form field's value, if it was submitted and isn't blank.
pub fn nonempty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// The user logged in with the request's session cookie, if any.
pub async fn current_user(headers: &HeaderMap, glob: &Glob) -> Result<Option<User>, DbError> {
    match get_cookie(headers, SESSION_COOKIE) {
        None => Ok(None),
        Some(key) => glob.store.user_by_key(&key).await,
    }
}

/**
Ensure the request comes from a logged-in user with the given `role`.

The `Err` variant is the response to send instead: a redirect to the login
page (with an "access denied" message if the user has the wrong role), or
a 500 if the session couldn't be checked.
*/
pub async fn require_role(
    headers: &HeaderMap,
    glob: &Glob,
    role: Role,
) -> Result<User, Response> {
    match current_user(headers, glob).await {
        Err(e) => {
            log::error!("Error looking up session user: {}", &e);
            Err(html_500())
        },
        Ok(None) => Err(redirect("/login", None)),
        Ok(Some(u)) if u.role == role => Ok(u),
        Ok(Some(u)) => {
            log::warn!(
                "{} {:?} attempted to access {} page.",
                &u.role, &u.uname, &role
            );
            let e = Error::AccessDenied(role);
            Err(redirect("/login", Some(Flash::from(&e))))
        },
    }
}

pub async fn index(headers: HeaderMap) -> Response {
    log::trace!("index() called.");

    serve_page(&headers, StatusCode::OK, "index", json!({}))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    pub fn ensure_templates() {
        ensure_logging();
        // Another test may win the race to initialize; that's fine.
        let _ = init("templates");
    }

    pub fn set_cookies(r: &Response) -> Vec<String> {
        r.headers().get_all(header::SET_COOKIE).iter()
            .map(|v| v.to_str().unwrap().to_owned())
            .collect()
    }

    pub fn location(r: &Response) -> &str {
        r.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    pub async fn body_text(r: Response) -> String {
        use axum::body::HttpBody;

        let mut body = r.into_body();
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = body.data().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(bytes).unwrap()
    }

    pub fn cookie_headers(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for c in cookies.iter() {
            headers.append(header::COOKIE, HeaderValue::from_str(c).unwrap());
        }
        headers
    }

    #[test]
    fn reading_cookies() {
        let headers = cookie_headers(&[
            "theme=dark; enroll_session=abc123",
            "enroll_flash=s.SGk",
        ]);
        assert_eq!(get_cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(get_cookie(&headers, FLASH_COOKIE).as_deref(), Some("s.SGk"));
        assert_eq!(get_cookie(&headers, "theme").as_deref(), Some("dark"));
        assert_eq!(get_cookie(&headers, "missing"), None);
        assert_eq!(get_cookie(&HeaderMap::new(), SESSION_COOKIE), None);

        // Malformed pieces don't hide the well-formed ones after them.
        let headers = cookie_headers(&["junk; =nameless; enroll_session=def456"]);
        assert_eq!(get_cookie(&headers, SESSION_COOKIE).as_deref(), Some("def456"));
    }

    #[test]
    fn writing_cookies() {
        let c = set_cookie(SESSION_COOKIE, "abc123", Some(3600));
        assert!(c.starts_with("enroll_session=abc123"));
        for attr in ["HttpOnly", "SameSite=Lax", "Path=/", "Max-Age=3600"] {
            assert!(c.contains(attr), "{:?} missing {}", &c, attr);
        }

        let c = set_cookie(FLASH_COOKIE, "s.SGk", None);
        assert!(c.starts_with("enroll_flash=s.SGk"));
        assert!(!c.contains("Max-Age"));
    }

    #[test]
    fn flash_cookies() {
        let f = Flash::success("Successfully enrolled in Algebra; Section 2 (Room=4)");
        let encoded = f.encode();
        assert!(!encoded.contains(';'));
        assert!(!encoded.contains(' '));
        assert_eq!(Flash::decode(&encoded), Some(f));

        let f = Flash::from(&Error::CourseNotFound);
        assert_eq!(f.level, Level::Error);
        assert_eq!(f.text, "Course not found.");

        assert_eq!(Flash::decode("x.SGk"), None);
        assert_eq!(Flash::decode("no separator"), None);
        assert_eq!(Flash::decode("s.!!!"), None);
    }

    #[test]
    fn redirects() {
        let r = redirect("/student-dashboard", None);
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), "/student-dashboard");
        assert!(set_cookies(&r).is_empty());

        let r = redirect("/login", Some(Flash::error("Access denied.")));
        let cookies = set_cookies(&r);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("enroll_flash=e."));
        assert!(cookies[0].contains("HttpOnly"));
    }

    #[test]
    fn blank_fields() {
        assert_eq!(nonempty(&Some("x".to_owned())), Some("x"));
        assert_eq!(nonempty(&Some(String::new())), None);
        assert_eq!(nonempty(&None), None);
    }

    #[test]
    fn action_outcomes() {
        let f = outcome_flash(Ok::<_, Error>("Algebra"), |n| format!("Dropped {}", n)).unwrap();
        assert_eq!(f, Flash::success("Dropped Algebra"));

        let f = outcome_flash(Err::<(), _>(Error::EnrollmentLimitExceeded), |_| String::new())
            .unwrap();
        assert_eq!(f, Flash::error("You cannot enroll in more than 2 courses."));

        let r = outcome_flash(
            Err::<(), _>(Error::Db(DbError::from("boom".to_owned()))),
            |_| String::new()
        ).unwrap_err();
        assert_eq!(r.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn pages_show_flashes() {
        ensure_templates();

        let f = Flash::error("Access denied. Student account required.");
        let data = json!({ "flash": f });
        let body = render("login", &data).unwrap();
        assert!(body.contains("Access denied. Student account required."));

        let c = format!("{}={}", FLASH_COOKIE, f.encode());
        let headers = cookie_headers(&[c.as_str()]);
        let r = serve_page(&headers, StatusCode::OK, "index", json!({}));
        assert_eq!(r.status(), StatusCode::OK);
        let cookies = set_cookies(&r);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("enroll_flash=;"));
        assert!(cookies[0].contains("Max-Age=0"));

        let r = serve_page(&HeaderMap::new(), StatusCode::OK, "index", json!({}));
        assert!(set_cookies(&r).is_empty());
    }
}
