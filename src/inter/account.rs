/*!
Logging in, registering, and logging out.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Query},
    http::{header, StatusCode},
    http::header::{HeaderMap, HeaderValue},
    response::{Redirect, Response},
};
use cookie::{Cookie, SameSite, time::Duration};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::AuthResult,
    config::Glob,
    user::Role,
    Error,
};
use super::*;

/// Query string for the login and registration pages; `?action=back`
/// returns to the index.
#[derive(Debug, Default, Deserialize)]
pub struct BackQuery {
    pub action: Option<String>,
}

impl BackQuery {
    pub fn is_back(&self) -> bool {
        self.action.as_deref() == Some("back")
    }
}

/// Data type to read the form data from a login request.
#[derive(Default, Deserialize)]
pub struct LoginData {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginData {
    /// Username and password, or `Error::MissingFields`.
    pub fn fields(&self) -> Result<(&str, &str), Error> {
        match (nonempty(&self.username), nonempty(&self.password)) {
            (Some(uname), Some(password)) => Ok((uname, password)),
            _ => Err(Error::MissingFields),
        }
    }
}

#[derive(Default, Deserialize)]
pub struct RegisterData {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

impl RegisterData {
    /// Username, email, password, and interpreted role, or
    /// `Error::MissingFields`.
    pub fn fields(&self) -> Result<(&str, &str, &str, Role), Error> {
        match (
            nonempty(&self.username),
            nonempty(&self.email),
            nonempty(&self.password),
            nonempty(&self.role),
        ) {
            (Some(uname), Some(email), Some(password), Some(role)) => Ok((
                uname, email, password, Role::from_registration(role)
            )),
            _ => Err(Error::MissingFields),
        }
    }
}

fn error_page(headers: &HeaderMap, template_name: &str, e: &Error) -> Response {
    let data = json!({ "error_message": e.to_string() });
    serve_page(headers, e.status(), template_name, data)
}

pub async fn login_page(
    Query(q): Query<BackQuery>,
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("login_page( {:?}, ... ) called.", &q);

    if q.is_back() {
        return redirect("/", None);
    }

    match current_user(&headers, &glob).await {
        Err(e) => {
            log::error!("Error looking up session user: {}", &e);
            html_500()
        },
        Ok(Some(u)) => redirect(u.role.dashboard(), None),
        Ok(None) => serve_page(&headers, StatusCode::OK, "login", json!({})),
    }
}

pub async fn login(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<LoginData>,
) -> Response {
    let (uname, password) = match form.fields() {
        Ok(x) => x,
        Err(e) => { return error_page(&headers, "login", &e); },
    };
    log::trace!("login( {:?}, ... ) called.", uname);

    let mut user = match glob.store.check_password(uname, password).await {
        Err(e) => {
            log::error!("Store::check_password( {:?}, ... ) error: {}", uname, &e);
            return html_500();
        },
        Ok(AuthResult::Ok(u)) => u,
        Ok(x) => {
            log::info!("Failed login attempt for {:?}: {:?}", uname, &x);
            return error_page(&headers, "login", &Error::InvalidCredentials);
        },
    };

    if glob.infer_faculty_role {
        if let Some(role) = user.role_repair() {
            if let Err(e) = glob.store.set_role(&user.uname, role).await {
                log::error!(
                    "Store::set_role( {:?}, {} ) error: {}",
                    &user.uname, &role, &e
                );
                return html_500();
            }
            log::info!("Fixed role for {:?}: {} -> {}.", &user.uname, &user.role, &role);
            user.role = role;
        }
    }

    let key = match glob.store.issue_key(user.id, glob.session_lifetime).await {
        Ok(key) => key,
        Err(e) => {
            log::error!("Store::issue_key( {}, ... ) error: {}", &user.id, &e);
            return html_500();
        },
    };

    log::info!("{} {:?} logged in.", &user.role, &user.uname);
    with_cookies(
        Redirect::to(user.role.dashboard()),
        vec![set_cookie(SESSION_COOKIE, &key, Some(glob.session_lifetime))]
    )
}

pub async fn register_page(
    Query(q): Query<BackQuery>,
    headers: HeaderMap,
) -> Response {
    log::trace!("register_page( {:?}, ... ) called.", &q);

    if q.is_back() {
        return redirect("/", None);
    }

    serve_page(&headers, StatusCode::OK, "register", json!({}))
}

pub async fn register(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<RegisterData>,
) -> Response {
    let (uname, email, password, role) = match form.fields() {
        Ok(x) => x,
        Err(e) => { return error_page(&headers, "register", &e); },
    };
    log::trace!("register( {:?}, {:?}, ..., {} ) called.", uname, email, &role);

    match glob.store.insert_user(uname, email, password, role).await {
        Ok(u) => {
            log::info!("Registered {} {:?}.", &u.role, &u.uname);
            redirect(
                "/login",
                Some(Flash::success("Registration successful! Please login with your credentials."))
            )
        },
        Err(e) if e.is_domain() => error_page(&headers, "register", &e),
        Err(e) => {
            log::error!("Store::insert_user( {:?}, {:?}, ... ) error: {}", uname, email, &e);
            html_500()
        },
    }
}

/// The response to a logout: back to the index, session cookie expired,
/// and instructions to forget anything cached.
pub fn logout_response() -> Response {
    let cookies = vec![
        set_cookie(SESSION_COOKIE, "", Some(0)),
        // Not HttpOnly; the page script has to see this one.
        Cookie::build((CLEAR_TOKENS_COOKIE, "true"))
            .max_age(Duration::seconds(10))
            .path("/")
            .same_site(SameSite::Lax)
            .build()
            .to_string(),
    ];

    with_cookies(Redirect::to("/"), cookies).add_headers(vec![
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate")),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
        (header::EXPIRES, HeaderValue::from_static("0")),
    ])
}

pub async fn logout(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("logout() called.");

    if let Some(key) = get_cookie(&headers, SESSION_COOKIE) {
        // The browser forgets its key regardless.
        if let Err(e) = glob.store.revoke_key(&key).await {
            log::error!("Store::revoke_key() error: {}", &e);
        }
    }

    logout_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::student;
    use super::super::tests::{
        body_text, cookie_headers, ensure_templates, location, set_cookies,
    };
    use crate::{
        course::NewCourse,
        store::{Store, tests::TEST_CONNECTION},
    };

    use serial_test::serial;

    fn some(s: &str) -> Option<String> { Some(s.to_owned()) }

    #[test]
    fn back_query() {
        assert!(BackQuery { action: some("back") }.is_back());
        assert!(!BackQuery { action: some("forward") }.is_back());
        assert!(!BackQuery::default().is_back());
    }

    #[test]
    fn login_fields() {
        let form = LoginData { username: some("alice"), password: some("pw") };
        assert_eq!(form.fields().unwrap(), ("alice", "pw"));

        for form in [
            LoginData::default(),
            LoginData { username: some("alice"), password: None },
            LoginData { username: some(""), password: some("pw") },
        ] {
            assert!(matches!(form.fields(), Err(Error::MissingFields)));
        }
    }

    #[test]
    fn register_fields() {
        let form = RegisterData {
            username: some("alice"),
            email: some("a@x.com"),
            password: some("pw"),
            role: some("student"),
        };
        assert_eq!(
            form.fields().unwrap(),
            ("alice", "a@x.com", "pw", Role::Student)
        );

        let form = RegisterData { role: some(" student"), ..form };
        assert_eq!(form.fields().unwrap().3, Role::Faculty);

        let form = RegisterData { role: some("Professor"), ..form };
        assert_eq!(form.fields().unwrap().3, Role::Faculty);

        let form = RegisterData { email: None, ..form };
        assert!(matches!(form.fields(), Err(Error::MissingFields)));
        assert!(matches!(RegisterData::default().fields(), Err(Error::MissingFields)));
    }

    #[test]
    fn logout_clears_everything() {
        let r = logout_response();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), "/");

        let cookies = set_cookies(&r);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c|
            c.starts_with("enroll_session=;") && c.contains("Max-Age=0")
        ));
        let clear = cookies.iter()
            .find(|c| c.starts_with("clear_tokens=true"))
            .unwrap();
        assert!(clear.contains("Max-Age=10"));
        assert!(!clear.contains("HttpOnly"));

        let h = r.headers();
        assert_eq!(h.get(header::CACHE_CONTROL).unwrap(), "no-cache, no-store, must-revalidate");
        assert_eq!(h.get(header::PRAGMA).unwrap(), "no-cache");
        assert_eq!(h.get(header::EXPIRES).unwrap(), "0");
    }

    #[test]
    fn error_pages() {
        ensure_templates();

        let r = error_page(&HeaderMap::new(), "login", &Error::InvalidCredentials);
        assert_eq!(r.status(), StatusCode::UNAUTHORIZED);

        let r = error_page(&HeaderMap::new(), "register", &Error::DuplicateEmail);
        assert_eq!(r.status(), StatusCode::CONFLICT);

        let body = render("register", &json!({ "error_message": "Username already exists." }))
            .unwrap();
        assert!(body.contains("Username already exists."));
    }

    async fn test_glob(infer_faculty_role: bool) -> Arc<Glob> {
        ensure_templates();
        let store = Store::new(TEST_CONNECTION.to_owned());
        store.ensure_db_schema().await.unwrap();
        Arc::new(Glob {
            store,
            session_lifetime: 3600,
            infer_faculty_role,
        })
    }

    /// The session key a login response hands the browser.
    fn session_key(r: &Response) -> String {
        let prefix = format!("{}=", SESSION_COOKIE);
        let c = set_cookies(r).into_iter()
            .find(|c| c.starts_with(&prefix))
            .unwrap();
        c[prefix.len()..].split(';').next().unwrap().to_owned()
    }

    fn login_form(uname: &str, password: &str) -> Form<LoginData> {
        Form(LoginData { username: some(uname), password: some(password) })
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn register_login_and_see_dashboard() {
        let glob = test_glob(true).await;

        let jane = glob.store.insert_user("faculty_jane", "jane@x.com", "chalk", Role::Faculty)
            .await.unwrap();
        glob.store.insert_course(jane.id, &NewCourse {
            name: "Algebra".to_owned(),
            code: "MTH101".to_owned(),
            credits: 3,
        }).await.unwrap();

        let form = RegisterData {
            username: some("alice"),
            email: some("alice@x.com"),
            password: some("pw"),
            role: some("student"),
        };
        let r = register(HeaderMap::new(), Extension(glob.clone()), Form(form)).await;
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), "/login");
        assert!(set_cookies(&r).iter().any(|c| c.starts_with("enroll_flash=s.")));

        let dupe = RegisterData {
            username: some("alice"),
            email: some("other@x.com"),
            password: some("pw"),
            role: some("student"),
        };
        let r = register(HeaderMap::new(), Extension(glob.clone()), Form(dupe)).await;
        assert_eq!(r.status(), StatusCode::CONFLICT);

        let r = login(HeaderMap::new(), Extension(glob.clone()), login_form("alice", "nope")).await;
        assert_eq!(r.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&r).iter().all(|c| !c.starts_with("enroll_session=")));

        let r = login(HeaderMap::new(), Extension(glob.clone()), login_form("alice", "pw")).await;
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), "/student-dashboard");
        let key = session_key(&r);
        assert!(crate::auth::plausible_key(&key));

        let cookie = format!("{}={}", SESSION_COOKIE, &key);
        let headers = cookie_headers(&[cookie.as_str()]);
        let r = student::dashboard(headers, Extension(glob.clone())).await;
        assert_eq!(r.status(), StatusCode::OK);
        let body = body_text(r).await;
        assert!(body.contains("MTH101"));
        assert!(body.contains("value=\"enroll\""));

        glob.store.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn login_repairs_faculty_role() {
        let glob = test_glob(true).await;

        glob.store.insert_user("faculty_jane", "jane@x.com", "chalk", Role::Student)
            .await.unwrap();

        let r = login(HeaderMap::new(), Extension(glob.clone()), login_form("faculty_jane", "chalk"))
            .await;
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), "/faculty-dashboard");
        session_key(&r);

        let jane = glob.store.get_user_by_uname("faculty_jane").await.unwrap().unwrap();
        assert_eq!(jane.role, Role::Faculty);

        glob.store.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn login_keeps_role_when_inference_is_off() {
        let glob = test_glob(false).await;

        glob.store.insert_user("faculty_joe", "joe@x.com", "chalk", Role::Student)
            .await.unwrap();

        let r = login(HeaderMap::new(), Extension(glob.clone()), login_form("faculty_joe", "chalk"))
            .await;
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), "/student-dashboard");
        session_key(&r);

        let joe = glob.store.get_user_by_uname("faculty_joe").await.unwrap().unwrap();
        assert_eq!(joe.role, Role::Student);

        glob.store.nuke_database().await.unwrap();
    }
}
