/*!
The student dashboard: viewing, enrolling in, and dropping courses.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    http::header::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::Glob,
    course::parse_course_id,
    user::Role,
    Error, MAX_ENROLLMENTS,
};
use super::*;

#[derive(Debug, Default, Deserialize)]
pub struct StudentForm {
    pub action: Option<String>,
    pub course_id: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum StudentAction {
    Enroll(i64),
    Drop(i64),
}

impl StudentForm {
    /**
    Figure out what the student is asking for.

    `Ok(None)` means the action isn't one we recognize. A missing or
    malformed course id can't refer to any course, so it's
    `Error::CourseNotFound`.
    */
    pub fn action(&self) -> Result<Option<StudentAction>, Error> {
        let course_id = || match nonempty(&self.course_id) {
            Some(s) => parse_course_id(s),
            None => Err(Error::CourseNotFound),
        };

        match self.action.as_deref() {
            Some("enroll") => Ok(Some(StudentAction::Enroll(course_id()?))),
            Some("drop") => Ok(Some(StudentAction::Drop(course_id()?))),
            _ => Ok(None),
        }
    }
}

pub async fn dashboard(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let u = match require_role(&headers, &glob, Role::Student).await {
        Ok(u) => u,
        Err(r) => { return r; },
    };
    log::trace!("student::dashboard() called by {:?}.", &u.uname);

    let sc = match glob.store.get_student_courses(u.id).await {
        Ok(sc) => sc,
        Err(e) => {
            log::error!("Store::get_student_courses( {} ) error: {}", &u.id, &e);
            return html_500();
        },
    };

    let data = json!({
        "uname": &u.uname,
        "enrolled": &sc.enrolled,
        "available": &sc.available,
        "can_enroll": sc.can_enroll,
        "max_enrollments": MAX_ENROLLMENTS,
    });

    serve_page(&headers, StatusCode::OK, "student-dashboard", data)
}

pub async fn action(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<StudentForm>,
) -> Response {
    let u = match require_role(&headers, &glob, Role::Student).await {
        Ok(u) => u,
        Err(r) => { return r; },
    };
    log::trace!("student::action( {:?} ) called by {:?}.", &form, &u.uname);

    let home = Role::Student.dashboard();

    let act = match form.action() {
        Ok(Some(act)) => act,
        Ok(None) => {
            log::warn!(
                "Unrecognized student action {:?} from {:?}.",
                &form.action, &u.uname
            );
            return redirect(home, None);
        },
        Err(e) => { return redirect(home, Some(Flash::from(&e))); },
    };

    let outcome = match act {
        StudentAction::Enroll(id) => outcome_flash(
            glob.store.enroll(u.id, id).await,
            |crs| format!("Successfully enrolled in {}", &crs.name)
        ),
        StudentAction::Drop(id) => outcome_flash(
            glob.store.drop_course(u.id, id).await,
            |crs| format!("Successfully dropped {}", &crs.name)
        ),
    };

    match outcome {
        Ok(flash) => redirect(home, Some(flash)),
        Err(r) => r,
    }
}
