/*!
The faculty dashboard: creating, updating, and deleting one's own courses.
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
    course::{parse_course_id, parse_credits, CourseUpdate, NewCourse},
    user::Role,
    Error,
};
use super::*;

#[derive(Debug, Default, Deserialize)]
pub struct FacultyForm {
    pub action: Option<String>,
    pub course_id: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub credits: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum FacultyAction {
    Create(NewCourse),
    Update(i64, CourseUpdate),
    Delete(i64),
}

impl FacultyForm {
    fn course_id(&self) -> Result<i64, Error> {
        match nonempty(&self.course_id) {
            Some(s) => parse_course_id(s),
            None => Err(Error::MissingFields),
        }
    }

    /**
    Figure out what the instructor is asking for.

    `Ok(None)` means the action isn't one we recognize. Creating a course
    requires all of name, code, and credits; an update leaves any blank
    field as it was.
    */
    pub fn action(&self) -> Result<Option<FacultyAction>, Error> {
        match self.action.as_deref() {
            Some("create") => {
                match (
                    nonempty(&self.name),
                    nonempty(&self.code),
                    nonempty(&self.credits),
                ) {
                    (Some(name), Some(code), Some(credits)) => {
                        let new = NewCourse {
                            name: name.to_owned(),
                            code: code.to_owned(),
                            credits: parse_credits(credits)?,
                        };
                        Ok(Some(FacultyAction::Create(new)))
                    },
                    _ => Err(Error::MissingFields),
                }
            },
            Some("update") => {
                let id = self.course_id()?;
                let credits = match nonempty(&self.credits) {
                    Some(s) => Some(parse_credits(s)?),
                    None => None,
                };
                let update = CourseUpdate {
                    name: nonempty(&self.name).map(str::to_owned),
                    code: nonempty(&self.code).map(str::to_owned),
                    credits,
                };
                Ok(Some(FacultyAction::Update(id, update)))
            },
            Some("delete") => Ok(Some(FacultyAction::Delete(self.course_id()?))),
            _ => Ok(None),
        }
    }
}

pub async fn dashboard(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let u = match require_role(&headers, &glob, Role::Faculty).await {
        Ok(u) => u,
        Err(r) => { return r; },
    };
    log::trace!("faculty::dashboard() called by {:?}.", &u.uname);

    let courses = match glob.store.get_courses_by_instructor(u.id).await {
        Ok(courses) => courses,
        Err(e) => {
            log::error!("Store::get_courses_by_instructor( {} ) error: {}", &u.id, &e);
            return html_500();
        },
    };

    let data = json!({
        "uname": &u.uname,
        "courses": &courses,
    });

    serve_page(&headers, StatusCode::OK, "faculty-dashboard", data)
}

pub async fn action(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<FacultyForm>,
) -> Response {
    let u = match require_role(&headers, &glob, Role::Faculty).await {
        Ok(u) => u,
        Err(r) => { return r; },
    };
    log::trace!("faculty::action( {:?} ) called by {:?}.", &form, &u.uname);

    let home = Role::Faculty.dashboard();

    let act = match form.action() {
        Ok(Some(act)) => act,
        Ok(None) => {
            log::warn!(
                "Unrecognized faculty action {:?} from {:?}.",
                &form.action, &u.uname
            );
            return redirect(home, None);
        },
        Err(e) => { return redirect(home, Some(Flash::from(&e))); },
    };

    let outcome = match act {
        FacultyAction::Create(new) => outcome_flash(
            glob.store.insert_course(u.id, &new).await.map_err(Error::from),
            |crs| format!("Successfully created course {}", &crs.name)
        ),
        FacultyAction::Update(id, update) => outcome_flash(
            glob.store.update_course(id, u.id, &update).await,
            |_| "Course updated successfully".to_owned()
        ),
        FacultyAction::Delete(id) => outcome_flash(
            glob.store.delete_course(id, u.id).await,
            |_| "Course deleted successfully".to_owned()
        ),
    };

    match outcome {
        Ok(flash) => redirect(home, Some(flash)),
        Err(r) => r,
    }
}
