/*!
`Store` methods for courses and student enrollments.

Every change that depends on what's already in the database (enrolling,
updating or deleting a course) happens in a single transaction or a single
statement, so concurrent requests can't slip between the check and the write.
*/
use tokio_postgres::{Row, Transaction};

use super::{DbError, Store};
use crate::{
    course::{Course, CourseUpdate, NewCourse, StudentCourses},
    Error, MAX_ENROLLMENTS,
};

const COURSE_SELECT: &str = "SELECT
        courses.id, courses.name, courses.code, courses.credits,
        courses.instructor, users.uname AS instructor_uname
    FROM courses INNER JOIN users ON users.id = courses.instructor";

fn course_from_row(row: &Row) -> Result<Course, DbError> {
    let c = Course {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        credits: row.try_get("credits")?,
        instructor: row.try_get("instructor")?,
        instructor_uname: row.try_get("instructor_uname")?,
    };
    Ok(c)
}

fn courses_from_rows(rows: &[Row]) -> Result<Vec<Course>, DbError> {
    rows.iter().map(course_from_row).collect()
}

async fn course_by_id(
    t: &Transaction<'_>,
    id: i64,
) -> Result<Option<Course>, DbError> {
    log::trace!("course_by_id( T, {} ) called.", &id);

    let query = format!("{} WHERE courses.id = $1", COURSE_SELECT);
    match t.query_opt(query.as_str(), &[&id]).await? {
        None => Ok(None),
        Some(row) => Ok(Some(course_from_row(&row)?)),
    }
}

/// Make sure student `user_id` has a profile row; does nothing if it does.
async fn ensure_student(t: &Transaction<'_>, user_id: i64) -> Result<(), DbError> {
    let n = t.execute(
        "INSERT INTO students (user_id) VALUES ($1) ON CONFLICT DO NOTHING",
        &[&user_id]
    ).await?;
    if n > 0 {
        log::info!("Created missing student profile for user {}.", &user_id);
    }
    Ok(())
}

async fn enrolled_courses(
    t: &Transaction<'_>,
    user_id: i64,
) -> Result<Vec<Course>, DbError> {
    let query = format!(
        "{} INNER JOIN enrollments ON enrollments.course = courses.id
            WHERE enrollments.student = $1
            ORDER BY courses.id",
        COURSE_SELECT
    );
    let rows = t.query(query.as_str(), &[&user_id]).await?;
    courses_from_rows(&rows)
}

impl Store {
    #[cfg(test)]
    pub async fn get_courses(&self) -> Result<Vec<Course>, DbError> {
        log::trace!("Store::get_courses() called.");

        let client = self.connect().await?;
        let query = format!("{} ORDER BY courses.id", COURSE_SELECT);
        let rows = client.query(query.as_str(), &[]).await?;
        courses_from_rows(&rows)
    }

    pub async fn get_courses_by_instructor(
        &self,
        instructor: i64,
    ) -> Result<Vec<Course>, DbError> {
        log::trace!("Store::get_courses_by_instructor( {} ) called.", &instructor);

        let client = self.connect().await?;
        let query = format!(
            "{} WHERE courses.instructor = $1 ORDER BY courses.id",
            COURSE_SELECT
        );
        let rows = client.query(query.as_str(), &[&instructor]).await?;
        courses_from_rows(&rows)
    }

    pub async fn insert_course(
        &self,
        instructor: i64,
        new: &NewCourse,
    ) -> Result<Course, DbError> {
        log::trace!("Store::insert_course( {}, {:?} ) called.", &instructor, new);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        let row = t.query_one(
            "INSERT INTO courses (name, code, credits, instructor)
                VALUES ($1, $2, $3, $4)
                RETURNING id",
            &[&new.name, &new.code, &new.credits, &instructor]
        ).await?;
        let id: i64 = row.try_get("id")?;

        let crs = course_by_id(&t, id).await?.ok_or_else(|| DbError(format!(
            "Newly-inserted course {} still not there for some reason.", &id
        )))?;

        t.commit().await?;
        log::info!("Inserted course {} {:?} ({}).", &id, &crs.name, &crs.code);
        Ok(crs)
    }

    /**
    Apply `update` to course `id`, provided it's taught by `instructor`.

    Fails with `Error::CourseNotFound` if there's no such course, or if
    it belongs to someone else.
    */
    pub async fn update_course(
        &self,
        id: i64,
        instructor: i64,
        update: &CourseUpdate,
    ) -> Result<Course, Error> {
        log::trace!(
            "Store::update_course( {}, {}, {:?} ) called.",
            &id, &instructor, update
        );

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        let n = t.execute(
            "UPDATE courses SET
                name    = COALESCE($3::TEXT, name),
                code    = COALESCE($4::TEXT, code),
                credits = COALESCE($5::INTEGER, credits)
                WHERE id = $1 AND instructor = $2",
            &[&id, &instructor, &update.name, &update.code, &update.credits]
        ).await?;

        if n == 0 {
            return Err(Error::CourseNotFound);
        }

        let crs = course_by_id(&t, id).await?.ok_or(Error::CourseNotFound)?;
        t.commit().await?;
        Ok(crs)
    }

    /// Delete course `id`, provided it's taught by `instructor`.
    ///
    /// Fails with `Error::CourseNotFound` otherwise.
    pub async fn delete_course(
        &self,
        id: i64,
        instructor: i64,
    ) -> Result<(), Error> {
        log::trace!("Store::delete_course( {}, {} ) called.", &id, &instructor);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM courses WHERE id = $1 AND instructor = $2",
            &[&id, &instructor]
        ).await?;

        match n {
            0 => Err(Error::CourseNotFound),
            1 => {
                log::info!("Deleted course {}.", &id);
                Ok(())
            },
            n => {
                log::warn!("Deleting single course {} affected {} rows.", &id, &n);
                Ok(())
            },
        }
    }

    /// Courses student `user_id` is and isn't enrolled in, creating
    /// the student's profile first if need be.
    pub async fn get_student_courses(
        &self,
        user_id: i64,
    ) -> Result<StudentCourses, DbError> {
        log::trace!("Store::get_student_courses( {} ) called.", &user_id);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        ensure_student(&t, user_id).await?;
        let enrolled = enrolled_courses(&t, user_id).await?;
        let query = format!("{} ORDER BY courses.id", COURSE_SELECT);
        let all = courses_from_rows(&t.query(query.as_str(), &[]).await?)?;

        t.commit().await?;
        Ok(StudentCourses::new(enrolled, all))
    }

    /**
    Enroll student `user_id` in course `course_id`.

    The student's profile row is locked for the duration, so two concurrent
    enrollments can't both see room for one more course.

    Fails with `Error::CourseNotFound` if there's no such course and
    `Error::EnrollmentLimitExceeded` if the student is already taking
    `MAX_ENROLLMENTS` courses.
    */
    pub async fn enroll(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<Course, Error> {
        log::trace!("Store::enroll( {}, {} ) called.", &user_id, &course_id);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        ensure_student(&t, user_id).await?;
        t.query_one(
            "SELECT user_id FROM students WHERE user_id = $1 FOR UPDATE",
            &[&user_id]
        ).await?;

        let crs = course_by_id(&t, course_id).await?.ok_or(Error::CourseNotFound)?;

        let row = t.query_one(
            "SELECT COUNT(*) AS n FROM enrollments WHERE student = $1",
            &[&user_id]
        ).await?;
        let n: i64 = row.try_get("n")?;
        if n as usize >= MAX_ENROLLMENTS {
            return Err(Error::EnrollmentLimitExceeded);
        }

        t.execute(
            "INSERT INTO enrollments (student, course) VALUES ($1, $2)
                ON CONFLICT DO NOTHING",
            &[&user_id, &course_id]
        ).await?;

        t.commit().await?;
        log::info!("Student {} enrolled in course {}.", &user_id, &course_id);
        Ok(crs)
    }

    /**
    Remove course `course_id` from student `user_id`'s enrollments.

    Dropping a course the student isn't enrolled in succeeds without doing
    anything; a course that doesn't exist is `Error::CourseNotFound`.
    */
    pub async fn drop_course(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<Course, Error> {
        log::trace!("Store::drop_course( {}, {} ) called.", &user_id, &course_id);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        ensure_student(&t, user_id).await?;
        let crs = course_by_id(&t, course_id).await?.ok_or(Error::CourseNotFound)?;

        let n = t.execute(
            "DELETE FROM enrollments WHERE student = $1 AND course = $2",
            &[&user_id, &course_id]
        ).await?;
        if n == 0 {
            log::debug!(
                "Student {} dropped course {} without being enrolled.",
                &user_id, &course_id
            );
        }

        t.commit().await?;
        Ok(crs)
    }
}
