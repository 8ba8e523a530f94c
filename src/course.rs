/*!
Courses, and the data faculty submit to create or change them.
*/
use serde::Serialize;

use crate::{Error, MAX_ENROLLMENTS};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub credits: i32,
    /// `id` of the teaching faculty `User`.
    pub instructor: i64,
    /// `uname` of the teaching faculty `User`.
    pub instructor_uname: String,
}

/// Values for a course about to be inserted.
#[derive(Clone, Debug, PartialEq)]
pub struct NewCourse {
    pub name: String,
    pub code: String,
    pub credits: i32,
}

/// Changes to an existing course. `None` fields keep their stored values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CourseUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    pub credits: Option<i32>,
}

pub fn parse_credits(s: &str) -> Result<i32, Error> {
    s.trim().parse::<i32>().map_err(|_| Error::InvalidFieldValue {
        field: "credits",
        value: s.to_owned(),
    })
}

/// Parse a submitted course id; anything unparseable can't name a course.
pub fn parse_course_id(s: &str) -> Result<i64, Error> {
    s.trim().parse::<i64>().map_err(|_| Error::CourseNotFound)
}

/// What a student sees on their dashboard.
#[derive(Debug, PartialEq, Serialize)]
pub struct StudentCourses {
    pub enrolled: Vec<Course>,
    pub available: Vec<Course>,
    pub can_enroll: bool,
}

impl StudentCourses {
    /// Split `all` courses into those the student is in and the rest.
    pub fn new(enrolled: Vec<Course>, all: Vec<Course>) -> StudentCourses {
        let available: Vec<Course> = all.into_iter()
            .filter(|c| !enrolled.iter().any(|e| e.id == c.id))
            .collect();
        let can_enroll = enrolled.len() < MAX_ENROLLMENTS;

        StudentCourses { enrolled, available, can_enroll }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: i64, name: &str) -> Course {
        Course {
            id,
            name: name.to_owned(),
            code: format!("C{}", id),
            credits: 3,
            instructor: 100,
            instructor_uname: "faculty_jane".to_owned(),
        }
    }

    #[test]
    fn credits() {
        assert_eq!(parse_credits("3").unwrap(), 3);
        assert_eq!(parse_credits(" 4 ").unwrap(), 4);
        match parse_credits("three") {
            Err(Error::InvalidFieldValue { field, value }) => {
                assert_eq!(field, "credits");
                assert_eq!(value, "three");
            },
            x => panic!("expected InvalidFieldValue, got {:?}", x),
        }
        assert!(parse_credits("").is_err());
        assert!(parse_credits("3.5").is_err());
    }

    #[test]
    fn course_ids() {
        assert_eq!(parse_course_id("12").unwrap(), 12);
        assert!(matches!(parse_course_id("twelve"), Err(Error::CourseNotFound)));
        assert!(matches!(parse_course_id(""), Err(Error::CourseNotFound)));
    }

    #[test]
    fn nothing_enrolled() {
        let all = vec![course(1, "Algebra"), course(2, "Biology")];
        let sc = StudentCourses::new(Vec::new(), all.clone());
        assert!(sc.enrolled.is_empty());
        assert_eq!(sc.available, all);
        assert!(sc.can_enroll);
    }

    #[test]
    fn partly_enrolled() {
        let all = vec![course(1, "Algebra"), course(2, "Biology"), course(3, "Chemistry")];
        let sc = StudentCourses::new(vec![course(2, "Biology")], all);
        assert_eq!(
            sc.available.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(sc.can_enroll);
    }

    #[test]
    fn fully_enrolled() {
        let all = vec![course(1, "Algebra"), course(2, "Biology"), course(3, "Chemistry")];
        let sc = StudentCourses::new(vec![course(1, "Algebra"), course(3, "Chemistry")], all);
        assert_eq!(sc.available, vec![course(2, "Biology")]);
        assert!(!sc.can_enroll);
    }
}
