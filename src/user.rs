/*!
Application users and their roles.
*/
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Role {
    Student,
    Faculty,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Student => "Student",
            Role::Faculty => "Faculty",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Student" => Ok(Role::Student),
            "Faculty" => Ok(Role::Faculty),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

impl Role {
    /**
    Interpret the role selected on the registration form.

    Anything that isn't exactly "student", ignoring case, registers a
    Faculty user. Surrounding whitespace counts.
    */
    pub fn from_registration(s: &str) -> Role {
        if s.eq_ignore_ascii_case("student") {
            Role::Student
        } else {
            Role::Faculty
        }
    }

    /// The role a username implies on its own, if any.
    pub fn implied_by_uname(uname: &str) -> Option<Role> {
        if uname.starts_with("faculty") {
            Some(Role::Faculty)
        } else {
            None
        }
    }

    /// Path of the dashboard users with this role land on.
    pub fn dashboard(&self) -> &'static str {
        match self {
            Role::Student => "/student-dashboard",
            Role::Faculty => "/faculty-dashboard",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub uname: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub salt: String,
    #[serde(skip)]
    pub hash: String,
}

impl User {
    /**
    The role this user should be switched to at login, if the username
    implies a role different from the stored one.

    Usernames beginning with "faculty" are taken to belong to Faculty.
    */
    pub fn role_repair(&self) -> Option<Role> {
        match Role::implied_by_uname(&self.uname) {
            Some(role) if role != self.role => Some(role),
            _ => None,
        }
    }
}
