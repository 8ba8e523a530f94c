/*!
`Store` methods for user accounts and password checks.
*/
use tokio_postgres::{Row, Transaction, error::SqlState};

use super::{DbError, Store};
use crate::{
    auth::{self, AuthResult},
    user::{Role, User},
    Error,
};

/// Hash `password` with a fresh salt off the async runtime's worker threads.
async fn salt_and_hash(password: &str) -> Result<(String, String), DbError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = auth::generate_salt();
        let hash = auth::hash_password(&password, &salt);
        (salt, hash)
    }).await
        .map_err(|e| DbError(format!("Password hashing task failed: {}", &e)))
}

pub(super) fn user_from_row(row: &Row) -> Result<User, DbError> {
    log::trace!("user_from_row( {:?} ) called", row);

    let role_str: &str = row.try_get("role")?;
    let u = User {
        id: row.try_get("id")?,
        uname: row.try_get("uname")?,
        email: row.try_get("email")?,
        role: role_str.parse()?,
        salt: row.try_get("salt")?,
        hash: row.try_get("hash")?,
    };

    Ok(u)
}

/// Turn a unique-constraint violation on `users` into the matching
/// domain error; anything else is passed through as a database error.
fn insert_error(e: tokio_postgres::Error) -> Error {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        match e.as_db_error().and_then(|dbe| dbe.constraint()) {
            Some("users_uname_key") => { return Error::DuplicateUsername; },
            Some("users_email_key") => { return Error::DuplicateEmail; },
            _ => {},
        }
    }
    Error::from(e)
}

async fn check_existing(
    t: &Transaction<'_>,
    uname: &str,
    email: &str,
) -> Result<(), Error> {
    log::trace!("check_existing( T, {:?}, {:?} ) called.", uname, email);

    if t.query_opt(
        "SELECT id FROM users WHERE uname = $1",
        &[&uname]
    ).await?.is_some() {
        return Err(Error::DuplicateUsername);
    }

    if t.query_opt(
        "SELECT id FROM users WHERE email = $1",
        &[&email]
    ).await?.is_some() {
        return Err(Error::DuplicateEmail);
    }

    Ok(())
}

impl Store {
    /**
    Insert a new user, along with an empty student profile if the user is a
    Student.

    Fails with `Error::DuplicateUsername` or `Error::DuplicateEmail` (checked
    in that order) if either is already taken.
    */
    pub async fn insert_user(
        &self,
        uname: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, Error> {
        log::trace!(
            "Store::insert_user( {:?}, {:?}, [ password ], {} ) called.",
            uname, email, role
        );

        let (salt, hash) = salt_and_hash(password).await?;

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        check_existing(&t, uname, email).await?;

        let row = t.query_one(
            "INSERT INTO users (uname, email, salt, hash, role)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id",
            &[&uname, &email, &salt, &hash, &role.to_string()]
        ).await.map_err(insert_error)?;
        let id: i64 = row.try_get("id")?;

        match role {
            Role::Student => {
                t.execute(
                    "INSERT INTO students (user_id) VALUES ($1)",
                    &[&id]
                ).await?;
            },
            Role::Faculty => {},
        }

        t.commit().await.map_err(insert_error)?;
        log::info!("Inserted {} {:?} ({}).", role, uname, email);

        Ok(User {
            id,
            uname: uname.to_owned(),
            email: email.to_owned(),
            role,
            salt,
            hash,
        })
    }

    pub async fn get_user_by_uname(
        &self,
        uname: &str
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_uname( {:?} ) called.", uname);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM users WHERE uname = $1",
            &[&uname]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    pub async fn set_role(
        &self,
        uname: &str,
        role: Role,
    ) -> Result<(), DbError> {
        log::trace!("Store::set_role( {:?}, {} ) called.", uname, role);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE users SET role = $1 WHERE uname = $2",
            &[&role.to_string(), &uname]
        ).await?;

        if n == 0 {
            Err(DbError(format!("There is no user with uname {:?}.", uname)))
        } else {
            Ok(())
        }
    }

    pub async fn check_password(
        &self,
        uname: &str,
        password: &str,
    ) -> Result<AuthResult, DbError> {
        log::trace!("Store::check_password( {:?}, [ password ] ) called.", uname);

        let u = match self.get_user_by_uname(uname).await? {
            Some(u) => u,
            None => { return Ok(AuthResult::NoSuchUser); },
        };

        let password = password.to_owned();
        let (u, ok) = tokio::task::spawn_blocking(move || {
            let ok = auth::verify_password(&password, &u);
            (u, ok)
        }).await
            .map_err(|e| DbError(format!("Password checking task failed: {}", &e)))?;

        if ok {
            Ok(AuthResult::Ok(u))
        } else {
            Ok(AuthResult::BadPassword)
        }
    }

    /// Whether the user with the given `id` has a student profile.
    #[cfg(test)]
    pub async fn has_student_profile(&self, user_id: i64) -> Result<bool, DbError> {
        log::trace!("Store::has_student_profile( {} ) called.", &user_id);

        let client = self.connect().await?;
        let row = client.query_opt(
            "SELECT user_id FROM students WHERE user_id = $1",
            &[&user_id]
        ).await?;

        Ok(row.is_some())
    }
}
