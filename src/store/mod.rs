/*!
Database interaction module.

The Postgres database to which this connects is meant to have the following
tables.

```sql
CREATE TABLE users (
    id    BIGSERIAL PRIMARY KEY,
    uname TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL,
    salt  TEXT NOT NULL,
    hash  TEXT NOT NULL,        /* pbkdf2_sha256$<rounds>$<hex digest> */
    role  TEXT NOT NULL         /* one of { 'Student', 'Faculty' } */
);

CREATE TABLE students (
    user_id BIGINT PRIMARY KEY REFERENCES users(id)
);

CREATE TABLE courses (
    id         BIGSERIAL PRIMARY KEY,
    name       TEXT NOT NULL,
    code       TEXT NOT NULL,
    credits    INTEGER NOT NULL,
    instructor BIGINT NOT NULL REFERENCES users(id)
);

CREATE TABLE enrollments (
    student BIGINT REFERENCES students(user_id),
    course  BIGINT REFERENCES courses(id),
    PRIMARY KEY (student, course)
);

CREATE TABLE sessions (
    skey    TEXT PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id),
    expires TIMESTAMPTZ NOT NULL
);
```
*/
use std::fmt::Write;

use thiserror::Error;
use tokio_postgres::{Client, NoTls};

mod courses;
mod sessions;
mod users;

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'users'",
        "CREATE TABLE users (
            id    BIGSERIAL PRIMARY KEY,
            uname TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            salt  TEXT NOT NULL,
            hash  TEXT NOT NULL,
            role  TEXT NOT NULL CHECK (role IN ('Student', 'Faculty'))
        )",
        "DROP TABLE users",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'students'",
        "CREATE TABLE students (
            user_id BIGINT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE
        )",
        "DROP TABLE students",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'courses'",
        "CREATE TABLE courses (
            id         BIGSERIAL PRIMARY KEY,
            name       TEXT NOT NULL,
            code       TEXT NOT NULL,
            credits    INTEGER NOT NULL,
            instructor BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE
        )",
        "DROP TABLE courses",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'enrollments'",
        "CREATE TABLE enrollments (
            student BIGINT REFERENCES students(user_id) ON DELETE CASCADE,
            course  BIGINT REFERENCES courses(id) ON DELETE CASCADE,
            PRIMARY KEY (student, course)
        )",
        "DROP TABLE enrollments",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'sessions'",
        "CREATE TABLE sessions (
            skey    TEXT PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expires TIMESTAMPTZ NOT NULL
        )",
        "DROP TABLE sessions",
    ),
];

#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
pub struct DbError(String);

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        let mut s = format!("Data DB: {}", &e);
        if let Some(dbe) = e.as_db_error() {
            // Writing to a String can't fail.
            let _ = write!(&mut s, "; {}", dbe);
        }
        DbError(s)
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError(s) }
}

pub struct Store {
    connection_string: String,
}

impl Store {
    pub fn new(connection_string: String) -> Self {
        log::trace!("Store::new( {:?} ) called.", &connection_string);

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        log::trace!(
            "Store::connect() called w/connection string {:?}",
            &self.connection_string
        );

        match tokio_postgres::connect(&self.connection_string, NoTls).await {
            Ok((client, connection)) => {
                log::trace!("    ...connection successful.");
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        log::error!("Data DB connection error: {}", &e);
                    } else {
                        log::trace!("tokio connection runtime drops.");
                    }
                });
                Ok(client)
            },
            Err(e) => {
                let dberr = DbError::from(e);
                log::trace!("    ...connection failed: {:?}", &dberr);
                Err(dberr.annotate("Unable to connect"))
            }
        }
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await
            .map_err(|e| DbError::from(e)
                .annotate("Data DB unable to begin transaction"))?;

        for (test_stmt, create_stmt, _) in SCHEMA.iter() {
            if t.query_opt(test_stmt.to_owned(), &[]).await?.is_none() {
                log::info!(
                    "{:?} returned no results; attempting to insert table.",
                    test_stmt
                );
                t.execute(create_stmt.to_owned(), &[]).await?;
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e)
                .annotate("Error committing transaction"))
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(drop_stmt.to_owned(), &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        log::trace!("    ....nuking complete.");
        Ok(())
    }
}
