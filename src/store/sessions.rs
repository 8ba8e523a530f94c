/*!
`Store` methods for login sessions.

A session is a random key handed to the browser in a cookie, mapped here to
the user who logged in, until it expires or the user logs out.
*/
use super::{users::user_from_row, DbError, Store};
use crate::{auth, user::User};

impl Store {
    /// Issue a new session key for `user_id`, good for `lifetime` seconds.
    ///
    /// Also clears out any expired sessions while it's in there.
    pub async fn issue_key(
        &self,
        user_id: i64,
        lifetime: u32,
    ) -> Result<String, DbError> {
        log::trace!("Store::issue_key( {}, {} ) called.", &user_id, &lifetime);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        let n_expired = t.execute(
            "DELETE FROM sessions WHERE expires <= now()",
            &[]
        ).await?;
        if n_expired > 0 {
            log::trace!("Purged {} expired sessions.", &n_expired);
        }

        let key = auth::generate_key();
        let secs = lifetime as f64;
        t.execute(
            "INSERT INTO sessions (skey, user_id, expires)
                VALUES ($1, $2, now() + make_interval(secs => $3))",
            &[&key, &user_id, &secs]
        ).await?;

        t.commit().await?;
        Ok(key)
    }

    /// Return the user logged in with session `key`, if it's current.
    pub async fn user_by_key(&self, key: &str) -> Result<Option<User>, DbError> {
        log::trace!("Store::user_by_key( [ key ] ) called.");

        if !auth::plausible_key(key) {
            return Ok(None);
        }

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT users.* FROM sessions
                INNER JOIN users ON users.id = sessions.user_id
                WHERE sessions.skey = $1 AND sessions.expires > now()",
            &[&key]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    /// End session `key`. Revoking a key that doesn't exist is not an error.
    pub async fn revoke_key(&self, key: &str) -> Result<(), DbError> {
        log::trace!("Store::revoke_key( [ key ] ) called.");

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM sessions WHERE skey = $1",
            &[&key]
        ).await?;
        log::trace!("    ...{} session(s) revoked.", &n);

        Ok(())
    }
}
