/*!
Structs to hold configuration data and global variables.
*/
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{inter, store::Store};

#[derive(Deserialize)]
struct ConfigFile {
    db_connect_string: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    templates_dir: Option<String>,
    static_dir: Option<String>,
    session_lifetime: Option<u32>,
    infer_faculty_role: Option<bool>,
}

#[derive(Debug)]
pub struct Cfg {
    pub db_connect_string: String,
    pub addr: SocketAddr,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    /// How long a login lasts, in seconds.
    pub session_lifetime: u32,
    /// Switch users whose usernames start with "faculty" to the Faculty
    /// role when they log in.
    pub infer_faculty_role: bool,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            db_connect_string: "host=localhost user=enroll_test password='enroll_test' dbname=enroll_test".to_owned(),
            addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                8001
            ),
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            session_lifetime: 60 * 60 * 24,
            infer_faculty_role: true,
        }
    }
}

impl Cfg {
    pub fn from_toml(file_contents: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(file_contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.db_connect_string {
            c.db_connect_string = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.templates_dir {
            c.templates_dir = PathBuf::from(s);
        }
        if let Some(s) = cf.static_dir {
            c.static_dir = PathBuf::from(s);
        }
        if let Some(n) = cf.session_lifetime {
            c.session_lifetime = n;
        }
        if let Some(b) = cf.infer_faculty_role {
            c.infer_faculty_role = b;
        }

        Ok(c)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!(
                "Unable to read config file {}: {}", path.display(), &e
            ))?;
        Self::from_toml(&file_contents)
    }
}

/**
This guy hauls around the things every request handler needs, and gets
passed to them in an `axum::Extension`.

Nothing in here changes after startup.
*/
pub struct Glob {
    pub store: Store,
    pub session_lifetime: u32,
    pub infer_faculty_role: bool,
}

/// Loads system configuration, ensures all appropriate database tables
/// exist, and registers the page templates.
///
/// Returns the `Glob` along with the rest of the configuration `main()`
/// needs to get the server going.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<(Glob, Cfg), String> {
    let cfg = Cfg::from_file(path.as_ref())?;
    log::info!("Configuration file read:\n{:#?}", &cfg);

    log::trace!("Checking state of data DB...");
    let store = Store::new(cfg.db_connect_string.clone());
    if let Err(e) = store.ensure_db_schema().await {
        let estr = format!("Unable to ensure state of data DB: {}", &e);
        return Err(estr);
    }
    log::trace!("...data DB okay.");

    inter::init(&cfg.templates_dir)?;

    let glob = Glob {
        store,
        session_lifetime: cfg.session_lifetime,
        infer_faculty_role: cfg.infer_faculty_role,
    };

    Ok((glob, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    #[test]
    fn config_file() {
        ensure_logging();

        let cfg = Cfg::from_file("test/config_0.toml").unwrap();
        log::trace!("Config:\n{:#?}", &cfg);

        assert_eq!(cfg.db_connect_string, "host=db.internal user=enroll dbname=enroll");
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.session_lifetime, 3600);
        assert!(!cfg.infer_faculty_role);
        // Unmentioned keys keep their defaults.
        assert_eq!(cfg.templates_dir, PathBuf::from("templates"));
        assert_eq!(cfg.static_dir, PathBuf::from("static"));
    }

    #[test]
    fn empty_config() {
        let cfg = Cfg::from_toml("").unwrap();
        let default = Cfg::default();
        assert_eq!(cfg.addr, default.addr);
        assert_eq!(cfg.db_connect_string, default.db_connect_string);
        assert!(cfg.infer_faculty_role);
    }

    #[test]
    fn bad_config() {
        assert!(Cfg::from_toml("host = \"not an address\"").is_err());
        assert!(Cfg::from_toml("port = \"eighty\"").is_err());
        assert!(Cfg::from_file("test/no_such_file.toml").is_err());
    }
}
