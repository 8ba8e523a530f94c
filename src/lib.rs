/*!
A small course-enrollment web application.

Students enroll in (and drop) up to `MAX_ENROLLMENTS` courses; faculty
create, update, and delete the courses they teach.
*/
pub mod auth;
pub mod config;
pub mod course;
pub mod error;
pub mod inter;
pub mod store;
pub mod user;

pub use error::Error;

/// The most courses a single student may be enrolled in at once.
pub const MAX_ENROLLMENTS: usize = 2;

pub fn log_level_from_env() -> simplelog::LevelFilter {
    use simplelog::LevelFilter;

    let mut level_string = match std::env::var("LOG_LEVEL") {
        Err(_) => { return LevelFilter::Warn; },
        Ok(s) => s,
    };

    level_string.make_ascii_lowercase();
    match level_string.as_str() {
        "max" => LevelFilter::max(),
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}
