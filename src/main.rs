/*!
Course enrollment server.

```bash
enroll [ path/to/config.toml ]
```

The configuration file defaults to `config.toml` in the working directory.
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    Router,
    routing::get,
};
use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tower_http::services::ServeDir;

use enroll::config;
use enroll::inter::{self, account, faculty, student};

#[tokio::main]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("enroll")
        .build();
    if let Err(e) = TermLogger::init(
        enroll::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ) {
        eprintln!("Unable to start logging: {}", &e);
    }
    log::info!("Logging started.");

    let config_path = std::env::args().nth(1)
        .unwrap_or_else(|| "config.toml".to_owned());

    let (glob, cfg) = match config::load_configuration(&config_path).await {
        Ok(x) => x,
        Err(e) => {
            log::error!("Error loading configuration from {:?}: {}", &config_path, &e);
            std::process::exit(1);
        },
    };
    let glob = Arc::new(glob);

    let app = Router::new()
        .route("/", get(inter::index))
        .route("/login", get(account::login_page).post(account::login))
        .route("/logout", get(account::logout))
        .route("/register", get(account::register_page).post(account::register))
        .route("/student-dashboard", get(student::dashboard).post(student::action))
        .route("/faculty-dashboard", get(faculty::dashboard).post(faculty::action))
        .nest_service("/static", ServeDir::new(&cfg.static_dir))
        .layer(Extension(glob));

    log::info!("Listening on {}", &cfg.addr);

    if let Err(e) = axum::Server::bind(&cfg.addr)
        .serve(app.into_make_service())
        .await
    {
        log::error!("Server error: {}", &e);
        std::process::exit(1);
    }
}
