use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use taskmanager::auth::SessionKeys;
use taskmanager::config::Config;
use taskmanager::{mailer, routes, store, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let store = match store::connect(&config).await {
        Ok(store) => store,
        Err(err) => {
            log::error!("failed to open the store: {}", err);
            std::process::exit(1);
        }
    };

    let state = web::Data::new(AppState::new(
        store,
        SessionKeys::from_secret(&config.jwt_secret),
        mailer::from_config(&config),
        config.bcrypt_cost,
    ));

    log::info!("Starting task manager server at {}", config.server_url());
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
