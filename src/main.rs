use std::error::Error;
use std::fs;
use std::sync::Arc;

use futures::future::FutureExt;
use warp::Filter;

use log::{info, initialize_logger};
use specimen_backend::config::{get_variable, optional_variable, parse_variable};
use specimen_backend::db::PgDb;
use specimen_backend::environment::{Config, Environment};
use specimen_backend::routes;
use specimen_backend::store::LocalStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = parse_variable("SPECIMEN_PORT");
    let admin_port: u16 = parse_variable("SPECIMEN_ADMIN_PORT");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    let upload_dir = get_variable("SPECIMEN_UPLOAD_DIR");
    fs::create_dir_all(&upload_dir)?;
    let store = Arc::new(LocalStore::new(&upload_dir));

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("SPECIMEN_DB_CONNECTION_STRING");
    let pool = sqlx::PgPool::connect(&connection_string).await?;
    let db = Arc::new(PgDb::new(pool));

    let config = Config::new(optional_variable("SPECIMEN_MAX_UPLOAD_BYTES"));
    let environment = Environment::new(logger.clone(), db, store, config);

    let should_terminate = async {
        tokio::signal::ctrl_c().await.ok();
    }
    .shared();

    let main_server = {
        let should_terminate = should_terminate.clone();
        let logger2 = logger.clone();

        let routes = routes::make_create_route(environment.clone())
            .or(routes::make_attach_route(environment.clone()))
            .or(routes::make_retrieve_route(environment.clone()))
            .recover(move |r| routes::format_rejection(logger2.clone(), r));

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let (_, admin_server) = warp::serve(routes::admin::make_healthz_route())
            .bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
