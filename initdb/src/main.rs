//! A helper program to initialize the database: applies the
//! migrations and, when `SPECIMEN_SEED_FILE_EXTENSIONS` is `1`, loads
//! the file extension reference rows.

use std::env;
use std::fs;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger};

const SEED_FILE: &str = "./initdb/seeds/file_extensions.sql";

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let connection_string = env::var("SPECIMEN_DB_CONNECTION_STRING")
        .expect("could not read SPECIMEN_DB_CONNECTION_STRING");

    debug!(logger, "Connecting to database...");

    let client = Client::connect(&connection_string, NoTls).expect("could not connect to database");

    let mut movine = Movine::new(client);
    movine.set_migration_dir("./migrations");

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");
        movine.initialize().expect("failed to initialize movine");
    }

    debug!(logger, "Running migrations...");
    movine.up().expect("failed to run migrations");

    if env::var("SPECIMEN_SEED_FILE_EXTENSIONS").as_deref() == Ok("1") {
        info!(logger, "Seeding file extensions..."; "file" => SEED_FILE);

        let sql = fs::read_to_string(SEED_FILE).expect("could not read seed file");
        let mut client =
            Client::connect(&connection_string, NoTls).expect("could not connect to database");
        client
            .batch_execute(&sql)
            .expect("failed to seed file extensions");
    }

    debug!(logger, "Completed initialization.");
}
