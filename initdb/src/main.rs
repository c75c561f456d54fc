//! A helper program to initialize the database ahead of the first
//! deployment or for testing.

use std::error::Error;
use std::time::Duration;

use log::{debug, info, initialize_logger};
use risk_backend::config::{get_variable, parse_variable_or};
use risk_backend::db::{Db, PgDb};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let connection_string = get_variable("BACKEND_DB_CONNECTION_STRING");

    debug!(logger, "Connecting to database...");

    let db = PgDb::connect(
        &connection_string,
        1,
        Duration::from_secs(parse_variable_or("BACKEND_DB_ACQUIRE_TIMEOUT_SECS", 5)),
    )
    .await?;

    debug!(logger, "Ensuring schema...");
    db.ensure_schema().await?;

    info!(logger, "Completed initialization."; "version" => info::VERSION);

    Ok(())
}
