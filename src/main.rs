use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use log::{info, initialize_logger};
use tokio::sync::mpsc;
use warp::Filter;

use risk_backend::classifier::{ClassifierConfig, HttpClassifier};
use risk_backend::config::{get_variable, parse_variable_or};
use risk_backend::db::{Db, PgDb};
use risk_backend::environment::{Config, Environment};
use risk_backend::routes::{self, admin::TerminationFunctionWrapper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    #[cfg(feature = "env_logging")]
    let _guard = log::initialize_env_logging();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("BACKEND_PORT").parse()?;
    let admin_port: u16 = get_variable("BACKEND_ADMIN_PORT").parse()?;

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("BACKEND_DB_CONNECTION_STRING");
    let db = PgDb::connect(
        &connection_string,
        parse_variable_or("BACKEND_DB_MAX_CONNECTIONS", 10),
        Duration::from_secs(parse_variable_or("BACKEND_DB_ACQUIRE_TIMEOUT_SECS", 5)),
    )
    .await?;

    info!(logger, "Ensuring schema...");
    db.ensure_schema().await?;

    let classifier = HttpClassifier::new(ClassifierConfig::from_env())?;
    info!(logger, "Configured classifier"; "endpoint" => %classifier.endpoint());

    let config = Config::from_env();
    let environment = Environment::new(logger.clone(), Arc::new(db), Arc::new(classifier), config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate: TerminationFunctionWrapper = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // a closed channel means shutdown is already under way
            termination_sender.send(()).await.ok();
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let (_, main_server) = warp::serve(routes::make_api(environment))
            .bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::admin::make_healthz_route().or(routes::admin::make_termination_route(terminate));

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
