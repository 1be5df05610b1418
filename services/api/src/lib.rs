mod batch;
mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use ecochain::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
