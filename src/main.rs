use std::{process, sync::Arc};

use agora::{
    application::{
        blobs::BlobStore,
        error::AppError,
        pagination::Paging,
        services::Services,
        storage::{DataStorage, StorageLayer},
    },
    cache::{self, CacheConfig},
    config::{self, Command, Settings},
    infra::{blobs::DiskBlobStore, db::PgBackend, error::InfraError, telemetry},
};
use sqlx::PgPool;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(target: "agora::setup", error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(target: "agora::setup", error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command.unwrap_or(Command::Check) {
        Command::Check => run_check(settings).await,
        Command::Migrate => run_migrate(settings).await,
        Command::CachePlan => run_cache_plan(),
    }
}

/// Wire every component against the configured backends and verify they answer.
async fn run_check(settings: Settings) -> Result<(), AppError> {
    let pool = connect(&settings).await?;
    if settings.database.run_migrations {
        migrate(&pool).await?;
    }

    let backend = PgBackend::new(pool);
    backend
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let layer = cache::build(&CacheConfig::from(&settings.cache))
        .await
        .map_err(InfraError::from)?
        .map(|layer| Arc::new(layer) as Arc<dyn StorageLayer>);
    let storage = DataStorage::new(Arc::new(backend), layer);

    let blobs: Arc<dyn BlobStore> = Arc::new(
        DiskBlobStore::new(
            settings.blobs.directory.clone(),
            settings.blobs.post_pages_bucket.clone(),
            settings.blobs.profile_pictures_bucket.clone(),
        )
        .map_err(InfraError::from)?,
    );

    let services = Services::new(storage, blobs);
    let topics = services
        .topics
        .search(None, Paging::first(1), None)
        .await?;

    info!(
        target: "agora::setup",
        cache_enabled = settings.cache.enabled,
        blobs = %settings.blobs.directory.display(),
        has_topics = !topics.data.is_empty(),
        "all components ready"
    );
    Ok(())
}

async fn run_migrate(settings: Settings) -> Result<(), AppError> {
    let pool = connect(&settings).await?;
    migrate(&pool).await?;
    info!(target: "agora::setup", "migrations applied");
    Ok(())
}

fn run_cache_plan() -> Result<(), AppError> {
    let plan = cache::default_plan().map_err(|err| InfraError::from(cache::CacheError::from(err)))?;
    println!("{plan}");
    Ok(())
}

async fn connect(settings: &Settings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PgBackend::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    info!(
        target: "agora::setup",
        max_connections = settings.database.max_connections.get(),
        "database pool ready"
    );
    Ok(pool)
}

async fn migrate(pool: &PgPool) -> Result<(), AppError> {
    PgBackend::run_migrations(pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}
