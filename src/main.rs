use std::{io::Write, process::ExitCode, sync::Arc};

use agora::{
    application::{
        entities::Services,
        error::AppError,
        query::{QueryOptions, SearchOptions},
        result::{Envelope, ServiceResult},
    },
    cache::CacheConfig,
    config::{self, Command, EntityKind, GetArgs, RelatedArgs, RelationKind, SearchArgs, Settings},
    infra::{db::PostgresStore, error::InfraError, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Migrate => run_migrate(&settings).await,
        Command::Health => run_health(&settings).await,
        Command::Get(args) => run_get(&settings, args).await,
        Command::Search(args) => run_search(&settings, args).await,
        Command::Related(args) => run_related(&settings, args).await,
    }
}

async fn connect(settings: &Settings) -> Result<PostgresStore, AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database.url is not set; pass --database-url or AGORA__DATABASE__URL",
        ))
    })?;

    PostgresStore::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(format!("failed to connect: {err}")).into())
}

async fn services(settings: &Settings) -> Result<Services, AppError> {
    let store = connect(settings).await?;
    let cache = CacheConfig::from(&settings.cache);
    Ok(Services::new(
        Arc::new(store),
        cache.build_adapter(),
        cache.default_ttl,
    ))
}

async fn run_migrate(settings: &Settings) -> Result<(), AppError> {
    let store = connect(settings).await?;
    store.migrate().await.map_err(InfraError::from)?;
    emit(Ok(serde_json::json!({ "migrated": true })))
}

async fn run_health(settings: &Settings) -> Result<(), AppError> {
    let store = connect(settings).await?;
    store.health_check().await.map_err(InfraError::from)?;
    emit(Ok(serde_json::json!({ "database": "ok" })))
}

async fn run_get(settings: &Settings, args: GetArgs) -> Result<(), AppError> {
    let services = services(settings).await?;
    let id = args.id.as_str();
    match args.entity {
        EntityKind::Organizations => emit(services.organizations.get_by_id(id).await),
        EntityKind::Projects => emit(services.projects.get_by_id(id).await),
        EntityKind::Themes => emit(services.themes.get_by_id(id).await),
        EntityKind::People => emit(services.people.get_by_id(id).await),
    }
}

async fn run_search(settings: &Settings, args: SearchArgs) -> Result<(), AppError> {
    let services = services(settings).await?;
    let options = SearchOptions {
        query: args.listing.to_query(),
        searchable_fields: (!args.fields.is_empty()).then_some(args.fields),
        include_deleted: args.include_deleted,
    };
    let query = args.query.as_str();
    match args.entity {
        EntityKind::Organizations => emit(services.organizations.search(query, &options).await),
        EntityKind::Projects => emit(services.projects.search(query, &options).await),
        EntityKind::Themes => emit(services.themes.search(query, &options).await),
        EntityKind::People => emit(services.people.search(query, &options).await),
    }
}

async fn run_related(settings: &Settings, args: RelatedArgs) -> Result<(), AppError> {
    let services = services(settings).await?;
    let options: QueryOptions = args.listing.to_query();
    let id = args.id.as_str();

    match (args.entity, args.relation) {
        (EntityKind::Organizations, RelationKind::Themes) => {
            emit(services.organizations.themes(id, &options).await)
        }
        (EntityKind::Organizations, RelationKind::Projects) => {
            emit(services.organizations.projects(id, &options).await)
        }
        (EntityKind::Projects, RelationKind::Themes) => {
            emit(services.projects.themes(id, &options).await)
        }
        (EntityKind::Projects, RelationKind::Authors) => {
            emit(services.projects.authors(id, &options).await)
        }
        (EntityKind::Projects, RelationKind::Organizations) => {
            emit(services.projects.organizations(id, &options).await)
        }
        (EntityKind::Themes, RelationKind::Organizations) => {
            emit(services.themes.organizations(id, &options).await)
        }
        (EntityKind::Themes, RelationKind::Projects) => {
            emit(services.themes.projects(id, &options).await)
        }
        (EntityKind::People, RelationKind::Projects) => {
            emit(services.people.projects(id, &options).await)
        }
        (entity, relation) => Err(AppError::validation(format!(
            "{entity} have no `{relation}` relation"
        ))),
    }
}

/// Print the result envelope on stdout; failures are also returned for the exit code.
fn emit<T: Serialize>(result: ServiceResult<T>) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(&Envelope::from(&result))
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(InfraError::from)?;

    result.map(|_| ()).map_err(AppError::from)
}
