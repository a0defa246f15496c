//! Services against a real Postgres.
//!
//! - Requires `DATABASE_URL`; `sqlx::test` creates a scratch database per test
//!   and applies `./migrations`.
//! - Marked `#[ignore]`; run with `cargo test --test postgres -- --ignored`.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use agora::application::entities::{
    CreateOrganization, CreateProject, CreateTheme, Services, UpdateOrganization,
};
use agora::application::query::{ListOptions, QueryOptions, SearchOptions, SortOrder};
use agora::application::result::ErrorCode;
use agora::cache::MemoryCache;
use agora::domain::entities::SoftDeletable;
use agora::infra::db::PostgresStore;
use sqlx::PgPool;

fn services(pool: PgPool) -> Services {
    let cache = Arc::new(MemoryCache::new(
        NonZeroUsize::new(64).expect("non-zero capacity"),
    ));
    Services::new(
        Arc::new(PostgresStore::new(pool)),
        cache,
        Duration::from_secs(60),
    )
}

fn organization(nombre: &str) -> CreateOrganization {
    CreateOrganization {
        nombre: nombre.to_string(),
        sitio_web: Some("https://example.org".to_string()),
        ..Default::default()
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn crud_round_trip(pool: PgPool) {
    let services = services(pool);
    let created = services
        .organizations
        .create(organization("Coop A"))
        .await
        .expect("created");
    assert!(!created.id.is_empty());
    assert!(!created.is_deleted());

    let fetched = services
        .organizations
        .get_by_id(&created.id)
        .await
        .expect("read");
    assert_eq!(fetched, Some(created.clone()));

    let updated = services
        .organizations
        .update(
            &created.id,
            UpdateOrganization {
                localidad: Some(Some("Córdoba".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("updated");
    assert_eq!(updated.localidad.as_deref(), Some("Córdoba"));
    assert_eq!(updated.nombre, "Coop A");

    services
        .organizations
        .delete(&created.id)
        .await
        .expect("deleted");
    assert_eq!(
        services
            .organizations
            .get_by_id(&created.id)
            .await
            .expect("read"),
        None
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn update_of_missing_row_is_validation_error(pool: PgPool) {
    let services = services(pool);
    let err = services
        .organizations
        .update(
            "does-not-exist",
            UpdateOrganization {
                nombre: Some("x".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::ValidationError);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn soft_delete_and_search(pool: PgPool) {
    let services = services(pool);
    let a = services
        .organizations
        .create(organization("Coop A"))
        .await
        .expect("created");
    services
        .organizations
        .create(organization("Taller B"))
        .await
        .expect("created");

    let found = services
        .organizations
        .search("coop", &SearchOptions::default())
        .await
        .expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, a.id);

    services
        .organizations
        .soft_delete(&a.id, "admin")
        .await
        .expect("soft deleted");
    let listed = services
        .organizations
        .get_all(&ListOptions::default())
        .await
        .expect("listed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].nombre, "Taller B");

    services.organizations.restore(&a.id).await.expect("restored");
    let listed = services
        .organizations
        .get_all(&ListOptions::default())
        .await
        .expect("listed");
    assert_eq!(listed.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn junction_reads_and_writes(pool: PgPool) {
    let services = services(pool);
    let project = services
        .projects
        .create(CreateProject {
            nombre: "Huerta".to_string(),
            ..Default::default()
        })
        .await
        .expect("created");

    for nombre in ["Agua", "Energía", "Salud"] {
        let theme = services
            .themes
            .create(CreateTheme {
                nombre: nombre.to_string(),
                descripcion: None,
            })
            .await
            .expect("created");
        if nombre != "Salud" {
            assert!(
                services
                    .projects
                    .add_theme(&project.id, &theme.id)
                    .await
                    .expect("linked")
            );
        }
    }

    let themes = services
        .projects
        .themes(
            &project.id,
            &QueryOptions::default().sort("nombre", SortOrder::Desc),
        )
        .await
        .expect("related");
    let names: Vec<_> = themes.iter().map(|theme| theme.nombre.as_str()).collect();
    assert_eq!(names, ["Energía", "Agua"]);

    assert!(
        !services
            .projects
            .add_theme(&project.id, &themes[0].id)
            .await
            .expect("relinked")
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn unknown_column_is_db_error_with_sqlstate(pool: PgPool) {
    let services = services(pool);
    let err = services
        .organizations
        .get_all(&ListOptions::from(
            QueryOptions::default().filter("no_such_column", "x"),
        ))
        .await
        .expect_err("unknown column");
    assert_eq!(err.code, ErrorCode::DbError);
    let cause = err.details.as_ref().and_then(|details| details["cause"].as_str());
    assert!(
        cause.is_some_and(|cause| cause.contains("42703")),
        "{:?}",
        err.details
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn duplicate_theme_name_is_db_error_with_constraint(pool: PgPool) {
    let services = services(pool);
    let theme = || CreateTheme {
        nombre: "Energía".to_string(),
        descripcion: None,
    };
    services.themes.create(theme()).await.expect("created");

    let err = services.themes.create(theme()).await.expect_err("duplicate");
    assert_eq!(err.code, ErrorCode::DbError);
    assert_eq!(
        err.details,
        Some(serde_json::json!({ "constraint": "tema_nombre_key" }))
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn update_sets_cleared_column_to_null(pool: PgPool) {
    let services = services(pool);
    let created = services
        .organizations
        .create(organization("Coop A"))
        .await
        .expect("created");
    assert!(created.sitio_web.is_some());

    let cleared = services
        .organizations
        .update(
            &created.id,
            UpdateOrganization {
                sitio_web: Some(None),
                ..Default::default()
            },
        )
        .await
        .expect("updated");
    assert_eq!(cleared.sitio_web, None);
    assert_eq!(cleared.nombre, "Coop A");
}
