//! Many-to-many reads and writes through junction tables.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use agora::application::entities::{
    CreateOrganization, CreatePerson, CreateProject, CreateTheme, Services,
};
use agora::application::query::{QueryOptions, SortOrder};
use agora::application::result::ErrorCode;
use agora::cache::MemoryCache;
use agora::domain::entities::ThemeRecord;
use agora::infra::memory::MemoryStore;

fn services() -> (Arc<MemoryStore>, Services) {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new(
        NonZeroUsize::new(64).expect("non-zero capacity"),
    ));
    let services = Services::new(store.clone(), cache, Duration::from_secs(60));
    (store, services)
}

async fn theme(services: &Services, nombre: &str) -> String {
    services
        .themes
        .create(CreateTheme {
            nombre: nombre.to_string(),
            descripcion: None,
        })
        .await
        .expect("theme created")
        .id
}

async fn project(services: &Services, nombre: &str) -> String {
    services
        .projects
        .create(CreateProject {
            nombre: nombre.to_string(),
            ..Default::default()
        })
        .await
        .expect("project created")
        .id
}

#[tokio::test]
async fn entity_without_links_has_no_related_rows() {
    let (_, services) = services();
    let project = project(&services, "Huerta").await;

    let themes = services
        .projects
        .themes(&project, &QueryOptions::default())
        .await
        .expect("related read");
    assert!(themes.is_empty());
}

#[tokio::test]
async fn links_are_visible_from_both_ends() {
    let (_, services) = services();
    let project = project(&services, "Huerta").await;
    let energia = theme(&services, "Energía").await;
    let agua = theme(&services, "Agua").await;
    theme(&services, "Salud").await;

    assert!(services.projects.add_theme(&project, &energia).await.expect("linked"));
    assert!(services.projects.add_theme(&project, &agua).await.expect("linked"));
    assert!(
        !services.projects.add_theme(&project, &agua).await.expect("relinked"),
        "duplicate link reports no change"
    );

    let themes = services
        .projects
        .themes(&project, &QueryOptions::default().sort("nombre", SortOrder::Asc))
        .await
        .expect("related read");
    let names: Vec<_> = themes.iter().map(|theme| theme.nombre.as_str()).collect();
    assert_eq!(names, ["Agua", "Energía"]);

    let projects = services
        .themes
        .projects(&energia, &QueryOptions::default())
        .await
        .expect("reverse read");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, project);
}

#[tokio::test]
async fn unlink_removes_only_that_pair() {
    let (_, services) = services();
    let project = project(&services, "Huerta").await;
    let ada = services
        .people
        .create(CreatePerson {
            nombre: "Ada".to_string(),
            ..Default::default()
        })
        .await
        .expect("created")
        .id;
    let grace = services
        .people
        .create(CreatePerson {
            nombre: "Grace".to_string(),
            ..Default::default()
        })
        .await
        .expect("created")
        .id;

    services.projects.add_author(&project, &ada).await.expect("linked");
    services.projects.add_author(&project, &grace).await.expect("linked");

    assert!(services.projects.remove_author(&project, &ada).await.expect("unlinked"));
    assert!(!services.projects.remove_author(&project, &ada).await.expect("already gone"));

    let authors = services
        .projects
        .authors(&project, &QueryOptions::default())
        .await
        .expect("related read");
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].id, grace);

    let projects = services
        .people
        .projects(&ada, &QueryOptions::default())
        .await
        .expect("reverse read");
    assert!(projects.is_empty());
}

#[tokio::test]
async fn related_reads_page_and_sort() {
    let (_, services) = services();
    let organization = services
        .organizations
        .create(CreateOrganization {
            nombre: "Coop A".to_string(),
            ..Default::default()
        })
        .await
        .expect("created")
        .id;

    for nombre in ["A", "B", "C", "D", "E"] {
        let id = theme(&services, nombre).await;
        services
            .organizations
            .add_theme(&organization, &id)
            .await
            .expect("linked");
    }

    let page = services
        .organizations
        .themes(
            &organization,
            &QueryOptions::default()
                .sort("nombre", SortOrder::Desc)
                .paginate(2, 2),
        )
        .await
        .expect("related read");
    let names: Vec<_> = page.iter().map(|theme| theme.nombre.as_str()).collect();
    assert_eq!(names, ["C", "B"]);
}

#[tokio::test]
async fn organization_projects_are_shared_with_project_view() {
    let (_, services) = services();
    let project = project(&services, "Radio").await;
    let organization = services
        .organizations
        .create(CreateOrganization {
            nombre: "Coop A".to_string(),
            ..Default::default()
        })
        .await
        .expect("created")
        .id;

    services
        .organizations
        .add_project(&organization, &project)
        .await
        .expect("linked");

    let backers = services
        .projects
        .organizations(&project, &QueryOptions::default())
        .await
        .expect("related read");
    assert_eq!(backers.len(), 1);
    assert_eq!(backers[0].nombre, "Coop A");

    services
        .organizations
        .remove_project(&organization, &project)
        .await
        .expect("unlinked");
    let backers = services
        .projects
        .organizations(&project, &QueryOptions::default())
        .await
        .expect("related read");
    assert!(backers.is_empty());
}

#[tokio::test]
async fn unsafe_relation_names_never_reach_storage() {
    let (store, services) = services();

    let err = services
        .projects
        .get_related_entities::<ThemeRecord>(
            "p1",
            "proyecto",
            "tema",
            "proyecto_tema; DELETE FROM tema",
            &QueryOptions::default(),
        )
        .await
        .expect_err("rejected");
    assert_eq!(err.code, ErrorCode::ValidationError);

    let err = services
        .projects
        .link_related("p1", "proyecto", "tema", "proyecto tema", "t1")
        .await
        .expect_err("rejected");
    assert_eq!(err.code, ErrorCode::ValidationError);

    assert_eq!(store.reads(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn blank_related_id_is_validation_error() {
    let (store, services) = services();
    let err = services
        .projects
        .themes(" ", &QueryOptions::default())
        .await
        .expect_err("blank id");
    assert!(err.is_validation());
    assert_eq!(store.reads(), 0);
}
