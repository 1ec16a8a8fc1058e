//! Reconciliation against the Marathon backend

mod common;

use common::{FakeMarathon, existing_app, task};
use service_containers::{Error, HealthCheck, HealthCheckType, ServiceConfig};
use std::collections::{BTreeMap, HashSet};

#[smol_potat::test]
async fn test_get_service_creates_one_app() {
    let marathon = FakeMarathon::new();
    let manager = marathon.manager();
    let config = ServiceConfig::builder("web", "nginx")
        .entry_point("nginx")
        .command_line(["-g", "daemon off;"])
        .port(80)
        .port(90)
        .instances(2)
        .build();

    let service = manager.get_service(&config).await.unwrap();

    assert_eq!(
        marathon.requests(),
        vec![
            "GET /v2/apps?label=containers.service.name==web".to_string(),
            "POST /v2/apps".to_string(),
        ]
    );

    let app = marathon.app("web").unwrap();
    assert_eq!(app.cmd.as_deref(), Some("nginx -g 'daemon off;'"));
    assert_eq!(app.instances, 2);
    assert_eq!(app.labels["containers.service.name"], "web");

    let containers = service.list_containers().await.unwrap();
    assert_eq!(containers.len(), 2);
    for (container, task) in containers.iter().zip(&app.tasks) {
        assert_eq!(container.id(), task.id);
        assert_eq!(container.host(), "agent-1");
        assert_eq!(
            container.exposed_ports(),
            &BTreeMap::from([(80, task.ports[0]), (90, task.ports[1])])
        );
    }
}

#[smol_potat::test]
async fn test_get_service_adopts_existing_app() {
    let marathon = FakeMarathon::new();
    marathon.seed_app(existing_app(
        "web",
        &[80, 90],
        vec![task("web.t1", "agent-7", &[1180, 1190])],
    ));
    let manager = marathon.manager();
    let config = ServiceConfig::builder("web", "nginx").port(80).port(90).build();

    let service = manager.get_service(&config).await.unwrap();
    assert!(!marathon.requests().iter().any(|r| r.starts_with("POST")));

    let containers = service.containers();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].id(), "web.t1");
    assert_eq!(containers[0].host(), "agent-7");
    assert_eq!(
        containers[0].exposed_ports(),
        &BTreeMap::from([(80, 1180), (90, 1190)])
    );
}

#[smol_potat::test]
async fn test_fewer_reported_ports_leave_declared_ports_unbound() {
    let marathon = FakeMarathon::new();
    marathon.seed_app(existing_app(
        "web",
        &[80, 90],
        vec![task("web.t1", "agent-1", &[1180])],
    ));
    let manager = marathon.manager();
    let config = ServiceConfig::builder("web", "nginx").port(80).port(90).build();

    let service = manager.get_service(&config).await.unwrap();
    let containers = service.list_containers().await.unwrap();

    assert_eq!(containers[0].exposed_port(80), Some(1180));
    assert_eq!(containers[0].exposed_port(90), None);
}

#[smol_potat::test]
async fn test_get_service_is_idempotent() {
    let marathon = FakeMarathon::new();
    let manager = marathon.manager();
    let config = ServiceConfig::builder("web", "nginx").build();

    let first = manager.get_service(&config).await.unwrap();
    let second = manager.get_service(&config).await.unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(marathon.requests().len(), 2);
    assert_eq!(marathon.apps().len(), 1);
}

#[smol_potat::test]
async fn test_more_than_one_matching_app_is_illegal() {
    let marathon = FakeMarathon::new();
    let mut duplicate = existing_app("web", &[], vec![]);
    duplicate.id = "/web-copy".to_string();
    marathon.seed_app(existing_app("web", &[], vec![]));
    marathon.seed_app(duplicate);

    let manager = marathon.manager();
    let result = manager
        .get_service(&ServiceConfig::builder("web", "nginx").build())
        .await;

    assert!(matches!(result, Err(Error::IllegalState(_))));
    assert!(manager.cached("web").is_none());
}

#[smol_potat::test]
async fn test_created_app_without_label_is_illegal() {
    let marathon = FakeMarathon::new();
    marathon.drop_labels_on_create();
    let manager = marathon.manager();

    let result = manager
        .get_service(&ServiceConfig::builder("web", "nginx").build())
        .await;

    assert!(matches!(result, Err(Error::IllegalState(_))));
}

#[smol_potat::test]
async fn test_unsupported_health_check_fails_before_creation() {
    let marathon = FakeMarathon::new();
    let manager = marathon.manager();
    let config = ServiceConfig::builder("web", "nginx")
        .health_check(HealthCheck::builder(HealthCheckType::Https).build())
        .build();

    let result = manager.get_service(&config).await;

    assert!(matches!(
        result,
        Err(Error::UnsupportedHealthCheck {
            backend: "marathon",
            kind: HealthCheckType::Https,
        })
    ));
    assert!(marathon.apps().is_empty());
}

#[smol_potat::test]
async fn test_scaling_updates_desired_count() {
    let marathon = FakeMarathon::new();
    let manager = marathon.manager();
    let service = manager
        .get_service(&ServiceConfig::builder("web", "nginx").port(80).build())
        .await
        .unwrap();

    service.set_instance_count(5).await.unwrap();

    assert!(
        marathon
            .requests()
            .contains(&"PUT /v2/apps/web?force=true {\"instances\":5}".to_string())
    );
    assert_eq!(service.actual_instance_count().await.unwrap(), 5);
    assert_eq!(service.list_containers().await.unwrap().len(), 5);

    service.set_instance_count(2).await.unwrap();
    assert_eq!(service.list_containers().await.unwrap().len(), 2);
}

#[smol_potat::test]
async fn test_refresh_is_a_no_op() {
    let marathon = FakeMarathon::new();
    let manager = marathon.manager();
    let service = manager
        .get_service(&ServiceConfig::builder("web", "nginx").build())
        .await
        .unwrap();

    let before = marathon.requests().len();
    service.refresh().await.unwrap();
    assert_eq!(marathon.requests().len(), before);
}

#[smol_potat::test]
async fn test_destroy_deletes_app() {
    let marathon = FakeMarathon::new();
    let manager = marathon.manager();
    let service = manager
        .get_service(&ServiceConfig::builder("web", "nginx").instances(3).build())
        .await
        .unwrap();

    service.destroy().await.unwrap();

    assert!(marathon.apps().is_empty());
    assert_eq!(marathon.requests().last().unwrap(), "DELETE /v2/apps/web");
    assert!(service.containers().is_empty());
}

#[smol_potat::test]
async fn test_container_destroy_kills_task_and_scales_down() {
    let marathon = FakeMarathon::new();
    let manager = marathon.manager();
    let service = manager
        .get_service(&ServiceConfig::builder("web", "nginx").instances(2).build())
        .await
        .unwrap();

    let victim = service.list_containers().await.unwrap()[0].clone();
    victim.destroy().await;

    assert_eq!(
        marathon.requests().last().unwrap(),
        &format!("DELETE /v2/apps/web/tasks/{}?scale=true", victim.id())
    );
    assert_eq!(marathon.app("web").unwrap().instances, 1);
    assert_eq!(service.list_containers().await.unwrap().len(), 1);
}

#[smol_potat::test]
async fn test_list_services_reads_app_labels() {
    let marathon = FakeMarathon::new();
    marathon.seed_app(existing_app("alpha", &[], vec![]));
    marathon.seed_app(existing_app("beta", &[], vec![]));
    let mut unlabelled = existing_app("gamma", &[], vec![]);
    unlabelled.labels.clear();
    marathon.seed_app(unlabelled);
    let mut empty = existing_app("delta", &[], vec![]);
    empty
        .labels
        .insert("containers.service.name".to_string(), String::new());
    marathon.seed_app(empty);

    let manager = marathon.manager();
    manager
        .get_service(&ServiceConfig::builder("web", "nginx").build())
        .await
        .unwrap();

    let names = manager.list_services().await.unwrap();
    assert_eq!(
        names,
        HashSet::from(["alpha".to_string(), "beta".to_string(), "web".to_string()])
    );
    assert_eq!(
        marathon.requests().last().unwrap(),
        "GET /v2/apps?label=containers.service.name"
    );
}
