use super::*;
use crate::error::{ElementKind, UpdateFailure};
use crate::model::{ContentHash, HostModel, PathElement, ServerElement};

fn host(name: &str) -> HostId {
    HostId::new(name)
}

fn server(h: &str, name: &str, group: &str) -> ServerIdentity {
    ServerIdentity::new(host(h), name, group)
}

fn unit(name: &str, hash: &str) -> DeploymentUnit {
    DeploymentUnit::new(name, name, ContentHash::new(hash))
}

/// Two profiles, two groups, two hosts:
/// - host-a: one (main), two (other)
/// - host-b: three (main), four (main, stopped)
fn fixture() -> DomainModel {
    let mut model = DomainModel::new();
    model
        .add_profile(ProfileElement::new("default").with_subsystem("logging"))
        .unwrap();
    model.add_profile(ProfileElement::new("full")).unwrap();
    model
        .add_server_group(ServerGroupElement::new("main", "default"))
        .unwrap();
    model
        .add_server_group(ServerGroupElement::new("other", "full"))
        .unwrap();
    model
        .register_host(
            HostModel::new(host("host-a"))
                .with_server(ServerElement::new("one", "main"))
                .with_server(ServerElement::new("two", "other")),
        )
        .unwrap();
    model
        .register_host(
            HostModel::new(host("host-b"))
                .with_server(ServerElement::new("three", "main"))
                .with_server(ServerElement::new("four", "main").stopped()),
        )
        .unwrap();
    model
}

/// Applies `update` and then its compensation, asserting the model is back
/// where it started.
fn assert_round_trip(model: &DomainModel, update: DomainUpdate) {
    let compensation = update
        .compensating_update(model)
        .unwrap_or_else(|| panic!("{} should be compensable", update));
    let mut working = model.clone();
    update.apply(&mut working).unwrap();
    assert_ne!(&working, model, "{} changed nothing", update);
    compensation.apply(&mut working).unwrap();
    assert_eq!(&working, model, "compensation of {} did not restore", update);
}

#[test]
fn test_compensation_restores_prior_state() {
    let mut model = fixture();
    model
        .add_path(PathElement::new("logs", "/var/log", None))
        .unwrap();
    model.system_properties_mut().set("mode", "prod");
    model
        .host_mut(&host("host-a"))
        .unwrap()
        .server_mut("one")
        .unwrap()
        .add_path(PathElement::new("tmp", "/tmp", None))
        .unwrap();
    DomainUpdate::Deploy {
        content: unit("lib.jar", "h0"),
        server_groups: vec!["main".into()],
    }
    .apply(&mut model)
    .unwrap();

    let updates = vec![
        DomainUpdate::AddProfile {
            profile: ProfileElement::new("web").with_subsystem("undertow"),
        },
        DomainUpdate::AddSubsystem {
            profile: "default".into(),
            namespace: "jmx".into(),
        },
        DomainUpdate::RemoveSubsystem {
            profile: "default".into(),
            namespace: "logging".into(),
        },
        DomainUpdate::SetSystemProperty {
            name: "mode".into(),
            value: "dev".into(),
        },
        DomainUpdate::SetSystemProperty {
            name: "fresh".into(),
            value: "1".into(),
        },
        DomainUpdate::RemoveSystemProperty {
            name: "mode".into(),
        },
        DomainUpdate::SetHostSystemProperty {
            host: host("host-b"),
            name: "zone".into(),
            value: "eu".into(),
        },
        DomainUpdate::AddPath {
            path: PathElement::new("data", "data", Some("logs".into())),
        },
        DomainUpdate::RemovePath {
            name: "logs".into(),
        },
        DomainUpdate::RemoveServerPath {
            host: host("host-a"),
            server: "one".into(),
            name: "tmp".into(),
        },
        DomainUpdate::Deploy {
            content: unit("app.war", "h1"),
            server_groups: vec!["main".into(), "other".into()],
        },
        DomainUpdate::Undeploy {
            unique_name: "lib.jar".into(),
            server_groups: vec!["main".into()],
            remove_content: true,
        },
        DomainUpdate::Replace {
            to_replace: "lib.jar".into(),
            content: unit("lib-2.jar", "h2"),
            server_groups: vec!["main".into()],
            remove_replaced_content: false,
        },
    ];

    for update in updates {
        assert_round_trip(&model, update);
    }
}

#[test]
fn test_profile_in_use_cannot_be_removed() {
    let model = fixture();
    let update = DomainUpdate::RemoveProfile {
        name: "full".into(),
    };
    // Compensation exists, but the apply itself is refused.
    assert!(update.compensating_update(&model).is_some());
    let mut working = model.clone();
    assert!(matches!(
        update.apply(&mut working),
        Err(UpdateFailure::Constraint(_))
    ));
    assert_eq!(working, model);
}

#[test]
fn test_failed_apply_does_not_mutate() {
    let model = fixture();
    let mut working = model.clone();

    // "ghost" group does not exist; "main" would otherwise succeed first.
    let err = DomainUpdate::Deploy {
        content: unit("app.war", "h1"),
        server_groups: vec!["main".into(), "ghost".into()],
    }
    .apply(&mut working)
    .unwrap_err();

    assert_eq!(err, UpdateFailure::not_found(ElementKind::ServerGroup, "ghost"));
    assert_eq!(working, model);
}

#[test]
fn test_remove_of_missing_path_is_not_found_and_not_compensable() {
    let model = fixture();
    let update = DomainUpdate::RemoveServerPath {
        host: host("host-a"),
        server: "one".into(),
        name: "nope".into(),
    };

    assert!(update.compensating_update(&model).is_none());
    let mut working = model.clone();
    assert_eq!(
        update.apply(&mut working),
        Err(UpdateFailure::not_found(ElementKind::Path, "nope"))
    );
}

#[test]
fn test_content_conflict_is_a_constraint_failure() {
    let mut model = fixture();
    DomainUpdate::Deploy {
        content: unit("app.war", "h1"),
        server_groups: vec![],
    }
    .apply(&mut model)
    .unwrap();

    let err = DomainUpdate::Deploy {
        content: unit("app.war", "other-hash"),
        server_groups: vec!["main".into()],
    }
    .apply(&mut model.clone())
    .unwrap_err();
    assert!(matches!(err, UpdateFailure::Constraint(_)));
}

#[test]
fn test_remove_content_compensation_rebuilds_deploy() {
    let mut model = fixture();
    DomainUpdate::Deploy {
        content: unit("app.war", "h1"),
        server_groups: vec![],
    }
    .apply(&mut model)
    .unwrap();

    let remove = DomainUpdate::Undeploy {
        unique_name: "app.war".into(),
        server_groups: vec![],
        remove_content: true,
    };
    assert_eq!(
        remove.compensating_update(&model),
        Some(DomainUpdate::Deploy {
            content: unit("app.war", "h1"),
            server_groups: vec![],
        })
    );
    assert!(remove.subordinate_update().is_none());
    assert!(remove.affected_servers(&model).is_empty());
}

#[test]
fn test_affected_servers_for_group_scoped_deploy() {
    let model = fixture();
    let update = DomainUpdate::Deploy {
        content: unit("app.war", "h1"),
        server_groups: vec!["main".into()],
    };

    let affected = update.affected_servers(&model);
    // "four" is stopped, "two" is in another group
    assert_eq!(
        affected.into_iter().collect::<Vec<_>>(),
        vec![server("host-a", "one", "main"), server("host-b", "three", "main")]
    );
}

#[test]
fn test_affected_servers_skip_property_overrides() {
    let mut model = fixture();
    model
        .host_mut(&host("host-b"))
        .unwrap()
        .system_properties_mut()
        .set("mode", "local");
    model
        .server_group_mut("other")
        .unwrap()
        .system_properties_mut()
        .set("mode", "group");

    let update = DomainUpdate::SetSystemProperty {
        name: "mode".into(),
        value: "prod".into(),
    };
    let affected: Vec<_> = update.affected_servers(&model).into_iter().collect();
    assert_eq!(affected, vec![server("host-a", "one", "main")]);
}

#[test]
fn test_affected_servers_for_subsystem_follow_profile() {
    let model = fixture();
    let update = DomainUpdate::RemoveSubsystem {
        profile: "default".into(),
        namespace: "logging".into(),
    };
    let affected: Vec<_> = update.affected_servers(&model).into_iter().collect();
    assert_eq!(
        affected,
        vec![server("host-a", "one", "main"), server("host-b", "three", "main")]
    );
}

#[test]
fn test_domain_only_updates_have_no_blast_radius() {
    let model = fixture();
    let update = DomainUpdate::AddProfile {
        profile: ProfileElement::new("web"),
    };
    assert!(update.subordinate_update().is_none());
    assert!(update.affected_servers(&model).is_empty());
}

/// Removing a host override sends the domain value back down rather than
/// deleting the property on the server.
#[test]
fn test_server_updates_fall_back_to_the_next_level() {
    let mut model = fixture();
    model.system_properties_mut().set("mode", "dev");
    let set = DomainUpdate::SetHostSystemProperty {
        host: host("host-a"),
        name: "mode".into(),
        value: "prod".into(),
    };
    set.apply(&mut model).unwrap();

    let remove = DomainUpdate::RemoveHostSystemProperty {
        host: host("host-a"),
        name: "mode".into(),
    };
    let affected = remove.affected_servers(&model);
    remove.apply(&mut model).unwrap();
    let updates = remove.server_updates(&model, &affected);

    assert_eq!(updates.len(), 2);
    for update in updates.values() {
        assert_eq!(
            update,
            &ServerUpdate::SetSystemProperty {
                name: "mode".into(),
                value: "dev".into(),
            }
        );
    }

    let remove_domain = DomainUpdate::RemoveSystemProperty {
        name: "mode".into(),
    };
    let affected = remove_domain.affected_servers(&model);
    remove_domain.apply(&mut model).unwrap();
    for update in remove_domain.server_updates(&model, &affected).values() {
        assert_eq!(
            update,
            &ServerUpdate::RemoveSystemProperty {
                name: "mode".into()
            }
        );
    }
}

#[test]
fn test_server_path_updates_override_and_fall_back() {
    let mut model = fixture();
    model
        .add_path(PathElement::new("logs", "/var/log", None))
        .unwrap();
    let one = server("host-a", "one", "main");

    let add = DomainUpdate::AddServerPath {
        host: host("host-a"),
        server: "one".into(),
        path: PathElement::new("logs", "/srv/log", None),
    };
    let affected = add.affected_servers(&model);
    add.apply(&mut model).unwrap();
    assert_eq!(
        add.server_updates(&model, &affected),
        BTreeMap::from([(
            one.clone(),
            ServerUpdate::SetPath(PathElement::new("logs", "/srv/log", None))
        )])
    );

    let remove = DomainUpdate::RemoveServerPath {
        host: host("host-a"),
        server: "one".into(),
        name: "logs".into(),
    };
    let affected = remove.affected_servers(&model);
    remove.apply(&mut model).unwrap();
    assert_eq!(
        remove.server_updates(&model, &affected),
        BTreeMap::from([(
            one,
            ServerUpdate::SetPath(PathElement::new("logs", "/var/log", None))
        )])
    );
}

#[test]
fn test_deployment_server_updates_are_nominal() {
    let mut model = fixture();
    let deploy = DomainUpdate::Deploy {
        content: unit("app.war", "h1"),
        server_groups: vec!["main".into()],
    };
    let affected = deploy.affected_servers(&model);
    deploy.apply(&mut model).unwrap();
    let updates = deploy.server_updates(&model, &affected);
    assert_eq!(updates.len(), 2);
    assert!(updates
        .values()
        .all(|u| u == &ServerUpdate::Deploy(unit("app.war", "h1"))));
}

#[test]
fn test_update_serializes_with_kind_tag() {
    let update = DomainUpdate::RemovePath {
        name: "logs".into(),
    };
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["type"], "remove-path");
    let back: DomainUpdate = serde_json::from_value(json).unwrap();
    assert_eq!(back, update);
}
