// tests/publish.rs

//! Publishing tests: transactional version commits, dependency links,
//! conflicts, rollback and version token lookups.

mod common;

use common::{
    FailingNotifier, RecordingNotifier, metadata, readme, register, row_count, setup_db,
};
use larder::db;
use larder::db::models::{Cookbook, CookbookDependency};
use larder::{Error, NoopNotifier, PublishNotice, publish_version};
use std::sync::{Arc, Barrier};

const TARBALL: &str = "https://artifacts.example.com/apache2.tgz";

#[test]
fn test_publish_writes_version_platforms_and_dependencies() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();

    let iptables = register(&mut conn, "iptables");
    let mut apache2 = register(&mut conn, "apache2");
    let notifier = RecordingNotifier::default();

    let meta = metadata(
        "1.0.0",
        &[("ubuntu", ">= 12.04"), ("debian", ">= 7.0"), ("centos", "~> 6.0")],
        &[("iptables", ">= 0.0.0"), ("logrotate", "~> 1.2")],
    );
    let version =
        publish_version(&mut conn, &mut apache2, &meta, TARBALL, &readme(), &notifier).unwrap();
    let version_id = version.id.unwrap();

    assert_eq!(version.version, "1.0.0");
    assert_eq!(version.license.as_deref(), Some("Apache-2.0"));
    assert_eq!(version.readme_extension, "md");
    assert_eq!(version.supported_platforms(&conn).unwrap().len(), 3);
    assert_eq!(
        CookbookDependency::count_by_version(&conn, version_id).unwrap(),
        2
    );

    // Linked iff a cookbook of that exact name was registered
    let deps = version.dependencies(&conn).unwrap();
    let link = |name: &str| deps.iter().find(|d| d.name == name).unwrap().cookbook_id;
    assert_eq!(link("iptables"), iptables.id);
    assert_eq!(link("logrotate"), None);

    // Parent cookbook carries the published maintainer, in memory and on disk
    assert_eq!(apache2.maintainer, "Maintainer of 1.0.0");
    let stored = Cookbook::find_by_name(&conn, "apache2").unwrap().unwrap();
    assert_eq!(stored.maintainer, "Maintainer of 1.0.0");
    assert_eq!(stored.description, "Apache web server, release 1.0.0");

    assert_eq!(
        notifier.notices(),
        vec![PublishNotice {
            cookbook_id: apache2.id.unwrap(),
            cookbook: "apache2".to_string(),
            version: "1.0.0".to_string(),
        }]
    );
}

#[test]
fn test_duplicate_version_conflicts_and_changes_nothing() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    let mut apache2 = register(&mut conn, "apache2");
    let notifier = RecordingNotifier::default();

    let first = metadata("1.0.0", &[("ubuntu", ">= 12.04")], &[("apt", ">= 1.0")]);
    publish_version(&mut conn, &mut apache2, &first, TARBALL, &readme(), &notifier).unwrap();

    let versions_before = row_count(&conn, "cookbook_versions");
    let platforms_before = row_count(&conn, "supported_platforms");
    let deps_before = row_count(&conn, "cookbook_dependencies");

    let mut again = metadata("1.0.0", &[("debian", ">= 7.0")], &[("yum", ">= 2.0")]);
    again.maintainer = "Someone Else".to_string();
    let err = publish_version(&mut conn, &mut apache2, &again, TARBALL, &readme(), &notifier)
        .unwrap_err();

    assert!(matches!(err, Error::PublishConflict(_)));
    assert_eq!(row_count(&conn, "cookbook_versions"), versions_before);
    assert_eq!(row_count(&conn, "supported_platforms"), platforms_before);
    assert_eq!(row_count(&conn, "cookbook_dependencies"), deps_before);
    assert_eq!(apache2.maintainer, "Maintainer of 1.0.0");
    let stored = Cookbook::find_by_name(&conn, "apache2").unwrap().unwrap();
    assert_eq!(stored.maintainer, "Maintainer of 1.0.0");

    // Only the committed publish was announced
    assert_eq!(notifier.notices().len(), 1);
}

#[test]
fn test_invalid_dependency_rolls_back_everything() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    let mut apache2 = register(&mut conn, "apache2");
    let original = apache2.clone();

    let versions_before = row_count(&conn, "cookbook_versions");
    let platforms_before = row_count(&conn, "supported_platforms");
    let deps_before = row_count(&conn, "cookbook_dependencies");

    // Dependencies are written in name order; the third one is malformed
    let meta = metadata(
        "2.0.0",
        &[("ubuntu", ">= 12.04")],
        &[
            ("apt", ">= 1.0"),
            ("build-essential", "~> 2.0"),
            ("zlib", "whatever works"),
        ],
    );
    let err = publish_version(
        &mut conn,
        &mut apache2,
        &meta,
        TARBALL,
        &readme(),
        &NoopNotifier,
    )
    .unwrap_err();

    assert!(matches!(err, Error::PublishValidationFailed { .. }));
    assert_eq!(row_count(&conn, "cookbook_versions"), versions_before);
    assert_eq!(row_count(&conn, "supported_platforms"), platforms_before);
    assert_eq!(row_count(&conn, "cookbook_dependencies"), deps_before);

    assert_eq!(apache2, original);
    let stored = Cookbook::find_by_name(&conn, "apache2").unwrap().unwrap();
    assert_eq!(stored.maintainer, original.maintainer);
    assert_eq!(stored.description, original.description);
    assert!(matches!(
        stored.get_version(&conn, "2_0_0"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_invalid_version_string_rejected() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    let mut apache2 = register(&mut conn, "apache2");

    let meta = metadata("1.0", &[], &[]);
    let err = publish_version(&mut conn, &mut apache2, &meta, TARBALL, &readme(), &NoopNotifier)
        .unwrap_err();
    assert!(matches!(err, Error::PublishValidationFailed { ref field, .. } if field == "version"));
    assert_eq!(row_count(&conn, "cookbook_versions"), 1);
}

#[test]
fn test_notification_failure_keeps_commit() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    let mut apache2 = register(&mut conn, "apache2");

    let meta = metadata("1.1.0", &[("ubuntu", ">= 14.04")], &[]);
    let version =
        publish_version(&mut conn, &mut apache2, &meta, TARBALL, &readme(), &FailingNotifier)
            .unwrap();

    assert_eq!(version.version, "1.1.0");
    assert_eq!(
        apache2.latest_version(&conn).unwrap().unwrap().version,
        "1.1.0"
    );
}

#[test]
fn test_version_tokens() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    let mut apache2 = register(&mut conn, "apache2");

    for v in ["2.0.1", "1.9.0"] {
        let meta = metadata(v, &[], &[]);
        publish_version(&mut conn, &mut apache2, &meta, TARBALL, &readme(), &NoopNotifier)
            .unwrap();
    }

    assert_eq!(apache2.get_version(&conn, "2_0_1").unwrap().version, "2.0.1");
    assert_eq!(apache2.get_version(&conn, "2.0.1").unwrap().version, "2.0.1");
    // Latest means most recently published, not highest
    assert_eq!(apache2.get_version(&conn, "latest").unwrap().version, "1.9.0");
    assert!(matches!(
        apache2.get_version(&conn, "9_9_9"),
        Err(Error::NotFound(_))
    ));

    let versions: Vec<String> = apache2
        .versions(&conn)
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec!["1.9.0", "2.0.1", "0.1.0"]);
}

#[test]
fn test_create_cookbook_name_conflict_is_case_insensitive() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    register(&mut conn, "apache2");

    let mut shadow = Cookbook::new("Apache2", "Mallory", "Lookalike");
    let meta = metadata("0.1.0", &[("ubuntu", ">= 12.04")], &[]);
    let err = larder::create_cookbook(
        &mut conn,
        &mut shadow,
        &meta,
        TARBALL,
        &readme(),
        &NoopNotifier,
    )
    .unwrap_err();

    assert!(matches!(err, Error::PublishConflict(_)));
    assert!(shadow.id.is_none());
    assert_eq!(row_count(&conn, "cookbooks"), 1);
    assert_eq!(row_count(&conn, "cookbook_versions"), 1);
    assert_eq!(row_count(&conn, "supported_platforms"), 0);
}

#[test]
fn test_dependency_links_are_not_backfilled() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    let mut apache2 = register(&mut conn, "apache2");

    let meta = metadata("1.0.0", &[], &[("nginx", ">= 1.0")]);
    let version =
        publish_version(&mut conn, &mut apache2, &meta, TARBALL, &readme(), &NoopNotifier)
            .unwrap();

    register(&mut conn, "nginx");

    let deps = version.dependencies(&conn).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].cookbook_id, None);

    let dependents = CookbookDependency::find_dependents(&conn, "nginx").unwrap();
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0].cookbook_version_id, version.id.unwrap());
}

#[test]
fn test_concurrent_duplicate_publish_has_one_winner() {
    let (_dir, db_path) = setup_db();
    {
        let mut conn = db::open(&db_path).unwrap();
        register(&mut conn, "apache2");
    }

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let db_path = db_path.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let mut conn = db::open(&db_path).unwrap();
                let mut cookbook = Cookbook::find_by_name(&conn, "apache2").unwrap().unwrap();
                let meta = metadata("3.0.0", &[("ubuntu", ">= 12.04")], &[]);
                barrier.wait();
                publish_version(
                    &mut conn,
                    &mut cookbook,
                    &meta,
                    &format!("https://artifacts.example.com/apache2-{i}.tgz"),
                    &readme(),
                    &NoopNotifier,
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::PublishConflict(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 1);

    let conn = db::open(&db_path).unwrap();
    assert_eq!(row_count(&conn, "supported_platforms"), 1);
}

#[test]
fn test_publish_keeps_columns_changed_by_other_writers() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    register(&mut conn, "apache2");

    // Loaded before someone else edits the cookbook
    let mut stale = Cookbook::find_by_name(&conn, "apache2").unwrap().unwrap();
    {
        let other = db::open(&db_path).unwrap();
        other
            .execute(
                "UPDATE cookbooks SET source_url = ?1, category = 'Web Servers' WHERE name = 'apache2'",
                ["https://github.com/example/apache2"],
            )
            .unwrap();
    }

    let meta = metadata("1.2.0", &[("ubuntu", ">= 14.04")], &[]);
    publish_version(&mut conn, &mut stale, &meta, TARBALL, &readme(), &NoopNotifier).unwrap();

    let stored = Cookbook::find_by_name(&conn, "apache2").unwrap().unwrap();
    assert_eq!(
        stored.source_url.as_deref(),
        Some("https://github.com/example/apache2")
    );
    assert_eq!(stored.category.as_deref(), Some("Web Servers"));
    assert_eq!(stored.maintainer, "Maintainer of 1.2.0");
    assert_eq!(stale.maintainer, "Maintainer of 1.2.0");
}

#[test]
fn test_publish_to_deleted_cookbook_is_not_found() {
    let (_dir, db_path) = setup_db();
    let mut conn = db::open(&db_path).unwrap();
    let mut apache2 = register(&mut conn, "apache2");
    let original = apache2.clone();

    Cookbook::delete(&conn, apache2.id.unwrap()).unwrap();

    let meta = metadata("1.0.0", &[("ubuntu", ">= 12.04")], &[]);
    let err = publish_version(&mut conn, &mut apache2, &meta, TARBALL, &readme(), &NoopNotifier)
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(apache2, original);
    assert_eq!(row_count(&conn, "cookbook_versions"), 0);
    assert_eq!(row_count(&conn, "supported_platforms"), 0);
}
