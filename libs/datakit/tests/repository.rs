#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Rejected, RecordingDriver, engine_with, record};
use datakit::metadata::{FieldDefinition, ObjectDefinition};
use datakit::query::{Condition, Filters, Query};
use datakit::{BoxError, EngineError, FindOne, HookName, Lookup, SecurityContext};
use serde_json::json;

fn user(id: &str) -> SecurityContext {
    SecurityContext::builder().user_id(id).build()
}

#[tokio::test]
async fn create_fills_bookkeeping_without_overwriting() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    let ctx = engine.create_context(
        SecurityContext::builder()
            .user_id("u1")
            .space_id("space-A")
            .build(),
    );
    let todo = ctx.object("todo");

    let created = todo.create(record(json!({"title": "Buy milk"}))).await.unwrap();
    assert_eq!(created["title"], json!("Buy milk"));
    assert_eq!(created["created_by"], json!("u1"));
    assert_eq!(created["space_id"], json!("space-A"));
    assert!(created.contains_key("_id"));

    let explicit = todo
        .create(record(json!({"title": "Imported", "created_by": "legacy"})))
        .await
        .unwrap();
    assert_eq!(explicit["created_by"], json!("legacy"));

    // Bookkeeping reaches the driver, not only the returned value.
    let payloads = driver.created.lock().clone();
    assert_eq!(payloads[0]["created_by"], json!("u1"));
    assert_eq!(payloads[1]["created_by"], json!("legacy"));
}

#[tokio::test]
async fn before_create_mutation_reaches_driver_and_caller() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    let after_calls = Arc::new(AtomicUsize::new(0));

    engine.on("todo", HookName::BeforeCreate, |hook| {
        let doc = hook.doc_mut().unwrap();
        let title = doc["title"].as_str().unwrap_or_default().to_owned();
        doc.insert("title".to_owned(), json!(format!("{title} (checked)")));
        Ok(())
    });
    let calls = Arc::clone(&after_calls);
    engine.on("todo", HookName::AfterCreate, move |hook| {
        assert!(hook.doc().unwrap().contains_key("_id"));
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let created = engine
        .create_context(user("u1"))
        .object("todo")
        .create(record(json!({"title": "Test hooks"})))
        .await
        .unwrap();

    assert_eq!(created["title"], json!("Test hooks (checked)"));
    assert_eq!(driver.created.lock()[0]["title"], json!("Test hooks (checked)"));
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn listeners_run_in_registration_order() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);

    engine.on("todo", HookName::BeforeCreate, |hook| {
        hook.doc_mut().unwrap().insert("trail".to_owned(), json!("a"));
        Ok(())
    });
    engine.on("todo", HookName::BeforeCreate, |hook| {
        let doc = hook.doc_mut().unwrap();
        let trail = format!("{}b", doc["trail"].as_str().unwrap());
        doc.insert("trail".to_owned(), json!(trail));
        Ok(())
    });

    let created = engine
        .create_context(user("u1"))
        .object("todo")
        .create(record(json!({"title": "x"})))
        .await
        .unwrap();

    assert_eq!(created["trail"], json!("ab"));
}

#[tokio::test]
async fn failing_before_listener_aborts_before_the_driver() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    engine.on("todo", HookName::BeforeCreate, |_| Err("title is required".into()));

    let err = engine
        .create_context(user("u1"))
        .object("todo")
        .create(record(json!({})))
        .await
        .unwrap_err();

    match err {
        EngineError::Listener { object, hook, source } => {
            assert_eq!(object, "todo");
            assert_eq!(hook, HookName::BeforeCreate);
            assert_eq!(source.to_string(), "title is required");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(driver.created.lock().is_empty());
}

#[tokio::test]
async fn failing_after_listener_reports_an_error_after_the_write() {
    let driver = Arc::new(RecordingDriver::transactional());
    let engine = engine_with(&driver);
    engine.on("todo", HookName::AfterCreate, |_| Err("notify failed".into()));
    let ctx = engine.create_context(user("u1"));

    let err = ctx
        .object("todo")
        .create(record(json!({"title": "kept"})))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Listener { hook: HookName::AfterCreate, .. }));
    assert_eq!(driver.created.lock().len(), 1);
    assert_eq!(driver.rows("todo").len(), 1);
    assert_eq!(driver.rollbacks(), 0);

    let err = ctx
        .transaction(|tx| async move {
            tx.object("todo")
                .create(record(json!({"title": "undone"})))
                .await
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Listener { hook: HookName::AfterCreate, .. }));
    assert_eq!(driver.created.lock().len(), 2);
    assert_eq!((driver.begins(), driver.commits(), driver.rollbacks()), (1, 0, 1));
}

#[tokio::test]
async fn ignore_triggers_skips_every_listener() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    engine.on("todo", HookName::BeforeCreate, |_| Err("should not run".into()));

    let ctx = engine.create_context(user("u1")).without_triggers();
    let created = ctx.object("todo").create(record(json!({"title": "x"}))).await;

    assert!(created.is_ok());
}

#[tokio::test]
async fn unknown_object_fails_on_first_use() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    let repo = engine.create_context(user("u1")).object("ghost");

    assert_eq!(repo.name(), "ghost");
    let err = repo.find(&Query::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::ObjectNotFound { ref name } if name == "ghost"));
}

#[tokio::test]
async fn missing_datasource_is_reported() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    engine.register_object(ObjectDefinition::new("audit").datasource("archive"));

    let err = engine
        .create_context(user("u1"))
        .object("audit")
        .count(&Filters::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::DatasourceNotFound { ref name } if name == "archive"));
}

#[tokio::test]
async fn driver_errors_surface_unchanged() {
    let driver = Arc::new(RecordingDriver {
        reject_title: Some("forbidden".to_owned()),
        ..RecordingDriver::default()
    });
    let engine = engine_with(&driver);

    let err = engine
        .create_context(user("u1"))
        .object("todo")
        .create(record(json!({"title": "forbidden"})))
        .await
        .unwrap_err();

    let rejected = err.as_driver_error().unwrap().downcast_ref::<Rejected>().unwrap();
    assert_eq!(rejected.0, "forbidden");
}

fn seed_owned_rows(driver: &RecordingDriver) {
    driver.insert("todo", json!({"_id": "1", "title": "mine", "owner": "u1"}));
    driver.insert("todo", json!({"_id": "2", "title": "theirs", "owner": "u2"}));
    driver.insert("todo", json!({"_id": "3", "title": "also mine", "owner": "u1"}));
}

fn restrict_to_owner(engine: &datakit::Engine) {
    engine.on("todo", HookName::BeforeFind, |hook| {
        if let Some(user) = hook.context().user_id().map(ToOwned::to_owned) {
            hook.restrict(Condition::eq("owner", user));
        }
        Ok(())
    });
}

#[tokio::test]
async fn restriction_limits_find_unless_system() {
    let driver = Arc::new(RecordingDriver::default());
    seed_owned_rows(&driver);
    let engine = engine_with(&driver);
    restrict_to_owner(&engine);

    let ctx = engine.create_context(user("u1"));
    let mine = ctx.object("todo").find(&Query::new()).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|r| r["owner"] == json!("u1")));

    let everything = ctx.sudo().object("todo").find(&Query::new()).await.unwrap();
    assert_eq!(everything.len(), 3);
    assert!(!ctx.is_system());
}

#[tokio::test]
async fn restriction_cannot_be_widened_by_caller_or_token() {
    let driver = Arc::new(RecordingDriver::default());
    seed_owned_rows(&driver);
    let engine = engine_with(&driver);
    restrict_to_owner(&engine);

    // A trailing "or" in the caller's filters must not apply to the restriction.
    let filters: Filters = serde_json::from_value(json!([["title", "=", "theirs"], "or"])).unwrap();
    let found = engine
        .create_context(user("u1"))
        .object("todo")
        .find(&Query::new().with_filters(filters))
        .await
        .unwrap();

    assert!(found.is_empty());
}

#[tokio::test]
async fn restriction_applies_to_count_and_find_one() {
    let driver = Arc::new(RecordingDriver::default());
    seed_owned_rows(&driver);
    let engine = engine_with(&driver);
    restrict_to_owner(&engine);
    let repo = engine.create_context(user("u1")).object("todo");

    assert_eq!(repo.count(&Filters::new()).await.unwrap(), 2);
    assert!(repo.find_one("2").await.unwrap().is_none());
    assert_eq!(repo.find_one("1").await.unwrap().unwrap()["title"], json!("mine"));

    // Restricted id lookups are sent as queries.
    assert!(driver.lookups.lock().iter().all(|l| matches!(l, Lookup::Query(_))));

    let system = engine.create_context(SecurityContext::system()).object("todo");
    assert!(system.find_one("2").await.unwrap().is_some());
    assert!(matches!(driver.lookups.lock().last(), Some(Lookup::Id(_))));
}

#[tokio::test]
async fn find_one_by_id_keeps_listener_changes_to_the_query() {
    let driver = Arc::new(RecordingDriver::default());
    seed_owned_rows(&driver);
    let engine = engine_with(&driver);
    let repo = engine.create_context(user("u1")).object("todo");

    assert!(repo.find_one("2").await.unwrap().is_some());
    assert!(matches!(driver.lookups.lock().last(), Some(Lookup::Id(_))));

    engine.on("todo", HookName::BeforeFind, |hook| {
        if let Some(query) = hook.query_mut() {
            query.fields = Some(vec!["title".to_owned()]);
        }
        Ok(())
    });

    let found = repo.find_one("2").await.unwrap().unwrap();
    assert_eq!(found, record(json!({"_id": "2", "title": "theirs"})));
    let Some(Lookup::Query(sent)) = driver.lookups.lock().last().cloned() else {
        panic!("expected a query lookup");
    };
    assert_eq!(sent.fields, Some(vec!["title".to_owned()]));
}

#[tokio::test]
async fn find_one_matches_numeric_ids_under_a_restriction() {
    let driver = Arc::new(RecordingDriver::default());
    driver.insert("todo", json!({"_id": 7, "title": "numbered", "owner": "u1"}));
    let engine = engine_with(&driver);
    restrict_to_owner(&engine);

    let found = engine
        .create_context(user("u1"))
        .object("todo")
        .find_one("7")
        .await
        .unwrap();

    assert_eq!(found.unwrap()["_id"], json!(7));
}

#[tokio::test]
async fn restriction_on_create_defaults_the_field() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    engine.on("todo", HookName::BeforeCreate, |hook| {
        if let Some(user) = hook.context().user_id().map(ToOwned::to_owned) {
            hook.restrict(Condition::eq("owner", user));
        }
        Ok(())
    });

    let repo = engine.create_context(user("u1")).object("todo");
    let defaulted = repo.create(record(json!({"title": "a"}))).await.unwrap();
    let explicit = repo
        .create(record(json!({"title": "b", "owner": "u9"})))
        .await
        .unwrap();

    assert_eq!(defaulted["owner"], json!("u1"));
    assert_eq!(explicit["owner"], json!("u9"));
}

#[tokio::test]
async fn find_one_by_query_takes_the_first_match() {
    let driver = Arc::new(RecordingDriver::default());
    seed_owned_rows(&driver);
    let engine = engine_with(&driver);
    let repo = engine.create_context(user("u1")).object("todo");

    let query = Query::new().filter(Condition::eq("owner", "u1"));
    let found = repo.find_one(FindOne::Query(query)).await.unwrap().unwrap();

    assert_eq!(found["_id"], json!("1"));
    let Some(Lookup::Query(sent)) = driver.lookups.lock().last().cloned() else {
        panic!("expected a query lookup");
    };
    assert_eq!(sent.limit, Some(1));
}

#[tokio::test]
async fn update_and_delete_run_their_hooks_with_the_id() {
    let driver = Arc::new(RecordingDriver::default());
    seed_owned_rows(&driver);
    let engine = engine_with(&driver);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for hook in [
        HookName::BeforeUpdate,
        HookName::AfterUpdate,
        HookName::BeforeDelete,
        HookName::AfterDelete,
    ] {
        let seen = Arc::clone(&seen);
        engine.on("todo", hook, move |h| {
            seen.lock().push((h.hook(), h.id().unwrap().to_string()));
            Ok(())
        });
    }

    let repo = engine.create_context(user("u7")).object("todo");
    let updated = repo
        .update("1", record(json!({"completed": true})))
        .await
        .unwrap();
    repo.delete("2").await.unwrap();

    assert_eq!(updated["completed"], json!(true));
    assert_eq!(updated["updated_by"], json!("u7"));
    assert_eq!(
        *seen.lock(),
        vec![
            (HookName::BeforeUpdate, "1".to_owned()),
            (HookName::AfterUpdate, "1".to_owned()),
            (HookName::BeforeDelete, "2".to_owned()),
            (HookName::AfterDelete, "2".to_owned()),
        ]
    );
    assert_eq!(driver.rows("todo").len(), 2);
}

#[tokio::test]
async fn after_find_can_reshape_results() {
    let driver = Arc::new(RecordingDriver::default());
    seed_owned_rows(&driver);
    let engine = engine_with(&driver);
    engine.on("todo", HookName::AfterFind, |hook| {
        for row in hook.records_mut().unwrap() {
            row.remove("owner");
        }
        Ok(())
    });

    let rows = engine
        .create_context(user("u1"))
        .object("todo")
        .find(&Query::new())
        .await
        .unwrap();

    assert!(rows.iter().all(|r| !r.contains_key("owner")));
}

#[tokio::test]
async fn create_many_runs_hooks_per_record() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    engine.on("todo", HookName::AfterCreate, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let created = engine
        .create_context(user("u1"))
        .object("todo")
        .create_many(vec![record(json!({"title": "a"})), record(json!({"title": "b"}))])
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|r| r["created_by"] == json!("u1")));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expand_inlines_referenced_records() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    engine.register_object(ObjectDefinition::new("user"));
    engine.register_object(
        ObjectDefinition::new("task")
            .field("assignee", FieldDefinition::lookup("user"))
            .field("reviewer", FieldDefinition::lookup("auditor")),
    );
    driver.insert("user", json!({"_id": "u1", "name": "Ada"}));
    driver.insert("task", json!({"_id": "t1", "assignee": "u1"}));
    driver.insert("task", json!({"_id": "t2", "assignee": "u404"}));
    driver.insert("task", json!({"_id": "t3"}));

    let repo = engine.create_context(user("u1")).object("task");
    let rows = repo
        .find(&Query::new().sort(datakit::query::SortSpec::asc("_id")).expand("assignee"))
        .await
        .unwrap();

    assert_eq!(rows[0]["assignee"], json!({"_id": "u1", "name": "Ada"}));
    assert_eq!(rows[1]["assignee"], json!("u404"));
    assert!(!rows[2].contains_key("assignee"));

    let err = repo
        .find(&Query::new().expand("reviewer"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ObjectNotFound { ref name } if name == "auditor"));
}

#[tokio::test]
async fn actions_run_with_the_callers_context() {
    let driver = Arc::new(RecordingDriver::default());
    let engine = engine_with(&driver);
    engine.on_action("todo", "whoami", |ctx, params| async move {
        Ok::<_, BoxError>(json!({"user": ctx.user_id(), "echo": params}))
    });
    engine.on_action("todo", "explode", |_, _| async {
        Err::<serde_json::Value, BoxError>("boom".into())
    });

    let repo = engine.create_context(user("u1")).object("todo");
    let out = repo.execute_action("whoami", json!(42)).await.unwrap();
    assert_eq!(out, json!({"user": "u1", "echo": 42}));

    let missing = repo.execute_action("nope", json!(null)).await.unwrap_err();
    assert!(matches!(missing, EngineError::ActionNotFound { .. }));

    let failed = repo.execute_action("explode", json!(null)).await.unwrap_err();
    assert!(matches!(failed, EngineError::Action { ref action, .. } if action == "explode"));
}
