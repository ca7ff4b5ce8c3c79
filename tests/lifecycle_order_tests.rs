//! Integration tests for activation planning and lifecycle hook order

mod common;

use common::*;
use navigator_pipeline::*;
use std::rc::Rc;

fn root_strategy(app: &TestApp) -> Option<ActivationStrategy> {
    app.app
        .current_instruction()
        .and_then(|instruction| instruction.view_port_instruction("default"))
        .map(|view_port| view_port.strategy)
}

#[tokio::test]
async fn test_hooks_run_outside_in_and_inside_out() {
    let app = TestApp::new(vec![
        RouteConfig::new("parent").name("parent").module_id("parent"),
        RouteConfig::new("b").name("b").module_id("b"),
    ]);
    app.loader.set_behaviour(
        "parent",
        PageBehaviour::hosting(vec![RouteConfig::new("").name("child").module_id("child")]),
    );

    assert!(app.app.load_url("parent").await.completed);
    assert_eq!(
        calls_with_prefix(&app.log, "can_activate"),
        vec!["can_activate:parent", "can_activate:child"]
    );
    assert_eq!(
        calls_with_prefix(&app.log, "activate:"),
        vec!["activate:parent", "activate:child"]
    );
    app.clear_log();

    assert!(app.app.load_url("b").await.completed);
    assert_eq!(
        calls_with_prefix(&app.log, "can_deactivate"),
        vec!["can_deactivate:child", "can_deactivate:parent"]
    );
    assert_eq!(
        calls_with_prefix(&app.log, "deactivate:"),
        vec!["deactivate:child", "deactivate:parent"]
    );
    assert_eq!(app.current_module().as_deref(), Some("b"));
}

#[tokio::test]
async fn test_swaps_wait_for_every_viewport() {
    let app = TestApp::new(vec![RouteConfig::new("split")
        .name("split")
        .view_port("left", ViewPortConfig::new("list"))
        .view_port("right", ViewPortConfig::new("detail"))]);
    for name in ["left", "right"] {
        app.app
            .router()
            .register_view_port(name, Rc::new(TestViewPort::new(name, &app.log)));
    }

    assert!(app.app.load_url("split").await.completed);

    let log = app.log.borrow().clone();
    let position = |entry: &str| log.iter().position(|call| call == entry).unwrap();
    let last_process = position("process:left:list").max(position("process:right:detail"));
    let first_swap = position("swap:left:list").min(position("swap:right:detail"));
    assert!(last_process < first_swap, "swapped before every viewport processed: {log:?}");
    assert_eq!(calls_with_prefix(&app.log, "swap:").len(), 2);
}

#[tokio::test]
async fn test_module_change_replaces_in_pipeline_order() {
    let app = TestApp::new(vec![
        RouteConfig::new("a").name("a").module_id("a"),
        RouteConfig::new("b").name("b").module_id("b"),
    ]);

    assert!(app.app.load_url("a").await.completed);
    app.clear_log();
    assert!(app.app.load_url("b").await.completed);

    assert_eq!(
        app.log.borrow().clone(),
        vec![
            "can_deactivate:a",
            "can_activate:b",
            "deactivate:a",
            "activate:b",
            "process:default:b",
            "swap:default:b"
        ]
    );
    assert_eq!(root_strategy(&app), Some(ActivationStrategy::Replace));
}

#[tokio::test]
async fn test_same_url_changes_nothing() {
    let app = TestApp::new(vec![RouteConfig::new("a").name("a").module_id("a")]);

    assert!(app.app.load_url("a").await.completed);
    app.clear_log();

    let result = app.app.load_url("a").await;
    assert!(result.completed);
    assert!(app.log.borrow().is_empty());
    assert_eq!(app.loader.loaded(), vec!["a"]);
    assert_eq!(root_strategy(&app), Some(ActivationStrategy::NoChange));
}

#[tokio::test]
async fn test_param_change_reruns_the_lifecycle() {
    let app = TestApp::new(vec![RouteConfig::new("users/:id").name("user").module_id("user")]);

    assert!(app.app.load_url("users/1").await.completed);
    app.clear_log();
    assert!(app.app.load_url("users/2").await.completed);

    assert_eq!(
        app.log.borrow().clone(),
        vec![
            "can_deactivate:user",
            "can_activate:user",
            "deactivate:user",
            "activate:user",
            "activate_id:user:2"
        ]
    );
    assert_eq!(app.loader.loaded(), vec!["user"]);
    assert_eq!(root_strategy(&app), Some(ActivationStrategy::InvokeLifecycle));
}

#[tokio::test]
async fn test_view_model_can_force_replace() {
    let app = TestApp::new(vec![RouteConfig::new("a").name("a").module_id("a")]);
    app.loader.set_behaviour(
        "a",
        PageBehaviour {
            strategy: Some(ActivationStrategy::Replace),
            ..PageBehaviour::default()
        },
    );

    assert!(app.app.load_url("a").await.completed);
    assert!(app.app.load_url("a").await.completed);

    assert_eq!(app.loader.loaded(), vec!["a", "a"]);
    assert_eq!(root_strategy(&app), Some(ActivationStrategy::Replace));
}

#[tokio::test]
async fn test_route_activation_strategy() {
    let app = TestApp::new(vec![RouteConfig::new("a")
        .name("a")
        .module_id("a")
        .activation_strategy(ActivationStrategy::InvokeLifecycle)]);

    assert!(app.app.load_url("a").await.completed);
    app.clear_log();
    assert!(app.app.load_url("a").await.completed);

    assert_eq!(calls_with_prefix(&app.log, "activate:"), vec!["activate:a"]);
    assert_eq!(app.loader.loaded(), vec!["a"]);
}

#[tokio::test]
async fn test_query_changes_only_count_when_compared() {
    let ignoring = TestApp::new(vec![RouteConfig::new("list").name("list").module_id("list")]);
    assert!(ignoring.app.load_url("list?page=1").await.completed);
    assert!(ignoring.app.load_url("list?page=2").await.completed);
    assert_eq!(root_strategy(&ignoring), Some(ActivationStrategy::NoChange));

    let comparing = TestApp::configured(|config| {
        config
            .options(RouterOptions {
                compare_query_params: true,
            })
            .map(RouteConfig::new("list").name("list").module_id("list"));
    });
    assert!(comparing.app.load_url("list?page=1").await.completed);
    assert!(comparing.app.load_url("list?page=2").await.completed);
    assert_eq!(root_strategy(&comparing), Some(ActivationStrategy::InvokeLifecycle));

    let current = comparing.app.current_instruction().unwrap();
    assert_eq!(current.query_params().get("page"), Some("2"));
}

#[tokio::test]
async fn test_unchanged_parent_still_plans_its_child() {
    let app = TestApp::new(vec![RouteConfig::new("parent").name("parent").module_id("parent")]);
    app.loader.set_behaviour(
        "parent",
        PageBehaviour::hosting(vec![
            RouteConfig::new(":id").name("item").module_id("item"),
        ]),
    );

    assert!(app.app.load_url("parent/1").await.completed);
    app.clear_log();
    assert!(app.app.load_url("parent/2").await.completed);

    assert_eq!(root_strategy(&app), Some(ActivationStrategy::NoChange));
    assert_eq!(
        calls_with_prefix(&app.log, "activate"),
        vec!["activate:item", "activate_id:item:2"]
    );
    assert_eq!(app.loader.loaded(), vec!["parent", "item"]);
}
