//! Integration tests for route resolution, redirects and URL generation

mod common;

use common::init_logging;
use futures::FutureExt;
use navigator_pipeline::plan::{build_navigation_plan, PlanOutcome};
use navigator_pipeline::*;
use std::rc::Rc;

fn router(routes: Vec<RouteConfig>) -> Router {
    init_logging();
    let router = Router::new(Rc::new(MemoryHistory::new()));
    router
        .configure(|config| {
            config.map_all(routes);
            Ok(())
        })
        .expect("routes are valid");
    router
}

#[tokio::test]
async fn test_redirect_carries_params_and_query() {
    let router = router(vec![
        RouteConfig::new("first/:id").name("a").redirect("second/:id"),
        RouteConfig::new("second/:id").name("b").module_id("second"),
    ]);

    let instruction = router
        .create_navigation_instruction("first/10?q=1", None)
        .await
        .unwrap();
    let outcome = build_navigation_plan(&instruction, false).await.unwrap();

    let redirect = outcome.redirect().expect("route redirects");
    assert_eq!(redirect.url(), "#/second/10?q=1");
    assert!(outcome.plan().is_none());
}

#[tokio::test]
async fn test_redirect_placeholder_without_original_value_fails() {
    let router = router(vec![
        RouteConfig::new("first/:id").name("a").redirect("second/:other"),
        RouteConfig::new("second/:other").name("b").module_id("second"),
    ]);

    let instruction = router.create_navigation_instruction("first/10", None).await.unwrap();
    let err = build_navigation_plan(&instruction, false).await.unwrap_err();
    assert!(matches!(err, RouterError::MissingRouteParam { ref param, .. } if param == "other"));
}

#[tokio::test]
async fn test_redirect_honours_instruction_options() {
    let router = router(vec![
        RouteConfig::new("first/:id").name("a").redirect("second/:id"),
        RouteConfig::new("second/:id").name("b").module_id("second"),
    ]);

    let instruction = NavigationInstruction::new(InstructionInit {
        fragment: "first/10".to_string(),
        params: RouteParams::new().with("id", "10"),
        config: router.routes().into_iter().next(),
        router: router.downgrade(),
        options: InstructionOptions {
            absolute: true,
            ..InstructionOptions::default()
        },
        ..InstructionInit::default()
    });
    let outcome = build_navigation_plan(&instruction, false).await.unwrap();
    assert_eq!(
        outcome.redirect().map(|redirect| redirect.url().to_string()),
        Some("http://localhost/#/second/10".to_string())
    );
}

#[tokio::test]
async fn test_redirect_to_static_route() {
    let router = router(vec![
        RouteConfig::new("").redirect("home"),
        RouteConfig::new("home").name("home").module_id("home"),
    ]);

    let instruction = router.create_navigation_instruction("", None).await.unwrap();
    match build_navigation_plan(&instruction, false).await.unwrap() {
        PlanOutcome::Redirect(redirect) => assert_eq!(redirect.url(), "#/home"),
        PlanOutcome::Plan(_) => panic!("expected a redirect"),
    }
}

#[tokio::test]
async fn test_first_navigation_replaces_every_viewport() {
    let router = router(vec![RouteConfig::new("split")
        .name("split")
        .view_port("left", ViewPortConfig::new("list"))
        .view_port("right", ViewPortConfig::new("detail"))]);

    let instruction = router.create_navigation_instruction("split", None).await.unwrap();
    let outcome = build_navigation_plan(&instruction, false).await.unwrap();
    let plan = outcome.plan().expect("plan");

    assert_eq!(plan.len(), 2);
    assert!(plan
        .values()
        .all(|view_port| view_port.strategy == ActivationStrategy::Replace));
    assert_eq!(plan["left"].config.module_id.as_deref(), Some("list"));
}

#[tokio::test]
async fn test_view_port_defaults_fill_empty_modules() {
    let router = router(vec![RouteConfig::new("page")
        .name("page")
        .module_id("page")
        .view_port("sidebar", ViewPortConfig::empty())]);
    router.use_view_port_defaults([("sidebar".to_string(), ViewPortConfig::new("default-sidebar"))]);

    let instruction = router.create_navigation_instruction("page", None).await.unwrap();
    let outcome = build_navigation_plan(&instruction, false).await.unwrap();
    let plan = outcome.plan().expect("plan");
    assert_eq!(plan["sidebar"].config.module_id.as_deref(), Some("default-sidebar"));
}

#[test]
fn test_generate_round_trips_through_recognition() {
    let router = router(vec![
        RouteConfig::new("users/:id/posts/:post").name("post").module_id("post"),
        RouteConfig::new("files/*path").name("files").module_id("files"),
    ]);

    let href = router
        .generate("post", &RouteParams::new().with("id", "3").with("post", "9"))
        .unwrap();
    assert_eq!(href, "#/users/3/posts/9");

    let instruction =
        pollster::block_on(router.create_navigation_instruction(&url::fragment_of(&href), None)).unwrap();
    assert_eq!(instruction.config().name.as_deref(), Some("post"));
    assert_eq!(instruction.params().get("id"), Some("3"));
    assert_eq!(instruction.params().get("post"), Some("9"));

    let files = router
        .generate("files", &RouteParams::new().with("path", "a/b.txt"))
        .unwrap();
    let instruction =
        pollster::block_on(router.create_navigation_instruction(&url::fragment_of(&files), None)).unwrap();
    assert_eq!(instruction.params().get("path"), Some("a/b.txt"));
}

#[test]
fn test_generate_with_push_state() {
    let router = Router::new(Rc::new(MemoryHistory::new().with_push_state(true)));
    router
        .configure(|config| {
            config.map(RouteConfig::new("about").name("about").module_id("about"));
            Ok(())
        })
        .unwrap();

    assert_eq!(router.generate("about", &RouteParams::new()).unwrap(), "/about");
}

#[test]
fn test_missing_param_fails_generation() {
    let router = router(vec![RouteConfig::new("users/:id").name("user").module_id("user")]);
    let err = router.generate("user", &RouteParams::new()).unwrap_err();
    assert!(matches!(err, RouterError::MissingRouteParam { .. }));
}

#[test]
fn test_dynamic_nav_route_without_href_is_rejected() {
    init_logging();
    let err = Router::new(Rc::new(MemoryHistory::new()))
        .configure(|config| {
            config.map(RouteConfig::new("users/:id").module_id("user").nav(true));
            Ok(())
        })
        .unwrap_err();

    match err {
        RouterError::InvalidRouteConfig { route, message } => {
            assert_eq!(route, "users/:id");
            assert!(message.contains("href"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_alias_routes_resolve_to_one_nav_entry() {
    let router = router(vec![RouteConfig::new("home")
        .alias("")
        .name("home")
        .module_id("home")
        .nav(true)
        .title("Home")]);

    let from_alias = pollster::block_on(router.create_navigation_instruction("", None)).unwrap();
    let direct = pollster::block_on(router.create_navigation_instruction("home", None)).unwrap();

    let alias_nav = from_alias.config().nav_model().cloned().unwrap();
    let direct_nav = direct.config().nav_model().cloned().unwrap();
    assert!(Rc::ptr_eq(&alias_nav, &direct_nav));
    assert_eq!(router.navigation().len(), 1);
    assert_eq!(alias_nav.title().as_deref(), Some("Home"));
}

#[test]
fn test_unknown_route_resolver() {
    let router = router(vec![RouteConfig::new("").module_id("home")]);
    router
        .handle_unknown_routes(UnknownRouteHandler::resolver(|instruction| {
            let module = format!("missing-{}", instruction.params().get("path").unwrap_or_default());
            async move { Ok::<_, RouterError>(RouteConfig::default().module_id(module)) }.boxed_local()
        }))
        .unwrap();

    let instruction = pollster::block_on(router.create_navigation_instruction("gone", None)).unwrap();
    assert_eq!(instruction.config().module_id.as_deref(), Some("missing-gone"));
    assert_eq!(instruction.config().route, "gone");
}
