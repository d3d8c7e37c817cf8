//! Nesting, ordering and disposal behaviour of intercept sessions

mod common;

use common::test_context::TestContext;
use common::test_util::{init_tracing, new_sink};
use console_intercept::{InterceptError, Sink, begin_intercept, print, println};
use std::sync::Arc;

#[test]
fn topmost_sink_captures_only_inside_session() -> anyhow::Result<()> {
    init_tracing();
    let given_log_text = "Show me";

    print!("realconsole before");
    let topmost = new_sink();
    {
        let _session = begin_intercept(topmost.clone())?;
        print!("{}", given_log_text);
    }
    print!("realconsole after");

    assert_eq!(topmost.contents(), given_log_text);
    Ok(())
}

#[test]
fn topmost_sink_captures_nested_sessions_too() -> anyhow::Result<()> {
    init_tracing();
    let topmost = new_sink();
    let nested = new_sink();

    print!("realconsole before");
    {
        let _outer = begin_intercept(topmost.clone())?;
        print!("Show me 1");
        {
            let _inner = begin_intercept(nested.clone())?;
            print!("Show me 2");
        }
    }
    print!("realconsole after");

    assert_eq!(topmost.contents(), "Show me 1Show me 2");
    assert_eq!(nested.contents(), "Show me 2");
    Ok(())
}

#[test]
fn second_toplevel_session_captures_only_its_own_block() -> anyhow::Result<()> {
    init_tracing();
    let first = new_sink();
    let second = new_sink();

    {
        let _session = begin_intercept(first.clone())?;
        print!("Show me 1");
    }
    {
        let _session = begin_intercept(second.clone())?;
        print!("Show me 2");
    }

    assert_eq!(first.contents(), "Show me 1");
    assert_eq!(second.contents(), "Show me 2");
    Ok(())
}

#[test]
fn capture_is_visible_before_session_ends() -> anyhow::Result<()> {
    init_tracing();
    let sink = new_sink();
    let session = begin_intercept(sink.clone())?;

    println!("Show me 1");
    assert_eq!(sink.contents(), "Show me 1\n");

    session.dispose()?;
    Ok(())
}

#[test]
fn nested_sessions_all_receive_writes_in_order() {
    let ctx = TestContext::new();
    let sinks: Vec<_> = (0..4).map(|_| new_sink()).collect();
    let mut sessions = Vec::new();

    for (depth, sink) in sinks.iter().enumerate() {
        sessions.push(ctx.router.begin_intercept(sink.clone()).unwrap());
        ctx.write(&format!("<{}>", depth));
    }
    ctx.write("end");

    while let Some(session) = sessions.pop() {
        session.dispose().unwrap();
    }

    assert_eq!(sinks[0].contents(), "<0><1><2><3>end");
    assert_eq!(sinks[1].contents(), "<1><2><3>end");
    assert_eq!(sinks[2].contents(), "<2><3>end");
    assert_eq!(sinks[3].contents(), "<3>end");
    assert_eq!(ctx.original_content(), "<0><1><2><3>end");
}

#[test]
fn nested_scenario_outer_sees_both_inner_sees_one() {
    let ctx = TestContext::new();
    let s1 = new_sink();
    let s2 = new_sink();

    let outer = ctx.router.begin_intercept(s1.clone()).unwrap();
    ctx.write("a");
    let inner = ctx.router.begin_intercept(s2.clone()).unwrap();
    ctx.write("b");
    inner.dispose().unwrap();
    outer.dispose().unwrap();

    assert_eq!(s1.contents(), "ab");
    assert_eq!(s2.contents(), "b");
}

#[test]
fn ending_outermost_session_restores_original_only() {
    let ctx = TestContext::new();
    let s1 = new_sink();

    assert!(!ctx.router.is_installed());
    let session = ctx.router.begin_intercept(s1.clone()).unwrap();
    assert!(ctx.router.is_installed(), "Router should install lazily");
    ctx.write("1");
    session.dispose().unwrap();
    assert!(!ctx.router.is_installed(), "Router should uninstall");
    ctx.write("2");

    assert_eq!(ctx.original_content(), "12");
    assert_eq!(s1.contents(), "1");
    assert_eq!(ctx.router.active_contexts(), 0);
    assert_eq!(ctx.router.current_context(), None);
}

#[test]
fn beginning_with_same_sink_twice_fails() {
    init_tracing();
    let sink = new_sink();

    let _outer = begin_intercept(sink.clone()).unwrap();
    let result = begin_intercept(sink.clone());

    assert_eq!(result.err(), Some(InterceptError::DuplicateSink));
}

#[test]
fn duplicate_check_uses_identity_not_content() {
    let ctx = TestContext::new();
    let first = new_sink();
    let second = new_sink();

    let _outer = ctx.router.begin_intercept(first.clone()).unwrap();
    let inner = ctx.router.begin_intercept(second.clone());

    assert!(inner.is_ok(), "Equal but distinct sinks should both be accepted");
}

#[test]
fn original_destination_cannot_be_intercepted_into() {
    let ctx = TestContext::new();
    let original: Arc<dyn Sink> = ctx.original.clone();

    let result = ctx.router.begin_intercept(original);

    assert_eq!(result.err(), Some(InterceptError::DuplicateSink));
    assert!(!ctx.router.is_installed());
}

#[test]
fn sink_can_be_reused_after_its_session_ended() {
    let ctx = TestContext::new();
    let sink = new_sink();

    ctx.router
        .begin_intercept(sink.clone())
        .unwrap()
        .dispose()
        .unwrap();
    let session = ctx.router.begin_intercept(sink.clone()).unwrap();
    ctx.write("again");
    session.dispose().unwrap();

    assert_eq!(sink.contents(), "again");
}

#[test]
fn disposing_out_of_order_fails() {
    init_tracing();
    let scope1 = begin_intercept(new_sink()).unwrap();
    let scope2 = begin_intercept(new_sink()).unwrap();

    let result = scope1.dispose();

    assert_eq!(
        result,
        Err(InterceptError::OutOfOrderDispose {
            context: scope1.context()
        })
    );
    assert!(!scope1.is_disposed(), "Failed dispose should leave the session active");

    scope2.dispose().unwrap();
    scope1.dispose().unwrap();
}

#[test]
fn out_of_order_attempt_does_not_disturb_routing() {
    let ctx = TestContext::new();
    let outer_sink = new_sink();
    let inner_sink = new_sink();

    let outer = ctx.router.begin_intercept(outer_sink.clone()).unwrap();
    let inner = ctx.router.begin_intercept(inner_sink.clone()).unwrap();
    assert!(outer.dispose().is_err());
    ctx.write("still both");
    inner.dispose().unwrap();
    ctx.write(" outer");
    outer.dispose().unwrap();

    assert_eq!(outer_sink.contents(), "still both outer");
    assert_eq!(inner_sink.contents(), "still both");
}

#[test]
fn disposing_twice_is_a_noop() {
    let ctx = TestContext::new();
    let sink = new_sink();

    let session = ctx.router.begin_intercept(sink.clone()).unwrap();
    assert!(session.dispose().is_ok());
    assert!(session.dispose().is_ok());
    assert!(session.is_disposed());

    let outer = ctx.router.begin_intercept(new_sink()).unwrap();
    let inner = ctx.router.begin_intercept(new_sink()).unwrap();
    inner.dispose().unwrap();
    inner.dispose().unwrap();
    outer.dispose().unwrap();
}

#[test]
fn nested_sessions_share_one_context_id() {
    let ctx = TestContext::new();

    let outer = ctx.router.begin_intercept(new_sink()).unwrap();
    let inner = ctx.router.begin_intercept(new_sink()).unwrap();
    let retired = outer.context();

    assert_eq!(inner.context(), retired);
    assert_eq!(ctx.router.current_context(), Some(retired));
    assert_eq!(ctx.router.active_contexts(), 1);

    drop(inner);
    drop(outer);
    assert_eq!(ctx.router.current_context(), None);

    let next = ctx.router.begin_intercept(new_sink()).unwrap();
    assert!(
        next.context() > retired,
        "Retired context ids are not reused"
    );
}

#[test]
fn sessions_dropped_as_struct_fields_end_both_captures() {
    struct Pair {
        _outer: console_intercept::Session,
        _inner: console_intercept::Session,
    }

    let ctx = TestContext::new();
    let outer_sink = new_sink();
    let inner_sink = new_sink();

    let pair = Pair {
        _outer: ctx.router.begin_intercept(outer_sink.clone()).unwrap(),
        _inner: ctx.router.begin_intercept(inner_sink.clone()).unwrap(),
    };
    ctx.write("inside");
    // fields drop in declaration order, so the outer session goes first
    drop(pair);
    ctx.write(" after");

    assert_eq!(outer_sink.contents(), "inside");
    assert_eq!(inner_sink.contents(), "inside");
    assert!(!ctx.router.is_installed());
    assert_eq!(ctx.router.active_contexts(), 0);
    assert_eq!(ctx.router.current_context(), None);

    let reused = ctx.router.begin_intercept(outer_sink.clone()).unwrap();
    ctx.write(" again");
    reused.dispose().unwrap();
    assert_eq!(outer_sink.contents(), "inside again");
}
