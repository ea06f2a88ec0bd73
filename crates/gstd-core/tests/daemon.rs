// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! End-to-end command tests against the simulated engine.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use gstd_core::engine::sim::SimEngine;
use gstd_core::Daemon;
use gstd_proto::{Payload, ReturnCode};
use serde_json::json;

const SIGNAL: &str = "/pipelines/p0/elements/id/signals/handoff";

fn daemon() -> Arc<Daemon> {
    Arc::new(Daemon::new(Arc::new(SimEngine::with_tick(
        Duration::from_millis(5),
    ))))
}

fn ok(d: &Daemon, line: &str) -> Option<Payload> {
    let resp = d.execute(line);
    assert_eq!(resp.code, ReturnCode::Ok, "{line}: {resp:?}");
    resp.response
}

fn code(d: &Daemon, line: &str) -> ReturnCode {
    d.execute(line).code
}

#[test]
fn create_then_read_reflects_arguments() -> Result<()> {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc ! identity name=id ! fakesink");
    let list = ok(&d, "read /pipelines").context("list payload")?;
    assert_eq!(list.as_list().context("list")?, ["p0".to_string()]);

    let info = ok(&d, "read /pipelines/p0").context("info payload")?;
    let info = info.as_object().context("object")?;
    assert_eq!(info["name"], json!("p0"));
    assert_eq!(info["description"], json!("videotestsrc ! identity name=id ! fakesink"));
    assert_eq!(info["state"], json!("null"));

    let elements = ok(&d, "read /pipelines/p0/elements").context("elements")?;
    assert_eq!(
        elements.as_list().context("list")?,
        ["videotestsrc0".to_string(), "id".to_string(), "fakesink0".to_string()]
    );
    let element = ok(&d, "read /pipelines/p0/elements/id").context("element")?;
    assert_eq!(element.as_object().context("object")?["factory"], json!("identity"));

    assert_eq!(
        code(&d, "create /pipelines p0 fakesink"),
        ReturnCode::AlreadyExists
    );
    assert_eq!(code(&d, "create /pipelines p1"), ReturnCode::NullArgument);
    assert_eq!(code(&d, "create /pipelines p1 nope"), ReturnCode::BadValue);
    Ok(())
}

#[test]
fn element_names_that_break_paths_are_refused() -> Result<()> {
    let d = daemon();
    for line in [
        "create /pipelines p0 identity name=a/b ! fakesink",
        r#"create /pipelines p0 identity name="a b" ! fakesink"#,
        "create /pipelines p0 identity name= ! fakesink",
    ] {
        assert_eq!(code(&d, line), ReturnCode::BadValue, "{line}");
    }
    let list = ok(&d, "read /pipelines").context("list payload")?;
    assert!(list.as_list().context("list")?.is_empty());

    ok(&d, "create /pipelines p0 identity name=a-b.c ! fakesink");
    ok(&d, "read /pipelines/p0/elements/a-b.c");
    Ok(())
}

#[test]
fn bad_literal_leaves_property_unchanged() -> Result<()> {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc pattern=ball ! fakesink name=sink");
    let prop = "/pipelines/p0/elements/videotestsrc0/properties/pattern";
    assert_eq!(code(&d, &format!("update {prop} zigzag")), ReturnCode::BadValue);
    let read = ok(&d, &format!("read {prop}")).context("property")?;
    let read = read.as_object().context("object")?;
    assert_eq!(read["value"], json!("ball"));
    assert_eq!(read["param"]["type"], json!("GstVideoTestSrcPattern"));

    ok(&d, &format!("update {prop} snow"));
    let read = ok(&d, &format!("read {prop}")).context("property")?;
    assert_eq!(read.as_object().context("object")?["value"], json!("snow"));

    assert_eq!(
        code(&d, "update /pipelines/p0/elements/sink/properties/name other"),
        ReturnCode::MethodNotAllowed
    );
    assert_eq!(
        code(&d, "update /pipelines/p0/elements/sink/properties/sync"),
        ReturnCode::NullArgument
    );
    Ok(())
}

#[test]
fn events_distinguish_bad_value_from_rejection() {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc ! identity name=id ! fakesink");
    assert_eq!(code(&d, "create /pipelines/p0/event"), ReturnCode::NullArgument);
    assert_eq!(code(&d, "create /pipelines/p0/event warp"), ReturnCode::BadValue);
    assert_eq!(code(&d, "create /pipelines/p0/event eos"), ReturnCode::EventError);
    ok(&d, "update /pipelines/p0/state paused");
    ok(&d, "create /pipelines/p0/event eos");
    ok(&d, "create /pipelines/p0/event seek 1.0 3 1 1 1000 0 -1");
    ok(&d, "create /pipelines/p0/elements/id/event flush_start");
    ok(&d, "create /pipelines/p0/elements/id/event flush_stop false");
    assert_eq!(
        code(&d, "create /pipelines/p0/event seek 1.0 0"),
        ReturnCode::EventError
    );
}

#[test]
fn await_times_out_after_the_configured_window() {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc ! identity name=id ! fakesink");
    ok(&d, &format!("update {SIGNAL}/timeout 100"));
    let start = Instant::now();
    assert_eq!(code(&d, &format!("read {SIGNAL}/callback")), ReturnCode::Timeout);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");

    assert_eq!(code(&d, &format!("update {SIGNAL}/timeout 0")), ReturnCode::BadValue);
    assert_eq!(code(&d, &format!("update {SIGNAL}/timeout -7")), ReturnCode::BadValue);
    let timeout = ok(&d, &format!("read {SIGNAL}/timeout"));
    assert_eq!(timeout, Some(Payload::Scalar(json!(100))));
}

#[test]
fn emission_returns_arguments_and_rearms() -> Result<()> {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc ! identity name=id ! fakesink");
    ok(&d, &format!("update {SIGNAL}/timeout 2000"));
    ok(&d, "update /pipelines/p0/state playing");

    for _ in 0..2 {
        let payload = ok(&d, &format!("read {SIGNAL}/callback")).context("signal payload")?;
        let payload = payload.as_object().context("object")?;
        assert_eq!(payload["name"], json!("handoff"));
        let args = payload["arguments"].as_array().context("arguments")?;
        assert_eq!(args[0], json!({ "type": "GstIdentity", "value": "id" }));
        assert_eq!(args[1]["type"], json!("GstBuffer"));
    }
    Ok(())
}

#[test]
fn emissions_without_a_waiter_are_not_replayed() {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc ! identity name=id ! fakesink");
    ok(&d, &format!("create {SIGNAL}/callback"));
    assert_eq!(
        code(&d, &format!("create {SIGNAL}/callback")),
        ReturnCode::AlreadyExists
    );
    ok(&d, "update /pipelines/p0/state playing");
    thread::sleep(Duration::from_millis(100));
    ok(&d, "update /pipelines/p0/state paused");
    ok(&d, &format!("update {SIGNAL}/timeout 100"));
    assert_eq!(code(&d, &format!("read {SIGNAL}/callback")), ReturnCode::Timeout);
}

#[test]
fn disconnect_cancels_a_blocked_await() -> Result<()> {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc ! identity name=id ! fakesink");
    let (tx, rx) = mpsc::channel();
    let waiter = {
        let d = Arc::clone(&d);
        thread::spawn(move || {
            let resp = d.execute(&format!("read {SIGNAL}/callback"));
            let _ = tx.send(resp.code);
        })
    };
    let result = loop {
        ok(&d, &format!("delete {SIGNAL}/callback"));
        if let Ok(result) = rx.recv_timeout(Duration::from_millis(20)) {
            break result;
        }
    };
    assert_eq!(result, ReturnCode::Cancelled);
    waiter.join().map_err(|_| anyhow::anyhow!("waiter panicked"))?;

    ok(&d, &format!("read {SIGNAL}/disconnect"));
    ok(&d, &format!("create {SIGNAL}/callback"));
    Ok(())
}

#[test]
fn deleting_the_pipeline_cancels_waiters() -> Result<()> {
    let d = daemon();
    ok(&d, "create /pipelines p0 videotestsrc ! identity name=id ! fakesink");
    ok(&d, &format!("update {SIGNAL}/timeout 5000"));
    let waiter = {
        let d = Arc::clone(&d);
        thread::spawn(move || d.execute(&format!("read {SIGNAL}/callback")).code)
    };
    thread::sleep(Duration::from_millis(300));
    ok(&d, "delete /pipelines p0");
    let result = waiter.join().map_err(|_| anyhow::anyhow!("waiter panicked"))?;
    assert_eq!(result, ReturnCode::Cancelled);
    assert_eq!(code(&d, &format!("read {SIGNAL}")), ReturnCode::NotFound);
    Ok(())
}

#[test]
fn state_machine_round_trip() {
    let d = daemon();
    ok(&d, "create /pipelines p0 audiotestsrc ! volume ! autoaudiosink");
    for state in ["ready", "paused", "playing", "paused", "null"] {
        ok(&d, &format!("update /pipelines/p0/state {state}"));
        assert_eq!(
            ok(&d, "read /pipelines/p0/state"),
            Some(Payload::text(state))
        );
    }
    assert_eq!(
        code(&d, "update /pipelines/p0/state flying"),
        ReturnCode::BadValue
    );
    assert_eq!(code(&d, "delete /pipelines nope"), ReturnCode::NotFound);
}
