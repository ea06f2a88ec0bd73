// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Client library against a live daemon on an ephemeral port.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use gstd_client::{ClientConfig, ClientError, GstClient};
use gstd_core::engine::sim::SimEngine;
use gstd_core::Daemon;
use gstd_proto::ReturnCode;
use gstd_service::{serve, ServerOptions};
use serde_json::json;
use tokio::net::TcpListener;

async fn start(options: ServerOptions) -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let engine = SimEngine::with_tick(Duration::from_millis(5));
    let daemon = Arc::new(Daemon::new(Arc::new(engine)));
    tokio::spawn(serve(listener, daemon, options));
    Ok(port)
}

fn config(port: u16, keep_connection_open: bool) -> ClientConfig {
    ClientConfig {
        port,
        timeout: Some(Duration::from_secs(5)),
        keep_connection_open,
        ..ClientConfig::default()
    }
}

fn session(client: &GstClient) -> Result<()> {
    client.ping()?;
    client.pipeline_create("p0", "videotestsrc ! identity name=id ! fakesink")?;
    assert_eq!(client.list_pipelines()?, ["p0"]);
    assert_eq!(
        client.pipeline_list_elements("p0")?,
        ["videotestsrc0", "id", "fakesink0"]
    );
    assert!(client
        .element_properties_list("p0", "videotestsrc0")?
        .contains(&"pattern".to_string()));

    client.element_set("p0", "videotestsrc0", "pattern", "snow")?;
    assert_eq!(client.element_get("p0", "videotestsrc0", "pattern")?, json!("snow"));

    client.pipeline_play("p0")?;
    assert_eq!(client.pipeline_get_state("p0")?, "playing");
    let emission = client.pipeline_signal_connect("p0", "id", "handoff", 2000)?;
    let emission = emission.as_object().context("emission object")?;
    assert_eq!(emission["name"], json!("handoff"));
    client.pipeline_signal_disconnect("p0", "id", "handoff")?;

    client.pipeline_eos("p0")?;
    client.pipeline_stop("p0")?;
    client.pipeline_delete("p0")?;
    assert!(client.list_pipelines()?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn persistent_client_session() -> Result<()> {
    let port = start(ServerOptions::default()).await?;
    tokio::task::spawn_blocking(move || -> Result<()> {
        let client = GstClient::connect(config(port, true))?;
        session(&client)
    })
    .await?
}

#[tokio::test(flavor = "multi_thread")]
async fn per_call_client_against_close_mode_daemon() -> Result<()> {
    let port = start(ServerOptions {
        keep_connection_open: false,
        ..ServerOptions::default()
    })
    .await?;
    tokio::task::spawn_blocking(move || -> Result<()> {
        let client = GstClient::connect(config(port, false))?;
        session(&client)
    })
    .await?
}

#[tokio::test(flavor = "multi_thread")]
async fn signal_timeout_reaches_the_client() -> Result<()> {
    let port = start(ServerOptions::default()).await?;
    tokio::task::spawn_blocking(move || -> Result<()> {
        let client = GstClient::connect(config(port, true))?;
        client.pipeline_create("p0", "videotestsrc ! identity name=id ! fakesink")?;
        let start = Instant::now();
        let err = client
            .pipeline_signal_connect("p0", "id", "handoff", 100)
            .err()
            .context("paused pipeline must not emit")?;
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(err.return_code(), ReturnCode::Timeout);

        let err = client
            .pipeline_signal_timeout("p0", "id", "handoff", 0)
            .err()
            .context("zero timeout must be refused")?;
        assert_eq!(err.return_code(), ReturnCode::BadValue);

        assert!(matches!(
            client.pipeline_delete("nope"),
            Err(ClientError::Daemon { code: ReturnCode::NotFound, .. })
        ));
        Ok(())
    })
    .await?
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_persistent_client_pairs_each_reply_with_its_request() -> Result<()> {
    let port = start(ServerOptions::default()).await?;
    tokio::task::spawn_blocking(move || -> Result<()> {
        let client = GstClient::connect(config(port, true))?;
        client.pipeline_create("p0", "fakesink")?;
        client.pipeline_create("p1", "identity name=id ! fakesink")?;
        client.pipeline_pause("p1")?;
        let expected = [("p0", "null"), ("p1", "paused")];
        std::thread::scope(|s| -> Result<()> {
            let workers: Vec<_> = (0..6)
                .map(|i| {
                    let client = &client;
                    let (name, state) = expected[i % 2];
                    s.spawn(move || -> Result<()> {
                        for _ in 0..25 {
                            assert_eq!(client.pipeline_get_state(name)?, state);
                            assert_eq!(client.list_pipelines()?, ["p0", "p1"]);
                            assert_eq!(
                                client.pipeline_list_elements(name)?.len(),
                                if name == "p0" { 1 } else { 2 }
                            );
                        }
                        Ok(())
                    })
                })
                .collect();
            for worker in workers {
                worker
                    .join()
                    .map_err(|_| anyhow::anyhow!("client worker panicked"))??;
            }
            Ok(())
        })?;
        client.pipeline_delete("p0")?;
        client.pipeline_delete("p1")?;
        assert!(client.list_pipelines()?.is_empty());
        Ok(())
    })
    .await?
}
