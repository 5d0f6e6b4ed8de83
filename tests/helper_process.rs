//! Supervision of real helper processes.
#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use common::{next_notice, recorder, wait_state};
use roomcast::stream::{SourceNotice, SourceSettings, SourceState, StreamSource};

const WAIT: Duration = Duration::from_secs(10);

fn quick_settings() -> SourceSettings {
    SourceSettings {
        backoff_initial: Duration::from_millis(50),
        backoff_max: Duration::from_millis(200),
        kill_grace: Duration::from_millis(500),
        read_chunk_bytes: 4096,
    }
}

#[tokio::test]
async fn test_echo_output_reaches_listener() {
    let (listener, mut chunks) = recorder();
    let handle = StreamSource::from_uri("process:///bin/echo?name=Echo&params=hello%20world", listener)
        .unwrap()
        .with_settings(quick_settings())
        .start();

    let (id, data) = timeout(WAIT, chunks.recv()).await.unwrap().unwrap();
    assert_eq!(id, "Echo");
    assert_eq!(data, b"hello world\n");

    // echo exits right away and keeps being restarted.
    timeout(WAIT, async {
        let mut status = handle.subscribe();
        status.wait_for(|s| s.restarts >= 2).await.map(|_| ()).unwrap();
    })
    .await
    .unwrap();

    timeout(WAIT, handle.stop()).await.unwrap();
    assert_eq!(handle.status().state, SourceState::Stopped);
}

#[tokio::test]
async fn test_fake_librespot_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("librespot");
    std::fs::write(
        &script,
        concat!(
            "#!/bin/sh\n",
            "printf '%s\\n' \"$@\" > \"$(dirname \"$0\")/args.txt\"\n",
            "echo 'Track \"Heroes\" loaded' >&2\n",
            "printf 'PCMDATA'\n",
            "exec sleep 30\n",
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let uri = format!(
        "spotify://{}?name=Spotify&devicename=Attic&bitrate=96&volume=40&username=alice&password=secret",
        script.display()
    );
    let (listener, mut chunks) = recorder();
    let (events_tx, mut events) = mpsc::channel(128);
    let handle = StreamSource::from_uri(&uri, listener)
        .unwrap()
        .with_settings(quick_settings())
        .with_events(events_tx)
        .start();
    assert!(!handle.uri().contains("secret"));

    let notice = timeout(WAIT, next_notice(&mut events)).await.unwrap();
    assert_eq!(
        notice,
        SourceNotice::Metadata {
            meta: json!({"TITLE": "Heroes"})
        }
    );

    let mut pcm = Vec::new();
    while pcm.len() < b"PCMDATA".len() {
        let (_, data) = timeout(WAIT, chunks.recv()).await.unwrap().unwrap();
        pcm.extend_from_slice(&data);
    }
    assert_eq!(pcm, b"PCMDATA");

    let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(
        args,
        vec![
            "--name",
            "Attic",
            "--username",
            "alice",
            "--password",
            "secret",
            "--bitrate",
            "96",
            "--backend",
            "pipe",
            "--initial-volume",
            "40",
            "--verbose"
        ]
    );

    timeout(WAIT, wait_state(&handle, SourceState::Running)).await.unwrap();
    timeout(WAIT, handle.stop()).await.unwrap();
    assert_eq!(handle.status().state, SourceState::Stopped);
}
