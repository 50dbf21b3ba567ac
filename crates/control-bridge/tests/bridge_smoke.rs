use std::sync::Arc;

use control_bridge::{BridgeEvent, BridgeRequest, BridgeResponse, ChannelId, ControlBridge};
use document_tree::Document;
use overlay_engine::{Command, OverlayController, OverlayEngine};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn engine() -> (OverlayEngine, Document) {
    let doc = Document::new();
    let card = doc.create_element("div");
    doc.set_attribute(card, "class", "ytp-ce-element-show").unwrap();
    doc.append_child(doc.body(), card).unwrap();
    (OverlayEngine::builder(doc.clone()).build(), doc)
}

fn replies(output: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn serves_commands_line_by_line() {
    let (engine, doc) = engine();
    engine.start().await.unwrap();
    let (bus, mut rx) = broadcast::channel(32);
    let bridge = ControlBridge::new(bus, Arc::new(engine.clone()));

    let req_id = Uuid::new_v4();
    let input = format!(
        "{}\n\n{}\nnot json\n{}\n{}\n",
        r#"{"action":"getStatus"}"#,
        serde_json::json!({"action": "setOpacity", "opacity": 0.6, "req_id": req_id}),
        r#"{"action":"launch","req_id":"nope"}"#,
        r#"{"action":"toggleEnabled","enabled":false}"#,
    );
    let mut output = Vec::new();
    let summary = bridge
        .serve(BufReader::new(input.as_bytes()), &mut output, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.handled, 5);
    assert_eq!(summary.failed, 2);

    let lines = replies(&output);
    assert_eq!(lines[0], serde_json::json!({"enabled": true, "opacity": 0.3}));
    assert_eq!(
        lines[1],
        serde_json::json!({"req_id": req_id, "success": true, "opacity": 0.6})
    );
    assert_eq!(lines[2]["success"], false);
    assert!(lines[2]["error"].as_str().unwrap().contains("malformed"));
    assert_eq!(lines[3]["success"], false);
    assert!(lines[3].get("req_id").is_none());
    assert_eq!(lines[4], serde_json::json!({"success": true, "enabled": false}));

    assert!(doc.select("[data-overlay-dimmed]").unwrap().is_empty());
    assert!(matches!(rx.recv().await.unwrap(), BridgeEvent::Ready { .. }));
    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    match last {
        Some(BridgeEvent::Closed { handled, channel }) => {
            assert_eq!(handled, 5);
            assert_eq!(channel, summary.channel);
        }
        other => panic!("unexpected final event: {:?}", other),
    }
    assert_eq!(bridge.open_channels(), 0);
}

#[tokio::test]
async fn close_all_ends_an_idle_channel() {
    let (engine, _doc) = engine();
    let (bus, _rx) = broadcast::channel(8);
    let bridge = ControlBridge::new(bus, Arc::new(engine));
    let (client, server) = tokio::io::duplex(1024);
    let (server_read, server_write) = tokio::io::split(server);

    let serving = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge
                .serve(BufReader::new(server_read), server_write, CancellationToken::new())
                .await
        })
    };
    while bridge.open_channels() == 0 {
        tokio::task::yield_now().await;
    }
    bridge.close_all();
    let summary = serving.await.unwrap().unwrap();
    assert_eq!(summary.handled, 0);
    drop(client);
}

#[tokio::test]
async fn request_round_trips_with_flattened_command() {
    let req_id = Uuid::new_v4();
    let line = serde_json::json!({"req_id": req_id, "action": "toggleEnabled", "enabled": true})
        .to_string();
    let request = BridgeRequest::parse(&line).unwrap();
    assert_eq!(request.req_id, Some(req_id));
    assert_eq!(request.command, Command::ToggleEnabled { enabled: true });

    let (engine, _doc) = engine();
    let (bus, _rx) = broadcast::channel(8);
    let bridge = ControlBridge::new(bus, Arc::new(engine.clone()));
    let reply: BridgeResponse = bridge.dispatch(&ChannelId::new(), request).await;
    assert_eq!(reply.req_id, Some(req_id));
    assert_eq!(reply.response.enabled, Some(true));
    assert!(engine.status().enabled);
    assert_eq!(bridge.total_handled(), 1);
}
