//! End-to-end tests over real sockets: a server bound to ephemeral ports, a
//! raw TCP command client, and a raw TCP event subscriber.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use taskbridge::{Ack, Config, RuntimeError, Server, TaskEvent};

fn test_config() -> Config {
    Config {
        command_addr: "127.0.0.1:0".parse().unwrap(),
        event_addr: "127.0.0.1:0".parse().unwrap(),
        poll_interval: Duration::from_millis(5),
        step_delay: Duration::from_millis(10),
        ..Config::default()
    }
}

struct TestServer {
    command_addr: SocketAddr,
    event_addr: SocketAddr,
    stop: CancellationToken,
    join: JoinHandle<Result<(), RuntimeError>>,
}

impl TestServer {
    async fn start() -> Self {
        let server = Server::bind(test_config()).await.expect("bind test server");
        let command_addr = server.command_addr();
        let event_addr = server.event_addr();
        let stop = CancellationToken::new();
        let join = tokio::spawn(server.run_until(stop.clone()));
        Self {
            command_addr,
            event_addr,
            stop,
            join,
        }
    }

    /// Connects a subscriber before any command is sent and gives the accept
    /// loop a moment to register it.
    async fn subscribe(&self) -> tokio::io::Lines<BufReader<OwnedReadHalf>> {
        let stream = TcpStream::connect(self.event_addr).await.expect("connect subscriber");
        let (read_half, _write_half) = stream.into_split();
        tokio::time::sleep(Duration::from_millis(50)).await;
        BufReader::new(read_half).lines()
    }

    async fn send_command(&self, text: &str) -> Ack {
        let mut stream = TcpStream::connect(self.command_addr).await.expect("connect command");
        stream
            .write_all(format!("{text}\n").as_bytes())
            .await
            .expect("send command");
        let mut lines = BufReader::new(stream).lines();
        let reply = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .expect("ack within 2s")
            .expect("read reply")
            .expect("connection open");
        serde_json::from_str(&reply).expect("ack is valid JSON")
    }

    async fn shutdown(self) {
        self.stop.cancel();
        let result = tokio::time::timeout(Duration::from_secs(10), self.join)
            .await
            .expect("server exits promptly")
            .expect("server task does not panic");
        assert!(result.is_ok(), "clean shutdown, got {result:?}");
    }
}

async fn next_frame(lines: &mut tokio::io::Lines<BufReader<OwnedReadHalf>>) -> (String, TaskEvent) {
    let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
        .await
        .expect("frame within 2s")
        .expect("read frame")
        .expect("subscriber connection open");
    let (topic, json) = line.split_once(' ').expect("frame has topic prefix");
    let event = serde_json::from_str(json).expect("frame payload is valid JSON");
    (topic.to_string(), event)
}

#[tokio::test]
async fn command_is_acknowledged_with_fresh_id() {
    let server = TestServer::start().await;

    let ack = server.send_command("hello").await;
    assert_eq!(ack.status, "started");
    assert_eq!(ack.original_request, "hello");
    assert_eq!(ack.id.len(), 8);
    assert!(ack.id.chars().all(|c| c.is_ascii_hexdigit()));

    server.shutdown().await;
}

#[tokio::test]
async fn event_stream_has_increasing_progress_then_one_result() {
    let server = TestServer::start().await;
    let mut sub = server.subscribe().await;

    let ack = server.send_command("hello").await;

    let mut values = Vec::new();
    loop {
        let (topic, event) = next_frame(&mut sub).await;
        assert_eq!(event.id(), ack.id);
        match event {
            TaskEvent::Progress { value, message, .. } => {
                assert_eq!(topic, "progress");
                assert!(message.starts_with("Processing step "));
                values.push(value);
            }
            TaskEvent::Completed { data, .. } => {
                assert_eq!(topic, "result");
                assert_eq!(data, "Analysis of 'hello' is complete.");
                break;
            }
            TaskEvent::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }
    assert_eq!(values, vec![20, 40, 60, 80, 100]);

    // Terminal means terminal: nothing else arrives for this task.
    let silence =
        tokio::time::timeout(Duration::from_millis(200), sub.next_line()).await;
    assert!(silence.is_err(), "no events after the terminal one");

    server.shutdown().await;
}

#[tokio::test]
async fn back_to_back_commands_get_independent_streams() {
    let server = TestServer::start().await;
    let mut sub = server.subscribe().await;

    // Second command sent only after the first ack, per the channel contract.
    let first = server.send_command("alpha").await;
    let second = server.send_command("beta").await;
    assert_ne!(first.id, second.id);

    let mut last_progress: HashMap<String, u8> = HashMap::new();
    let mut finished: HashMap<String, String> = HashMap::new();
    while finished.len() < 2 {
        let (_, event) = next_frame(&mut sub).await;
        let id = event.id().to_string();
        assert!(id == first.id || id == second.id, "unknown id {id}");
        assert!(!finished.contains_key(&id), "event after terminal for {id}");
        match event {
            TaskEvent::Progress { value, .. } => {
                let last = last_progress.entry(id).or_insert(0);
                assert!(value > *last, "per-id progress strictly increasing");
                assert!(value <= 100);
                *last = value;
            }
            TaskEvent::Completed { data, .. } => {
                finished.insert(id, data);
            }
            TaskEvent::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    assert_eq!(
        finished.get(&first.id).map(String::as_str),
        Some("Analysis of 'alpha' is complete.")
    );
    assert_eq!(
        finished.get(&second.id).map(String::as_str),
        Some("Analysis of 'beta' is complete.")
    );

    server.shutdown().await;
}

#[tokio::test]
async fn intake_never_blocks_on_running_tasks() {
    let server = TestServer::start().await;

    // Acks arrive while earlier tasks are still running; each within the
    // poll interval plus margin, far under the ~50ms total task duration.
    let started = std::time::Instant::now();
    for i in 0..5 {
        let ack = server.send_command(&format!("cmd-{i}")).await;
        assert_eq!(ack.status, "started");
    }
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "acks were not delayed by running tasks"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn ack_ids_are_never_reused() {
    let server = TestServer::start().await;

    let mut seen = std::collections::HashSet::new();
    for i in 0..10 {
        let ack = server.send_command(&format!("task-{i}")).await;
        assert!(seen.insert(ack.id.clone()), "duplicate ack id {}", ack.id);
    }

    server.shutdown().await;
}

#[tokio::test]
async fn one_connection_can_issue_sequential_commands() {
    let server = TestServer::start().await;

    let stream = TcpStream::connect(server.command_addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let mut ids = Vec::new();
    for text in ["one", "two", "three"] {
        write_half
            .write_all(format!("{text}\n").as_bytes())
            .await
            .unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let ack: Ack = serde_json::from_str(&reply).unwrap();
        assert_eq!(ack.status, "started");
        assert_eq!(ack.original_request, text);
        ids.push(ack.id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    server.shutdown().await;
}

#[tokio::test]
async fn late_subscriber_misses_earlier_events_without_harm() {
    let server = TestServer::start().await;

    // Nobody is listening: events are fire-and-forget.
    let ack = server.send_command("silent").await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    // A subscriber connecting afterwards sees only subsequent tasks.
    let mut sub = server.subscribe().await;
    let ack2 = server.send_command("heard").await;
    let (_, event) = next_frame(&mut sub).await;
    assert_eq!(event.id(), ack2.id);
    assert_ne!(event.id(), ack.id);

    server.shutdown().await;
}
