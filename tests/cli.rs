use std::io::{self, Read};
use std::net::TcpListener;
use std::process::{Command, Output};
use std::thread;
use std::time::{Duration, Instant};

const PROBE_VARS: [&str; 9] = [
    "CONFIG_FILE",
    "PROBE_PROFILE",
    "PROBE_HOST",
    "PROBE_PORT",
    "PROBE_PAYLOAD",
    "PROBE_PAYLOAD_FILE",
    "PROBE_MODE",
    "PROBE_TIMEOUT_MS",
    "PROBE_REPORT",
];

fn tcpprobe(args: &[&str]) -> Output {
    // Run from an empty directory so no stray .env is picked up.
    let workdir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tcpprobe"));
    cmd.args(args).current_dir(workdir.path()).env_remove("RUST_LOG");
    for var in PROBE_VARS {
        cmd.env_remove(var);
    }
    cmd.output().expect("Failed to run tcpprobe")
}

/// Accept one connection and return everything read before EOF or error.
fn spawn_peer() -> (String, thread::JoinHandle<(Vec<u8>, io::Result<()>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind peer");
    let port = listener.local_addr().expect("No local address").port().to_string();

    let handle = thread::spawn(move || {
        let (mut conn, _) = listener.accept().expect("Failed to accept");
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match conn.read(&mut buf) {
                Ok(0) => return (received, Ok(())),
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(e) => return (received, Err(e)),
            }
        }
    });

    (port, handle)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn graceful_probe_prints_verbose_lines_and_exits_zero() {
    let (port, peer) = spawn_peer();

    let output = tcpprobe(&["--port", &port, "--payload", "mirrit", "--verbose"]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output), "connected\ndisconnected\nok\n");

    let (received, ended) = peer.join().expect("Peer panicked");
    assert_eq!(received, b"mirrit");
    assert!(ended.is_ok());
}

#[test]
fn abortive_probe_prints_ok_and_peer_sees_reset() {
    let (port, peer) = spawn_peer();

    let output = tcpprobe(&["-p", &port, "--payload", "kattijengi", "-m", "abortive"]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "ok\n");

    let (received, ended) = peer.join().expect("Peer panicked");
    assert!(b"kattijengi".starts_with(&received));
    let err = ended.expect_err("peer saw a clean close");
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
}

#[test]
fn unreachable_peer_exits_one_with_message() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        listener.local_addr().expect("No local address").port().to_string()
    };

    let start = Instant::now();
    let output = tcpprobe(&["--port", &port, "--timeout-ms", "1000"]);

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.starts_with(&format!("failed to connect to 127.0.0.1:{port}: ")));
    assert_eq!(out.lines().count(), 1);
}

#[test]
fn repeated_runs_give_the_same_exit_code() {
    let codes: Vec<Option<i32>> = (0..2)
        .map(|_| {
            let (port, peer) = spawn_peer();
            let output = tcpprobe(&["--port", &port]);
            peer.join().expect("Peer panicked");
            output.status.code()
        })
        .collect();
    assert_eq!(codes, vec![Some(0), Some(0)]);
}

#[test]
fn config_errors_exit_two() {
    let output = tcpprobe(&["--config", "/nonexistent/tcpprobe.yml"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read config file"));
    assert!(output.stdout.is_empty());
}

#[test]
fn profile_file_drives_the_probe() {
    let (port, peer) = spawn_peer();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = dir.path().join("probes.yml");
    std::fs::write(
        &config,
        format!("reset:\n  port: {port}\n  payload: kattijengi\n  report: verbose\n"),
    )
    .expect("Failed to write config");

    let output = tcpprobe(&["--config", config.to_str().expect("Non UTF-8 path")]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "connected\ndisconnected\nok\n");
    let (received, _) = peer.join().expect("Peer panicked");
    assert_eq!(received, b"kattijengi");
}

#[test]
fn connect_timeout_exits_one() {
    use socket2::{Domain, Protocol, Socket, Type};

    // Backlog of zero, filled by one connection nobody accepts: later SYNs are dropped.
    let listener = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .expect("Failed to create socket");
    let bind_addr: std::net::SocketAddr = "127.0.0.1:0".parse().expect("Invalid address");
    listener.bind(&bind_addr.into()).expect("Failed to bind");
    listener.listen(0).expect("Failed to listen");
    let addr = listener
        .local_addr()
        .expect("No local address")
        .as_socket()
        .expect("Not an inet address");

    let mut fillers = Vec::new();
    while let Ok(stream) = std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(100)) {
        fillers.push(stream);
        assert!(fillers.len() < 16, "accept queue never filled up");
    }

    let port = addr.port().to_string();
    let start = Instant::now();
    let output = tcpprobe(&["--port", &port, "--timeout-ms", "300"]);
    let elapsed = start.elapsed();

    assert_eq!(output.status.code(), Some(1));
    assert!(elapsed >= Duration::from_millis(300), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "returned after {elapsed:?}");
    let out = stdout(&output);
    assert!(out.starts_with(&format!("failed to connect to 127.0.0.1:{port}: ")));
    assert_eq!(out.lines().count(), 1);
}
