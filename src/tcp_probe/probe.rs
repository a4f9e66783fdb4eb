use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use socket2::SockRef;

use crate::config::probe_config::{ProbeConfig, TerminationMode};

use super::prelude::*;

/// Resolve the target and connect to the first address that answers.
/// All addresses share one deadline, so the whole step is bounded by `timeout`.
fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let start = Instant::now();
    let addrs = (host, port).to_socket_addrs()?;

    let mut last_err = None;
    for addr in addrs {
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            last_err = Some(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection timed out",
            ));
            break;
        }

        log::debug!("Connecting to {} (timeout {:?})", addr, remaining);
        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                log::debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "host resolved to no addresses",
        )
    }))
}

/// Write the whole payload, retrying short writes until every byte is
/// accepted. `sent` tracks progress so a failure can say how far it got.
fn send_payload<W: Write>(stream: &mut W, payload: &[u8], sent: &mut usize) -> io::Result<()> {
    while *sent < payload.len() {
        match stream.write(&payload[*sent..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "peer stopped accepting data",
                ));
            }
            Ok(n) => *sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    stream.flush()
}

/// End the connection. The stream is consumed, so the socket is released
/// when this returns on either path.
fn terminate(stream: TcpStream, mode: TerminationMode) -> io::Result<()> {
    match mode {
        TerminationMode::Graceful => stream.shutdown(Shutdown::Write),
        // SO_LINGER {on, 0}: close() discards unsent data and sends RST.
        // No shutdown first, that would put a FIN on the wire.
        TerminationMode::Abortive => SockRef::from(&stream).set_linger(Some(Duration::ZERO)),
    }
}

fn run_steps<F>(config: &ProbeConfig, result: &mut ProbeResult, on_stage: &mut F) -> Result<(), ProbeError>
where
    F: FnMut(&Stage),
{
    let connect_start = Instant::now();
    let mut stream =
        connect(&config.host, config.port, config.timeout).map_err(|source| ProbeError::Connect {
            target: result.target.clone(),
            source,
        })?;
    result.connected = true;
    result.connect_time = Some(connect_start.elapsed().as_secs_f64());
    result.peer = stream.peer_addr().ok();

    log::info!(
        "Connected to {} ({:?}) in {:.2}ms",
        result.target,
        result.peer,
        connect_start.elapsed().as_secs_f64() * 1000.0
    );
    on_stage(&Stage::Connected(result.peer));

    let total = config.payload.len();
    let sent = send_payload(&mut stream, &config.payload, &mut result.sent_bytes);
    if let Err(source) = sent {
        return Err(ProbeError::Send {
            sent: result.sent_bytes,
            total,
            source,
        });
    }
    log::debug!("Sent {} bytes to {}", total, result.target);
    on_stage(&Stage::Sent(total));

    terminate(stream, config.termination).map_err(|source| ProbeError::Close {
        mode: config.termination,
        source,
    })?;
    log::info!("Closed connection to {} ({})", result.target, config.termination);
    on_stage(&Stage::Closed(config.termination));

    Ok(())
}

/// Run one probe: connect, send the payload, close with the configured mode.
/// There are no retries; the first failing step ends the run and is recorded
/// in the returned result. `on_stage` is called after each completed step.
pub fn probe_endpoint<F>(config: &ProbeConfig, mut on_stage: F) -> ProbeResult
where
    F: FnMut(&Stage),
{
    let start = Instant::now();
    let mut result = ProbeResult::new(config.target(), config.termination);

    if let Err(e) = run_steps(config, &mut result, &mut on_stage) {
        log::warn!("Probe of {} failed: {} ({:?})", result.target, e, e.io_error().kind());
        result.error = Some(e);
    }

    result.total_probe_time = start.elapsed().as_secs_f64();
    result
}
