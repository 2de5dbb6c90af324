use std::io::{Read, Write};
use std::net::Shutdown;
use std::time::{Duration, Instant};

use rttbench_frame::{FrameError, FrameReader, FrameWriter};
use rttbench_transport::{NetStream, TcpTransport};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::driver::{Action, Driver, DriverEvent, DriverState, Sample};
use crate::error::Result;
use crate::stats::Summary;

/// Upper bound on the sample buffer reserved up front.
const MAX_PREALLOCATED_SAMPLES: u64 = 1 << 20;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every request was echoed.
    Completed,
    /// The peer closed the connection before the last echo.
    PeerClosed,
    /// The peer stalled longer than the configured timeout.
    TimedOut(Duration),
    /// The connection failed or the peer misbehaved.
    Failed(String),
}

/// Result of one run: the samples it produced and how it ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Post-warmup samples in send order.
    pub samples: Vec<Sample>,
    /// Requests sent.
    pub sent: u64,
    /// Echoes received.
    pub received: u64,
    /// Requests the run was configured for.
    pub total: u64,
    /// How the run ended.
    pub termination: Termination,
}

impl RunOutcome {
    /// Whether every request was echoed.
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }

    /// Statistics over the collected samples, `None` if there are none.
    pub fn summary(&self) -> Option<Summary> {
        Summary::from_samples(&self.samples)
    }
}

/// Connect to the configured server.
pub fn connect(config: &RunConfig) -> Result<NetStream> {
    Ok(TcpTransport::connect(&config.addr())?)
}

/// Connect and run the benchmark to completion.
///
/// Errors are only returned if the run could not start. Once connected,
/// a failure ends the run and is reported in [`RunOutcome::termination`]
/// alongside the samples gathered so far.
pub fn run(config: &RunConfig) -> Result<RunOutcome> {
    config.validate()?;
    info!(
        addr = %config.addr(),
        count = config.count,
        warmup = config.effective_warmup(),
        message_len = config.message.len(),
        "starting sequential run"
    );

    let stream = connect(config)?;
    let reader_stream = stream.try_clone()?;
    let frame_config = config.frame_config();
    let mut reader = FrameReader::with_config_net(reader_stream, frame_config.clone())?;
    let mut writer = FrameWriter::with_config_net(stream, frame_config)?;

    let outcome = run_session(&mut reader, &mut writer, config)?;
    writer.get_ref().shutdown(Shutdown::Both)?;
    Ok(outcome)
}

/// Drive one run over an already-connected reader/writer pair.
pub fn run_session<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &RunConfig,
) -> Result<RunOutcome> {
    let mut driver = Driver::from_config(config)?;
    let expected = config.message.as_bytes();
    let mut samples = Vec::with_capacity(
        config
            .count
            .saturating_sub(config.effective_warmup())
            .min(MAX_PREALLOCATED_SAMPLES) as usize,
    );

    driver.handle(DriverEvent::Connect);
    let mut pending = driver.handle(DriverEvent::Connected);

    let termination = loop {
        for action in pending.drain(..) {
            match action {
                Action::Send(frame) => {
                    driver.handle(DriverEvent::Sent { at: Instant::now() });
                    if let Err(err) = writer.send_encoded(&frame) {
                        driver.handle(DriverEvent::Closed);
                        return Ok(outcome(&driver, samples, terminated_by(err, config)));
                    }
                }
                Action::RecordSample(sample) => samples.push(sample),
                Action::Close => debug!(sent = driver.sent(), "run complete"),
                Action::None => {}
            }
        }

        if driver.state() == DriverState::Finished {
            break Termination::Completed;
        }

        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                driver.handle(DriverEvent::Closed);
                break terminated_by(err, config);
            }
        };
        let at = Instant::now();

        if frame.payload.as_ref() != expected {
            driver.handle(DriverEvent::Closed);
            break Termination::Failed(format!(
                "echo {} does not match request ({} bytes sent, {} bytes back)",
                driver.sent(),
                expected.len(),
                frame.payload.len()
            ));
        }

        pending = driver.handle(DriverEvent::EchoReceived { at });
    };

    Ok(outcome(&driver, samples, termination))
}

fn outcome(driver: &Driver, samples: Vec<Sample>, termination: Termination) -> RunOutcome {
    RunOutcome {
        samples,
        sent: driver.sent(),
        received: driver.received(),
        total: driver.total(),
        termination,
    }
}

fn terminated_by(err: FrameError, config: &RunConfig) -> Termination {
    match err {
        FrameError::ConnectionClosed => Termination::PeerClosed,
        err if err.is_timeout() => {
            Termination::TimedOut(config.read_timeout.unwrap_or(Duration::ZERO))
        }
        err => Termination::Failed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use bytes::BytesMut;
    use rttbench_frame::encode_frame;

    use super::*;
    use crate::listener::EchoServer;

    fn echoes(message: &str, n: usize) -> Cursor<Vec<u8>> {
        let mut wire = BytesMut::new();
        for _ in 0..n {
            encode_frame(message.as_bytes(), &mut wire).unwrap();
        }
        Cursor::new(wire.to_vec())
    }

    fn session(
        config: &RunConfig,
        replies: Cursor<Vec<u8>>,
    ) -> (RunOutcome, Vec<u8>) {
        let mut reader = FrameReader::new(replies);
        let mut writer = FrameWriter::new(Vec::new());
        let outcome = run_session(&mut reader, &mut writer, config).unwrap();
        (outcome, writer.into_inner())
    }

    fn config(message: &str, count: u64, warmup: Option<u64>) -> RunConfig {
        RunConfig {
            message: message.to_string(),
            count,
            warmup_enabled: warmup.is_some(),
            warmup: warmup.unwrap_or(0),
            ..RunConfig::default()
        }
    }

    #[test]
    fn scripted_session_completes() {
        let cfg = config("ping", 4, None);
        let (outcome, sent) = session(&cfg, echoes("ping", 4));

        assert!(outcome.is_complete());
        assert_eq!((outcome.sent, outcome.received, outcome.total), (4, 4, 4));
        assert_eq!(outcome.samples.len(), 4);
        let seqs: Vec<u64> = outcome.samples.iter().map(|s| s.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert_eq!(sent.len(), 4 * (4 + 4));
    }

    #[test]
    fn warmup_samples_are_not_kept() {
        let cfg = config("ping", 150, Some(100));
        let (outcome, _) = session(&cfg, echoes("ping", 150));

        assert!(outcome.is_complete());
        assert_eq!(outcome.samples.len(), 50);
        assert_eq!(outcome.samples[0].seq, 101);
        assert_eq!(outcome.samples[49].seq, 150);
    }

    #[test]
    fn peer_closing_early_keeps_partial_samples() {
        let cfg = config("ping", 5, None);
        let (outcome, _) = session(&cfg, echoes("ping", 2));

        assert_eq!(outcome.termination, Termination::PeerClosed);
        assert!(!outcome.is_complete());
        assert_eq!((outcome.sent, outcome.received), (3, 2));
        assert_eq!(outcome.samples.len(), 2);
    }

    #[test]
    fn peer_closing_before_any_echo_reports_no_data() {
        let cfg = config("ping", 3, None);
        let (outcome, _) = session(&cfg, echoes("ping", 0));

        assert_eq!(outcome.termination, Termination::PeerClosed);
        assert!(outcome.summary().is_none());
    }

    #[test]
    fn mismatched_echo_fails_the_run() {
        let cfg = config("ping", 3, None);
        let (outcome, _) = session(&cfg, echoes("pong", 3));

        assert!(matches!(outcome.termination, Termination::Failed(_)));
        assert!(outcome.samples.is_empty());
        assert_eq!(outcome.sent, 1);
    }

    /// Hands back one echo per read, each after a fixed delay.
    struct SlowEchoes {
        frames: std::collections::VecDeque<Vec<u8>>,
        delay: Duration,
    }

    impl Read for SlowEchoes {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some(frame) = self.frames.pop_front() else {
                return Ok(0);
            };
            thread::sleep(self.delay);
            buf[..frame.len()].copy_from_slice(&frame);
            Ok(frame.len())
        }
    }

    #[test]
    fn every_sample_covers_the_wait_for_its_echo() {
        let delay = Duration::from_millis(5);
        let mut wire = BytesMut::new();
        encode_frame(b"ping", &mut wire).unwrap();
        let replies = SlowEchoes {
            frames: std::iter::repeat(wire.to_vec()).take(3).collect(),
            delay,
        };

        let cfg = config("ping", 3, None);
        let mut reader = FrameReader::new(replies);
        let mut writer = FrameWriter::new(Vec::new());
        let outcome = run_session(&mut reader, &mut writer, &cfg).unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.samples.len(), 3);
        assert!(outcome.samples.iter().all(|s| s.rtt >= delay));
    }

    #[test]
    fn zero_count_sends_nothing() {
        let cfg = config("ping", 0, None);
        let (outcome, sent) = session(&cfg, echoes("ping", 0));

        assert!(outcome.is_complete());
        assert!(sent.is_empty());
        assert!(outcome.summary().is_none());
    }

    #[test]
    fn run_against_echo_server() {
        let server = Arc::new(EchoServer::bind("127.0.0.1:0").unwrap());
        let port = server.local_addr().port();
        let running = Arc::new(AtomicBool::new(true));
        let serve = {
            let server = Arc::clone(&server);
            let running = Arc::clone(&running);
            thread::spawn(move || server.serve_until(&running))
        };

        let cfg = RunConfig {
            port,
            ..config("ping", 5, None)
        };
        let outcome = run(&cfg).unwrap();

        assert!(outcome.is_complete());
        let summary = outcome.summary().unwrap();
        assert_eq!(summary.samples, 5);
        assert!(summary.min_us <= summary.p50_us);
        assert!(summary.p50_us <= summary.p90_us);
        assert!(summary.p90_us <= summary.p99_us);
        assert!(summary.p99_us <= summary.max_us);
        assert!(summary.min_us <= summary.avg_us && summary.avg_us <= summary.max_us);

        let empty = RunConfig {
            port,
            ..config("", 3, None)
        };
        let outcome = run(&empty).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.samples.len(), 3);

        running.store(false, Ordering::SeqCst);
        serve.join().unwrap().unwrap();
    }

    #[test]
    fn stalled_peer_times_out() {
        let server = EchoServer::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().port();
        // Accept but never echo.
        let holder = thread::spawn(move || {
            let responder = server.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            drop(responder);
        });

        let cfg = RunConfig {
            port,
            read_timeout: Some(Duration::from_millis(50)),
            ..config("ping", 3, None)
        };
        let outcome = run(&cfg).unwrap();
        assert!(matches!(outcome.termination, Termination::TimedOut(_)));
        assert_eq!((outcome.sent, outcome.received), (1, 0));

        holder.join().unwrap();
    }

    #[test]
    fn connection_refused_is_an_error() {
        let port = {
            let server = EchoServer::bind("127.0.0.1:0").unwrap();
            server.local_addr().port()
        };
        let cfg = RunConfig {
            port,
            ..config("ping", 1, None)
        };
        assert!(run(&cfg).is_err());
    }
}
