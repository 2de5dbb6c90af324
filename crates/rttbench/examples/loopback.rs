//! In-process benchmark: starts an echo server on a free port and measures
//! round trips against it.
//!
//! Run with:
//!   cargo run --example loopback --features peer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use rttbench::peer::{format_report, run, EchoServer, RunConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(EchoServer::bind("127.0.0.1:0")?);
    let port = server.local_addr().port();
    eprintln!("Echo server on 127.0.0.1:{port}");

    let running = Arc::new(AtomicBool::new(true));
    let handle = {
        let server = Arc::clone(&server);
        let running = Arc::clone(&running);
        thread::spawn(move || server.serve_until(&running))
    };

    let config = RunConfig {
        port,
        count: 2_000,
        warmup: 200,
        ..RunConfig::default()
    };
    let outcome = run(&config)?;
    println!("{}", format_report(outcome.summary().as_ref()));

    running.store(false, Ordering::SeqCst);
    if let Ok(result) = handle.join() {
        result?;
    }
    Ok(())
}
