use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rttbench_frame::FrameConfig;
use rttbench_peer::{join_host_port, EchoServer};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    if args.max_frame == 0 {
        return Err(CliError::new(USAGE, "--max-frame must be greater than zero"));
    }

    let addr = join_host_port(&args.host, args.port);
    let server = EchoServer::bind(&addr)
        .map_err(|err| peer_error("bind failed", err))?
        .with_frame_config(FrameConfig {
            max_payload_size: args.max_frame,
            ..FrameConfig::default()
        });

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    // Tests and scripts using port 0 read the bound address from stdout.
    println!("listening on {}", server.local_addr());
    let served = server
        .serve_until(&running)
        .map_err(|err| peer_error("accept failed", err))?;
    info!(connections = served, "echo server stopped");

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
