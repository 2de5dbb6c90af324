use std::time::Duration;

use rttbench_peer::RunConfig;

use crate::cmd::RunArgs;
use crate::exit::{peer_error, termination_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_report, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = run_config(args)?;
    let outcome = rttbench_peer::run(&config).map_err(|err| peer_error("run failed", err))?;

    print_report(&outcome, &config, format);

    match termination_error(&outcome.termination) {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

fn run_config(args: RunArgs) -> CliResult<RunConfig> {
    if args.max_frame == 0 {
        return Err(CliError::new(USAGE, "--max-frame must be greater than zero"));
    }
    let read_timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    Ok(RunConfig {
        host: args.host,
        port: args.port,
        message: args.msg,
        count: args.count,
        warmup_enabled: !args.no_warmup,
        warmup: args.warmup,
        read_timeout,
        max_payload_size: args.max_frame,
    })
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
