//! stress-bench - controllable HTTP load generator

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stress_bench_core::state::UNBOUNDED_MARKER;
use stress_bench_core::{
    Budget, BroadcastSink, Controller, ControllerBuilder, Event, EventSink, FanoutSink, RunConfig,
    StatusSnapshot, TracingSink,
};
use stress_bench_probes::build_probe;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

mod cli;

use cli::{Cli, Commands, RunArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Validate { config } => validate(&config),
    }
}

fn validate(path: &std::path::Path) -> Result<()> {
    let config = RunConfig::from_path(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("{} is not a valid run configuration", path.display()))?;

    println!("{} is valid", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args.run_config()?;
    config.validate().context("invalid run configuration")?;

    let probe = build_probe(args.probe, &args.probe_options())?;

    let events = Arc::new(BroadcastSink::default());
    let mut rx = events.subscribe();
    // In text mode log events go through tracing; JSON mode prints everything itself
    let sink: Arc<dyn EventSink> = if args.json {
        events.clone()
    } else {
        Arc::new(FanoutSink::new().with(Arc::new(TracingSink)).with(events.clone()))
    };

    let controller = ControllerBuilder::new()
        .probe(probe)
        .sink(sink)
        .settings(args.controller_config())
        .build()?;

    controller.start(config)?;
    let signal = tokio::spawn(stop_on_ctrl_c(controller.clone()));

    let idle = controller.wait_idle();
    tokio::pin!(idle);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => print_event(&event, args.json),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut idle => break,
        }
    }

    // Flush whatever the run published before going idle
    loop {
        match rx.try_recv() {
            Ok(event) => print_event(&event, args.json),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    signal.abort();

    if !args.json {
        print_summary(&controller.status());
    }
    Ok(())
}

async fn stop_on_ctrl_c(controller: Controller) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        if let Err(e) = controller.stop() {
            tracing::debug!(error = %e, "Stop ignored");
        }
    }
}

fn format_total(total: Budget) -> String {
    match total {
        Budget::Unbounded => UNBOUNDED_MARKER.to_string(),
        Budget::Bounded(n) => n.to_string(),
    }
}

fn print_event(event: &Event, json: bool) {
    if json {
        println!("{}", event.to_json());
        return;
    }
    // Log events are already mirrored by the tracing sink
    if let Event::Status(snapshot) = event {
        if snapshot.running {
            let stats = &snapshot.stats;
            println!(
                "sent {}/{}  success {}  failed {}",
                stats.sent,
                format_total(stats.total),
                stats.success,
                stats.failed
            );
        }
    }
}

fn print_summary(status: &StatusSnapshot) {
    let stats = &status.stats;
    println!();
    println!("Requests sent:  {}/{}", stats.sent, format_total(stats.total));
    println!("Successful:     {}", stats.success);
    println!("Failed:         {}", stats.failed);
    println!("Success rate:   {:.1}%", stats.success_rate() * 100.0);
}
