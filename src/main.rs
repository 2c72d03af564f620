use color_eyre::{eyre::eyre, Result};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, reload, Registry};
use xserialone::config::BridgeConfig;
use xserialone::generators::GamepadGenerator;
use xserialone::modifiers::{feed_lines, OverrideSender};
use xserialone::observer::{log_samples, FrameTap};
use xserialone::pipeline::{Configuring, Pipeline, PipelineHandle};
use xserialone::transport;

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = setup()?;

    let config_path = BridgeConfig::default_path();
    BridgeConfig::ensure_default(&config_path).await?;
    let config = BridgeConfig::load(&config_path).await?;
    log_level
        .reload(LevelFilter::from_level(config.log_level()?))
        .map_err(|e| eyre!("Failed to apply log level: {}", e))?;
    info!("Using configuration {}", config_path.display());

    let mut pipeline = Pipeline::create(config.pipeline_settings());

    match GamepadGenerator::create(config.gamepad.index) {
        Ok(generator) => {
            match generator.active_gamepad() {
                Some(id) => info!("Reading input from gamepad {}", id),
                None => info!("Waiting for a gamepad to connect"),
            }
            pipeline.add_generator(Box::new(generator));
        }
        Err(e) => warn!("Running without gamepad input: {}", e),
    }

    let (modifiers, override_sender) = config.build_modifiers();
    for modifier in modifiers {
        pipeline.add_modifier(modifier);
    }

    setup_transport(&config, &mut pipeline)?;

    if config.trace_frames {
        let (tap, rx) = FrameTap::new(config.pipeline.observer_capacity);
        tap.attach(&mut pipeline);
        tokio::spawn(log_samples(rx));
    }

    if let Some(sender) = override_sender {
        spawn_override_source(&config, sender);
    }

    let mut handle = PipelineHandle::spawn(pipeline.start());
    spawn_ctrl_c(handle.cancel_token());

    let stats = handle
        .join()
        .await
        .map_err(|e| eyre!("Pipeline failed: {}", e))?;
    info!(
        "Shut down after {} ticks, {} packets sent",
        stats.ticks, stats.transmits
    );
    Ok(())
}

type LogLevelHandle = reload::Handle<LevelFilter, Registry>;

fn setup() -> Result<LogLevelHandle> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(setup_logging_env())
}

// Starts at info so config loading is logged; the configured level is
// applied through the returned handle.
fn setup_logging_env() -> LogLevelHandle {
    let (filter, handle) = reload::Layer::new(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
    handle
}

fn setup_transport(config: &BridgeConfig, pipeline: &mut Pipeline<Configuring>) -> Result<()> {
    if config.serial.is_mock() {
        let ports = transport::available_ports();
        if ports.is_empty() {
            warn!("Mock mode: no serial port configured and none detected");
        } else {
            warn!(
                "Mock mode: frames are not sent. Available ports: {}",
                ports.join(", ")
            );
        }
        return Ok(());
    }

    let link = transport::open(
        &config.serial.port,
        config.serial.baud,
        config.serial.write_timeout(),
    )
    .map_err(|e| eyre!("Failed to open transport: {}", e))?;
    info!("Writing frames to {}", link.name());
    pipeline.set_transport(Box::new(link));
    Ok(())
}

fn spawn_override_source(config: &BridgeConfig, sender: OverrideSender) {
    if !config.event_override.stdin {
        info!("Event override enabled without an input source");
        return;
    }
    info!("Reading override events from stdin (left / right)");
    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        feed_lines(reader, sender).await;
    });
}

fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}
