//! Smart Panel Control Tool
//!
//! CLI for the board's UART command link and sysfs peripherals.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smart_panel_hw::frame::commands;
use smart_panel_hw::serial::to_hex_string;
use smart_panel_hw::{
    check_crc, pack_command, Ap3216c, Frame, FrameDecoder, Peripherals, PortSession,
    TransportEvent,
};
use std::io::Write;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

/// Delay between reconnect attempts while monitoring.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "smartpanelctl")]
#[command(about = "Control tool for the smart panel serial link and peripherals")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, default_value = "/etc/smart-panel/config.toml")]
    config: String,

    /// Serial device (overrides the configuration file)
    #[arg(short, long)]
    device: Option<String>,

    /// Baud rate (overrides the configuration file)
    #[arg(short, long)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    Ports,
    /// Print everything received on the serial port until Ctrl-C
    Monitor {
        /// Show received bytes as hex
        #[arg(long)]
        hex: bool,

        /// Decode command frames from the received stream
        #[arg(long)]
        frames: bool,

        /// Reopen the port after a link error
        #[arg(long)]
        reconnect: bool,
    },
    /// Send raw data on the serial port
    Send {
        /// Text to send, or hex bytes with --hex (e.g. "AA AA 00 02 01 01")
        data: String,

        /// Interpret data as hex bytes
        #[arg(long)]
        hex: bool,
    },
    /// Pack and send a command frame
    Command {
        /// Command code (e.g. 0x0101) or name (led-on, led-off, beep-on, beep-off)
        code: String,

        /// Payload as hex bytes
        #[arg(default_value = "")]
        payload: String,

        /// Print the frame without sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a received frame given as hex bytes
    Check {
        /// Frame bytes in hex
        frame: String,
    },
    /// System LED commands
    Led {
        #[command(subcommand)]
        action: LedCommands,
    },
    /// Beeper commands
    Beep {
        #[command(subcommand)]
        action: SwitchCommands,
    },
    /// Alarm commands
    Alarm {
        #[command(subcommand)]
        action: AlarmCommands,
    },
    /// Read the AP3216C light/proximity/IR sensor
    Sensors {
        /// Keep reading every N milliseconds
        #[arg(long)]
        watch: Option<u64>,
    },
}

#[derive(Subcommand)]
enum LedCommands {
    /// Turn the LED on
    On,
    /// Turn the LED off
    Off,
    /// Set the LED trigger (e.g. none, heartbeat)
    Trigger { mode: String },
}

#[derive(Subcommand)]
enum SwitchCommands {
    /// Switch on
    On,
    /// Switch off
    Off,
}

#[derive(Subcommand)]
enum AlarmCommands {
    /// Enable the alarm device
    On,
    /// Disable the alarm and switch the LED and beeper off
    Off,
    /// Beep a number of times
    Ring {
        /// Number of beeps
        #[arg(long, default_value = "5")]
        times: u32,

        /// Interval between beeper toggles in milliseconds
        #[arg(long, default_value = "500")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    if let Some(device) = cli.device {
        config.serial.device = device;
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }

    match cli.command {
        Commands::Ports => handle_ports(),
        Commands::Monitor {
            hex,
            frames,
            reconnect,
        } => handle_monitor(&config, hex, frames, reconnect).await,
        Commands::Send { data, hex } => handle_send(&config, &data, hex).await,
        Commands::Command {
            code,
            payload,
            dry_run,
        } => handle_command(&config, &code, &payload, dry_run).await,
        Commands::Check { frame } => handle_check(&frame),
        Commands::Led { action } => handle_led(action, &config),
        Commands::Beep { action } => handle_beep(action, &config),
        Commands::Alarm { action } => handle_alarm(action, &config).await,
        Commands::Sensors { watch } => handle_sensors(&config, watch).await,
    }
}

fn handle_ports() -> Result<()> {
    let ports = smart_panel_hw::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports available");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {}", port);
        }
    }
    Ok(())
}

/// Opens the configured port.
async fn open_session(config: &Config) -> Result<PortSession> {
    let mut session = PortSession::default();
    session.set_hex_mode(config.serial.hex_mode);
    open_configured(&mut session, config).await?;
    Ok(session)
}

async fn open_configured(session: &mut PortSession, config: &Config) -> Result<()> {
    let port_config = config
        .serial
        .port_config()
        .context("Invalid serial configuration")?;
    session
        .open(&config.serial.device, &port_config)
        .await
        .with_context(|| format!("Failed to open {}", config.serial.device))
}

async fn handle_monitor(config: &Config, hex: bool, frames: bool, reconnect: bool) -> Result<()> {
    // Subscribe first so nothing received right after the open is missed
    let mut session = PortSession::default();
    let mut events = session.subscribe();
    session.set_hex_mode(hex || config.serial.hex_mode);
    open_configured(&mut session, config).await?;
    let mut decoder = frames.then(FrameDecoder::new);

    eprintln!(
        "Monitoring {} ({}), press Ctrl-C to stop",
        config.serial.device,
        session.config()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(TransportEvent::ErrorOccurred(msg)) => {
                    eprintln!("error: {}", msg);
                    if reconnect {
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        info!("Reconnecting to {}", config.serial.device);
                        if let Some(decoder) = decoder.as_mut() {
                            decoder.reset();
                        }
                        // A failed attempt publishes another error, which retries again
                        let _ = session.reconnect().await;
                    }
                }
                Ok(event) => print_event(&event, decoder.as_mut()),
                Err(RecvError::Lagged(skipped)) => warn!("Monitor lagged, {} events dropped", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => break,
        }
    }

    session.close().await;
    eprintln!(
        "Received {} bytes, sent {} bytes",
        session.bytes_received(),
        session.bytes_sent()
    );
    Ok(())
}

fn print_event(event: &TransportEvent, decoder: Option<&mut FrameDecoder>) {
    match event {
        TransportEvent::DataReceived(data) => {
            if let Some(decoder) = decoder {
                for frame in decoder.decode_all(data) {
                    println!("{}", describe_frame(&frame));
                }
            }
        }
        TransportEvent::DataReceivedText(text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        TransportEvent::DataReceivedHex(data) => println!("{}", to_hex_string(data)),
        TransportEvent::StatusMessage(msg) => eprintln!("{}", msg),
        _ => {}
    }
}

fn describe_frame(frame: &Frame) -> String {
    format!(
        "frame cmd=0x{:04X} len={} payload=[{}]",
        frame.command,
        frame.payload.len(),
        to_hex_string(&frame.payload)
    )
}

async fn handle_send(config: &Config, data: &str, hex: bool) -> Result<()> {
    let bytes = if hex {
        parse_hex_bytes(data)?
    } else {
        data.as_bytes().to_vec()
    };

    let mut session = open_session(config).await?;
    session.send(&bytes).await.context("Failed to send data")?;
    session.close().await;
    println!("Sent {} bytes to {}", bytes.len(), config.serial.device);
    Ok(())
}

async fn handle_command(config: &Config, code: &str, payload: &str, dry_run: bool) -> Result<()> {
    let command = parse_command_code(code)?;
    let payload = parse_hex_bytes(payload)?;
    let frame = pack_command(command, &payload)?;

    if dry_run {
        println!("{}", to_hex_string(&frame));
        return Ok(());
    }

    let mut session = open_session(config).await?;
    session
        .send(&frame)
        .await
        .context("Failed to send command frame")?;
    session.close().await;
    println!("Sent command 0x{:04X}: {}", command, to_hex_string(&frame));
    Ok(())
}

fn handle_check(frame: &str) -> Result<()> {
    let bytes = parse_hex_bytes(frame)?;
    if !check_crc(&bytes) {
        let reason = Frame::decode(&bytes)
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        anyhow::bail!("Invalid frame: {}", reason);
    }
    let decoded = Frame::decode(&bytes)?;
    println!("Valid {}", describe_frame(&decoded));
    Ok(())
}

fn handle_led(action: LedCommands, config: &Config) -> Result<()> {
    let peripherals = Peripherals::new(config.peripherals.paths());
    match action {
        LedCommands::On => {
            peripherals.set_led_trigger("none")?;
            peripherals.led_on()?;
            println!("LED on");
        }
        LedCommands::Off => {
            peripherals.set_led_trigger("none")?;
            peripherals.led_off()?;
            println!("LED off");
        }
        LedCommands::Trigger { mode } => {
            peripherals.set_led_trigger(&mode)?;
            println!("LED trigger set to: {}", mode);
        }
    }

    Ok(())
}

fn handle_beep(action: SwitchCommands, config: &Config) -> Result<()> {
    let peripherals = Peripherals::new(config.peripherals.paths());
    match action {
        SwitchCommands::On => {
            peripherals.beep_on()?;
            println!("Beeper on");
        }
        SwitchCommands::Off => {
            peripherals.beep_off()?;
            println!("Beeper off");
        }
    }

    Ok(())
}

async fn handle_alarm(action: AlarmCommands, config: &Config) -> Result<()> {
    let peripherals = Peripherals::new(config.peripherals.paths());
    match action {
        AlarmCommands::On => {
            peripherals.alarm_on()?;
            println!("Alarm enabled");
        }
        AlarmCommands::Off => {
            peripherals.all_off()?;
            println!("Alarm disabled, LED and beeper off");
        }
        AlarmCommands::Ring { times, interval } => {
            tokio::select! {
                result = peripherals.sound_alarm(times, Duration::from_millis(interval)) => {
                    result?;
                    println!("Alarm finished ({} beeps)", times);
                }
                _ = tokio::signal::ctrl_c() => {
                    peripherals.beep_off()?;
                    println!("Alarm stopped");
                }
            }
        }
    }

    Ok(())
}

async fn handle_sensors(config: &Config, watch: Option<u64>) -> Result<()> {
    let sensor = Ap3216c::new(&config.peripherals.ap3216c);

    let Some(ms) = watch else {
        println!("{}", sensor.read()?);
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_millis(ms.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => match sensor.read() {
                Ok(reading) => println!("{}", reading),
                Err(e) => eprintln!("error: {}", e),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Parses hex bytes, ignoring whitespace, ':' separators and "0x" prefixes.
fn parse_hex_bytes(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|part| part.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    hex::decode(&cleaned).with_context(|| format!("Invalid hex data: {:?}", input))
}

/// Parses a command code given by name, as hex (0x prefix) or decimal.
fn parse_command_code(input: &str) -> Result<u16> {
    match input.to_lowercase().as_str() {
        "led-on" => return Ok(commands::LED_ON),
        "led-off" => return Ok(commands::LED_OFF),
        "beep-on" => return Ok(commands::BEEP_ON),
        "beep-off" => return Ok(commands::BEEP_OFF),
        _ => {}
    }

    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.with_context(|| format!("Invalid command code: {}", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(
            parse_hex_bytes("AA AA 00 02").unwrap(),
            vec![0xAA, 0xAA, 0x00, 0x02]
        );
        assert_eq!(parse_hex_bytes("0x01,0x00").unwrap(), vec![0x01, 0x00]);
        assert_eq!(parse_hex_bytes("de:ad").unwrap(), vec![0xDE, 0xAD]);
        assert!(parse_hex_bytes("").unwrap().is_empty());
        assert!(parse_hex_bytes("ABC").is_err());
        assert!(parse_hex_bytes("zz").is_err());
    }

    #[test]
    fn test_parse_command_code() {
        assert_eq!(parse_command_code("0x0101").unwrap(), 0x0101);
        assert_eq!(parse_command_code("0X0602").unwrap(), 0x0602);
        assert_eq!(parse_command_code("257").unwrap(), 0x0101);
        assert_eq!(parse_command_code("led-on").unwrap(), 0x0101);
        assert_eq!(parse_command_code("BEEP-OFF").unwrap(), 0x0602);
        assert!(parse_command_code("0x10000").is_err());
        assert!(parse_command_code("led").is_err());
    }

    #[test]
    fn test_describe_frame() {
        let frame = Frame::new(0x0101, &[0x01, 0x00]);
        assert_eq!(
            describe_frame(&frame),
            "frame cmd=0x0101 len=2 payload=[01 00]"
        );
    }
}
