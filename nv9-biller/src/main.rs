//! # NV9 Biller
//!
//! Command line tool for NV9USB bill validators connected through a serial port.
//!
//! ## Overview
//!
//! Besides printing the device information and note counters, the `run` subcommand enables
//! the validator and prints every event until interrupted with Ctrl-C, after which the
//! validator, its display and all channels are disabled again.
use std::error::Error;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_num::number_range;
use env_logger::Env;
use serialport::SerialPort;
use ssp_client::{Biller, config::Builder};
use ssp_protocol::command::ChannelMask;

type SerialBiller = Biller<Box<dyn SerialPort>>;

fn parse_channel(s: &str) -> Result<u8, String> {
    number_range(s, 0, 15)
}

#[derive(Subcommand, Eq, PartialEq, Clone)]
enum Command {
    /// Print serial number, firmware version and channel table
    Info,
    /// Print the note counters
    Counters,
    /// Reset the note counters
    ResetCounters,
    /// Accept notes and print events until Ctrl-C
    Run {
        #[arg(
            short,
            long,
            value_delimiter = ',',
            value_parser = parse_channel,
            help = "Channels to enable (0-15), all when omitted"
        )]
        channels: Vec<u8>,
        #[arg(
            short,
            long,
            help = "The poll interval in milliseconds",
            default_value = "500"
        )]
        interval_ms: u64,
    },
}

#[derive(Parser)]
#[command(about = "Driver for NV9USB bill validators", long_about=None)]
struct Args {
    /// Serial port of the validator, e.g. /dev/ttyACM0
    port: String,

    #[arg(short, long, help = "Transaction timeout in milliseconds", default_value = "1000")]
    timeout_ms: u64,

    #[arg(short, long, default_value = "9600")]
    baud_rate: u32,

    #[clap(subcommand)]
    command: Option<Command>,
}

fn print_info(biller: &SerialBiller) {
    println!("SN: {:08X}", biller.serial());
    println!("Firmware: {}", biller.firmware_version());
    for channel in biller.channels() {
        println!("Channel {}: {}", channel.index() + 1, channel);
    }
}

fn run(
    biller: &mut SerialBiller,
    mask: ChannelMask,
    interval: Duration,
    stop: &AtomicBool,
) -> Result<(), ssp_client::Error> {
    log::info!("Enabling validator with channel mask {:#06x}", mask.bits());
    biller.set_channel_mask(mask)?;
    biller.display_enable()?;
    biller.enable()?;
    println!("Done! Try to insert some notes (Ctrl+C to quit)");

    let result = (|| -> Result<(), ssp_client::Error> {
        while !stop.load(Ordering::Relaxed) {
            for event in biller.poll()? {
                println!("{}", event);
            }
            std::thread::sleep(interval);
        }
        Ok(())
    })();

    log::info!("Disabling validator");
    biller.disable()?;
    biller.display_disable()?;
    biller.set_channel_mask(ChannelMask::NONE)?;
    result
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::debug!(
        "Parsed arguments: port={}, baud_rate={}, timeout_ms={}",
        args.port,
        args.baud_rate,
        args.timeout_ms
    );

    let builder = Builder::new()
        .timeout(Duration::from_millis(args.timeout_ms))
        .baud_rate(args.baud_rate);
    log::info!("Connecting to validator on {}", args.port);
    let port = args.port.clone();
    let mut biller = tokio::task::spawn_blocking(move || builder.open(&port)).await??;

    match args.command.unwrap_or(Command::Info) {
        Command::Info => print_info(&biller),
        Command::Counters => {
            let counters = biller.counters()?;
            println!("Stacked: {}", counters.stacked);
            println!("Stored: {}", counters.stored);
            println!("Dispensed: {}", counters.dispensed);
            println!("Transferred: {}", counters.transferred);
            println!("Rejected: {}", counters.rejected);
        }
        Command::ResetCounters => {
            biller.reset_counters()?;
            println!("Counters reset");
        }
        Command::Run {
            channels,
            interval_ms,
        } => {
            print_info(&biller);
            let mask = if channels.is_empty() {
                ChannelMask::ALL
            } else {
                ChannelMask::from_channels(channels)?
            };

            let stop = Arc::new(AtomicBool::new(false));
            let poller_stop = stop.clone();
            let mut poller = tokio::task::spawn_blocking(move || {
                run(
                    &mut biller,
                    mask,
                    Duration::from_millis(interval_ms),
                    &poller_stop,
                )
            });

            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    log::info!("Interrupted");
                    stop.store(true, Ordering::Relaxed);
                    poller.await??;
                }
                result = &mut poller => result??,
            }
        }
    }
    Ok(())
}
