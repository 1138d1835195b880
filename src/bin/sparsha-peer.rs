//! Bench peer for SparshaIO
//!
//! Connects to the daemon's TCP listener, sends `start`, prints decoded frames
//! and sends `stop` when done.
//!
//! ```bash
//! sparsha-peer 192.168.1.20:5555 --frames 400
//! ```

use clap::Parser;
use sparsha_io::error::Result;
use sparsha_io::sampler::Frame;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "sparsha-peer", about = "Receive and decode SparshaIO frames")]
struct Args {
    /// Daemon address (host:port)
    address: String,

    /// Frames to receive before stopping
    #[arg(short, long, default_value_t = 200)]
    frames: usize,

    /// Print every Nth frame
    #[arg(long, default_value_t = 20)]
    every: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.address)?;
    log::info!("Connected to {}", args.address);
    stream.write_all(b"start\n")?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    let started = Instant::now();
    let mut received = 0usize;
    let mut malformed = 0usize;
    let every = args.every.max(1);

    while received < args.frames {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            log::warn!("Daemon closed the connection");
            break;
        }
        match Frame::parse(&line) {
            Ok(vector) => {
                if received % every == 0 {
                    let text: Vec<String> = vector.values().iter().map(|v| format!("{:.3}", v)).collect();
                    println!("#{:<6} [{}]", received, text.join(" "));
                }
                received += 1;
            }
            Err(e) => {
                malformed += 1;
                log::warn!("{}", e);
            }
        }
    }

    stream.write_all(b"stop\n")?;

    let secs = started.elapsed().as_secs_f64();
    log::info!(
        "Received {} frames ({} malformed) in {:.2}s ({:.1} Hz)",
        received,
        malformed,
        secs,
        if secs > 0.0 { received as f64 / secs } else { 0.0 }
    );
    Ok(())
}
