//! End-to-end streaming over a real loopback TCP link

use sparsha_io::config::{LinkConfig, StreamingConfig};
use sparsha_io::link::{self, Link, LinkMode};
use sparsha_io::sampler::{Frame, Sampler};
use sparsha_io::sensors::{AnalogChannel, FixedChannel};
use sparsha_io::streaming::{Mode, Supervisor, TickOutcome};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

const RAW: [i32; 4] = [0, 16384, 32767, -5];

fn loopback_config() -> LinkConfig {
    LinkConfig {
        device_path: "/nonexistent/rfcomm-test".into(),
        bind_host: "127.0.0.1".to_string(),
        port_first: 1024,
        port_last: 65535,
        write_timeout_ms: 200,
        ..LinkConfig::default()
    }
}

/// Listen on loopback and accept one client, returning both ends
fn connect_pair(running: &Arc<AtomicBool>) -> (Link, TcpStream) {
    let config = loopback_config();
    let listener = link::listen(&config).unwrap();
    let addr = listener.local_addr().unwrap();

    let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
    let link = link::accept_link(&listener, &config, running).unwrap();
    (link, client.join().unwrap())
}

fn supervisor_for(mut link: Link, running: &Arc<AtomicBool>) -> Supervisor {
    let channels = RAW
        .iter()
        .map(|&r| Box::new(FixedChannel(r)) as Box<dyn AnalogChannel>)
        .collect();
    let sampler = Sampler::new(channels, 32767);
    let (tx, rx) = crossbeam_channel::unbounded();
    link.start_inbound(tx, Arc::clone(running)).unwrap();
    Supervisor::new(sampler, link, rx, &StreamingConfig::default())
}

/// Step the supervisor until `done` holds or two seconds pass
fn step_until(supervisor: &mut Supervisor, mut done: impl FnMut(TickOutcome, &Supervisor) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let outcome = supervisor.step(Instant::now()).unwrap();
        if done(outcome, supervisor) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn start_command_streams_frames_to_peer() {
    let running = Arc::new(AtomicBool::new(true));
    let (link, mut client) = connect_pair(&running);
    assert_eq!(link.mode(), LinkMode::Accepted);
    let mut supervisor = supervisor_for(link, &running);

    // Idle until the peer asks
    assert_eq!(supervisor.step(Instant::now()).unwrap(), TickOutcome::Idle);

    client.write_all(b" START \n").unwrap();
    assert!(step_until(&mut supervisor, |outcome, _| outcome == TickOutcome::Sent));
    assert_eq!(supervisor.mode(), Mode::Streaming);

    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut reader = BufReader::new(client.try_clone().unwrap());
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "0.000;0.500;1.000;0.000\n");
    assert_eq!(Frame::parse(&line).unwrap().len(), RAW.len());

    client.write_all(b"stop").unwrap();
    assert!(step_until(&mut supervisor, |_, s| s.mode() == Mode::Idle));
}

#[test]
fn peer_disconnect_is_link_loss() {
    let running = Arc::new(AtomicBool::new(true));
    let (link, mut client) = connect_pair(&running);
    let mut supervisor = supervisor_for(link, &running);

    client.write_all(b"start\n").unwrap();
    assert!(step_until(&mut supervisor, |_, s| s.mode() == Mode::Streaming));
    drop(client);

    assert!(step_until(&mut supervisor, |outcome, _| outcome == TickOutcome::LinkLost));
    assert_eq!(supervisor.mode(), Mode::Idle);
    assert!(supervisor.link().is_closed());
}

#[test]
fn idle_peer_hangup_ends_run() {
    let running = Arc::new(AtomicBool::new(true));
    let (link, client) = connect_pair(&running);
    let mut supervisor = supervisor_for(link, &running);

    // Safety net so a missed hangup fails the assertions instead of hanging
    let r = Arc::clone(&running);
    let stopper = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        while r.load(std::sync::atomic::Ordering::Relaxed) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        r.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    drop(client);
    let started = Instant::now();
    supervisor.run(&running).unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(running.load(std::sync::atomic::Ordering::Relaxed));
    assert_eq!(supervisor.mode(), Mode::Idle);
    assert!(supervisor.link().is_closed());
    assert_eq!(supervisor.stats().link_losses, 1);
    assert_eq!(supervisor.stats().frames_sent, 0);

    running.store(false, std::sync::atomic::Ordering::Relaxed);
    stopper.join().unwrap();
}

#[test]
fn shutdown_cancels_pending_accept() {
    let running = Arc::new(AtomicBool::new(true));
    let config = loopback_config();

    let r = Arc::clone(&running);
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        r.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    let result = link::establish(&config, &running);
    assert!(matches!(result, Err(sparsha_io::Error::Shutdown)));
    stopper.join().unwrap();
}
