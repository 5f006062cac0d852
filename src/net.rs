//! Blocking transfer client for the JSON download daemon
//!
//! One TCP connection per requested pack, by protocol design: the daemon
//! expects a single request object per connection and streams status
//! messages back until it is done (or simply closes the socket).

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Instant;

use crate::config::{Bot, Config};
use crate::logger::Logger;
use crate::protocol::{scan_message, ServerMessage, TransferRequest, COMPLETE_THRESHOLD};
use crate::store::WatermarkStore;

/// Terminal state of one transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Errored,
    TimedOut,
}

/// Receive-side state for one pack transfer.
struct Session {
    buffer: Vec<u8>,
    last_progress: u64,
    filename: String,
    size: u64,
    error: Option<String>,
    bar: Option<ProgressBar>,
}

impl Session {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            last_progress: 0,
            filename: String::new(),
            size: 0,
            error: None,
            bar: None,
        }
    }

    /// Append a chunk and drain every complete message it yields. Returns a
    /// terminal outcome as soon as one is parsed.
    fn feed(&mut self, chunk: &[u8]) -> Option<Outcome> {
        self.buffer.extend_from_slice(chunk);
        while let Some(msg) = scan_message(&mut self.buffer) {
            match msg {
                ServerMessage::Downloading { .. } | ServerMessage::Unknown => {}
                ServerMessage::Progress {
                    progress,
                    filename,
                    received,
                    total,
                } => {
                    self.last_progress = progress;
                    if self.bar.is_none() && total > 0 {
                        let bar = ProgressBar::new(total);
                        bar.set_style(
                            ProgressStyle::default_bar()
                                .template("{msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})")
                                .unwrap_or_else(|_| ProgressStyle::default_bar()),
                        );
                        bar.set_message(filename.clone());
                        self.bar = Some(bar);
                    }
                    if let Some(bar) = &self.bar {
                        bar.set_position(received);
                    }
                    self.filename = filename;
                }
                ServerMessage::Success { filename, size, .. } => {
                    self.filename = filename;
                    self.size = size;
                    return Some(Outcome::Success);
                }
                ServerMessage::Error { message } => {
                    self.error = Some(message);
                    return Some(Outcome::Errored);
                }
            }
        }
        None
    }

    /// The daemon closed the connection without a terminal message. There is
    /// no final acknowledgment on clean close, so a transfer that was nearly
    /// done counts as complete.
    fn resolve_close(&self) -> Outcome {
        if self.last_progress > COMPLETE_THRESHOLD {
            Outcome::Success
        } else {
            Outcome::Errored
        }
    }

    /// No bytes arrived within the idle window.
    fn resolve_stall(&self) -> Outcome {
        if self.last_progress > COMPLETE_THRESHOLD {
            Outcome::Success
        } else {
            Outcome::TimedOut
        }
    }

    fn clear_bar(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Request every work item in order, one connection each.
///
/// A connect failure is systemic and aborts the remainder of the batch; any
/// per-item outcome does not. Successful items advance the bot's cursor when
/// `update_watermark` is set, followed by a pacing pause so the shared
/// daemon is not hammered back-to-back.
pub fn run_batch(
    cfg: &Config,
    logger: &dyn Logger,
    store: &WatermarkStore,
    bot: &Bot,
    items: &[String],
    update_watermark: bool,
) -> Result<()> {
    for (i, pack) in items.iter().enumerate() {
        logger.start(bot.name(), pack);
        if cfg.verbose {
            println!("requesting pack {} from {}", pack, bot.name());
        }
        let outcome = fetch_pack(cfg, bot, pack, logger)?;
        if outcome == Outcome::Success {
            if update_watermark {
                if let Ok(seq) = pack.parse::<u32>() {
                    store.set(bot.alias(), seq)?;
                    logger.watermark(bot.alias(), seq);
                }
            }
            if i + 1 < items.len() && !cfg.pace.is_zero() {
                thread::sleep(cfg.pace);
            }
        }
    }
    Ok(())
}

/// Run one transfer session to a terminal outcome. Only connection
/// establishment failures surface as errors.
pub fn fetch_pack(cfg: &Config, bot: &Bot, pack: &str, logger: &dyn Logger) -> Result<Outcome> {
    let endpoint = cfg.endpoint();
    let addr = endpoint
        .to_socket_addrs()
        .with_context(|| format!("resolve {}", endpoint))?
        .next()
        .ok_or_else(|| anyhow!("no address for {}", endpoint))?;
    let mut stream = TcpStream::connect_timeout(&addr, cfg.connect_timeout)
        .with_context(|| format!("connect {}", endpoint))?;
    stream
        .set_read_timeout(Some(cfg.read_timeout))
        .context("set read timeout")?;

    let request = TransferRequest {
        bot_name: bot.name().to_string(),
        pack_number: pack.to_string(),
        send_progress: true,
        download_path: bot.alias().to_string(),
    };
    let payload = serde_json::to_vec(&request).context("encode request")?;

    let mut session = Session::new();
    let outcome = match stream.write_all(&payload) {
        Ok(()) => stream_session(cfg, &mut stream, &mut session, pack),
        Err(e) => {
            eprintln!("pack {}: send failed: {}", pack, e);
            Outcome::Errored
        }
    };
    session.clear_bar();

    match outcome {
        Outcome::Success => {
            if session.size > 0 {
                println!(
                    "pack {}: complete {} ({})",
                    pack,
                    session.filename,
                    format_size(session.size)
                );
            } else {
                println!(
                    "pack {}: likely complete (progress {}%)",
                    pack, session.last_progress
                );
            }
            logger.done(bot.name(), pack, &session.filename, session.size);
        }
        Outcome::Errored => {
            let msg = session
                .error
                .clone()
                .unwrap_or_else(|| "closed without a terminal message".to_string());
            eprintln!("pack {}: failed at {}%: {}", pack, session.last_progress, msg);
            logger.error(bot.name(), pack, session.last_progress, &msg);
        }
        Outcome::TimedOut => {
            eprintln!("pack {}: stalled at {}%", pack, session.last_progress);
            logger.error(bot.name(), pack, session.last_progress, "stalled");
        }
    }
    Ok(outcome)
}

fn stream_session(
    cfg: &Config,
    stream: &mut TcpStream,
    session: &mut Session,
    pack: &str,
) -> Outcome {
    let mut chunk = [0u8; 4096];
    let mut last_activity = Instant::now();
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return session.resolve_close(),
            Ok(n) => {
                last_activity = Instant::now();
                if let Some(outcome) = session.feed(&chunk[..n]) {
                    return outcome;
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                if last_activity.elapsed() >= cfg.idle_timeout {
                    return session.resolve_stall();
                }
            }
            Err(e) => {
                eprintln!("pack {}: connection error: {}", pack, e);
                return Outcome::Errored;
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < KIB * KIB {
        format!("{:.2} KB", b / KIB)
    } else if b < KIB * KIB * KIB {
        format!("{:.2} MB", b / (KIB * KIB))
    } else {
        format!("{:.2} GB", b / (KIB * KIB * KIB))
    }
}
