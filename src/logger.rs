use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn catalog(&self, _bot: &str, _latest: u32, _pending: usize, _missed: usize) {}
    fn start(&self, _bot: &str, _pack: &str) {}
    fn done(&self, _bot: &str, _pack: &str, _filename: &str, _bytes: u64) {}
    fn error(&self, _bot: &str, _pack: &str, _last_progress: u64, _msg: &str) {}
    fn watermark(&self, _alias: &str, _seq: u32) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn catalog(&self, bot: &str, latest: u32, pending: usize, missed: usize) {
        self.line(&format!(
            "CATALOG bot={} latest={} pending={} missed={}",
            bot, latest, pending, missed
        ));
    }
    fn start(&self, bot: &str, pack: &str) {
        self.line(&format!("START bot={} pack={}", bot, pack));
    }
    fn done(&self, bot: &str, pack: &str, filename: &str, bytes: u64) {
        self.line(&format!(
            "DONE bot={} pack={} file={} bytes={}",
            bot, pack, filename, bytes
        ));
    }
    fn error(&self, bot: &str, pack: &str, last_progress: u64, msg: &str) {
        self.line(&format!(
            "ERROR bot={} pack={} progress={} msg={}",
            bot, pack, last_progress, msg
        ));
    }
    fn watermark(&self, alias: &str, seq: u32) {
        self.line(&format!("CURSOR alias={} seq={}", alias, seq));
    }
}
