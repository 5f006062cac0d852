use anyhow::Result;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::thread;
use std::time::Duration;

use packsync::config::{Bot, Config};
use packsync::logger::NoopLogger;
use packsync::net::run_batch;
use packsync::reconcile::{reconcile, CatalogEntry};
use packsync::store::WatermarkStore;

fn test_config(port: u16, data_dir: &Path) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: port,
        data_dir: data_dir.to_path_buf(),
        connect_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(5),
        pace: Duration::ZERO,
        ..Config::default()
    }
}

/// Read from the socket until one complete JSON object has arrived.
fn read_request(sock: &mut TcpStream) -> Result<serde_json::Value> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = sock.read(&mut buf)?;
        assert!(n > 0, "client closed before sending a full request");
        raw.extend_from_slice(&buf[..n]);
        if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&raw) {
            return Ok(v);
        }
    }
}

#[test]
fn transfer_advances_watermark() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    let server = thread::spawn(move || -> Result<()> {
        let (mut sock, _) = listener.accept()?;
        let request = read_request(&mut sock)?;
        assert_eq!(request["bot_name"], "ANSK|Laura");
        assert_eq!(request["pack_number"], "11");
        assert_eq!(request["send_progress"], true);
        assert_eq!(request["download_path"], "Laura");

        // One message split across two writes, then two messages in one.
        let progress = br#"{"status": "progress", "progress": 50, "filename": "Show - 11 (ABCD1234).mkv", "received": 500, "total": 1000}"#;
        sock.write_all(&progress[..37])?;
        sock.flush()?;
        thread::sleep(Duration::from_millis(50));
        sock.write_all(&progress[37..])?;
        let tail = br#"{"status": "progress", "progress": 100, "filename": "Show - 11 (ABCD1234).mkv", "received": 1000, "total": 1000}{"status": "success", "filename": "Show - 11 (ABCD1234).mkv", "size": 1000, "path": "/data/Laura"}"#;
        sock.write_all(tail)?;
        Ok(())
    });

    let cfg = test_config(port, tmp.path());
    let store = WatermarkStore::new(tmp.path());
    let bot = Bot::new("ANSK|Laura");
    run_batch(&cfg, &NoopLogger, &store, &bot, &["11".to_string()], true)?;
    server.join().unwrap()?;

    assert_eq!(store.get("Laura"), 11);

    // The advanced cursor narrows the next reconciliation pass.
    let catalog: Vec<CatalogEntry> = (11..=13)
        .map(|pack| CatalogEntry {
            pack,
            name: format!("Show - {} (AAAA{:04})", pack, pack),
        })
        .collect();
    let plan = reconcile(&catalog, &HashSet::new(), store.get("Laura"));
    assert_eq!(plan.pending, vec![12, 13]);
    Ok(())
}

#[test]
fn ambiguous_close_resolves_by_progress() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    // Two sessions, both closed without a terminal message: one nearly done,
    // one barely started.
    let server = thread::spawn(move || -> Result<()> {
        for progress in [95u64, 40] {
            let (mut sock, _) = listener.accept()?;
            let _ = read_request(&mut sock)?;
            let msg = format!(
                r#"{{"status": "progress", "progress": {}, "filename": "a.mkv", "received": {}, "total": 100}}"#,
                progress, progress
            );
            sock.write_all(msg.as_bytes())?;
            sock.flush()?;
            thread::sleep(Duration::from_millis(50));
            // dropped here: connection closes with no success/error message
        }
        Ok(())
    });

    let cfg = test_config(port, tmp.path());
    let store = WatermarkStore::new(tmp.path());
    let bot = Bot::new("ANSK|Laura");
    let items = vec!["21".to_string(), "22".to_string()];
    run_batch(&cfg, &NoopLogger, &store, &bot, &items, true)?;
    server.join().unwrap()?;

    // 21 resolved as complete (95% > threshold), 22 did not (40%).
    assert_eq!(store.get("Laura"), 21);
    Ok(())
}

#[test]
fn per_item_error_does_not_abort_batch() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    let server = thread::spawn(move || -> Result<()> {
        {
            let (mut sock, _) = listener.accept()?;
            let _ = read_request(&mut sock)?;
            sock.write_all(br#"{"status": "error", "message": "pack not found"}"#)?;
        }
        {
            let (mut sock, _) = listener.accept()?;
            let request = read_request(&mut sock)?;
            assert_eq!(request["pack_number"], "32");
            sock.write_all(
                br#"{"status": "success", "filename": "b.mkv", "size": 42, "path": "/data/Laura"}"#,
            )?;
        }
        Ok(())
    });

    let cfg = test_config(port, tmp.path());
    let store = WatermarkStore::new(tmp.path());
    let bot = Bot::new("ANSK|Laura");
    let items = vec!["31".to_string(), "32".to_string()];
    run_batch(&cfg, &NoopLogger, &store, &bot, &items, true)?;
    server.join().unwrap()?;

    // The not-found pack is skipped over; the cursor lands on the one that
    // completed.
    assert_eq!(store.get("Laura"), 32);
    Ok(())
}

#[test]
fn connect_failure_aborts_batch() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    // Grab a port and release it so nothing is listening there.
    let port = {
        let sock = TcpListener::bind("127.0.0.1:0")?;
        let p = sock.local_addr()?.port();
        drop(sock);
        p
    };

    let cfg = test_config(port, tmp.path());
    let store = WatermarkStore::new(tmp.path());
    let bot = Bot::new("ANSK|Laura");
    let result = run_batch(&cfg, &NoopLogger, &store, &bot, &["41".to_string()], true);
    assert!(result.is_err());
    assert_eq!(store.get("Laura"), 0);
    Ok(())
}
