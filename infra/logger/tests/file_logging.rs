use larp_logger::{LevelFilter, Logger, Rotation};
use std::fs;
use std::time::Duration;

#[test]
fn json_file_logging_writes_lines() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("logs");

    let logger = Logger::builder()
        .name("larp-file-logging")
        .console(false)
        .level(LevelFilter::INFO)
        .path(&dir)
        .rotation(Rotation::NEVER)
        .json(true)
        .init()?;
    assert!(logger.writes_files());

    tracing::info!(character = "c-1", "purchase applied");
    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let file = fs::read_dir(&dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .expect("a log file should exist");

    let contents = fs::read_to_string(file)?;
    let line = contents.lines().find(|l| l.contains("purchase applied")).expect("logged line");
    assert!(line.starts_with('{'), "file lines should be JSON: {line}");
    assert!(line.contains("\"character\":\"c-1\""));
    Ok(())
}
