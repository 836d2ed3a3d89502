use std::time::Duration;

use log_dispatch::{Field, FileConfig, FileSink, JsonFormatter, Logger, RotationPolicy};

fn main() -> log_dispatch::Result<()> {
    let dir = std::env::temp_dir().join("log-dispatch-rotating");
    let config = FileConfig::new(dir.join("app.log"))
        .rotation(RotationPolicy {
            max_size: 16 * 1024,
            max_age: Some(Duration::from_secs(24 * 60 * 60)),
            max_backups: 3,
            ..Default::default()
        })
        .formatter(JsonFormatter::default());
    let file = FileSink::open(config)?;
    println!("writing to {}", file.path().display());

    let logger = Logger::builder()
        .sink(file)
        .field(Field::str("service", "rotating-example"))
        .caller(true)
        .build();

    for i in 0..2_000 {
        logger.info("request served", &[Field::int("request", i), Field::uint("bytes", 512)]);
    }
    logger.close()
}
