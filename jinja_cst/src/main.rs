use jinja_cst::{config::ParseOptions, parse_with_options};
use log::{LevelFilter, Log, Metadata, Record};
use std::{env, error::Error, fs};

/// Writes parser logs to stderr.
/// Level comes from `JINJA_CST_LOG`, e.g. `JINJA_CST_LOG=debug`, and defaults to `warn`.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}", record.level().as_str().to_lowercase(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() -> Result<(), Box<dyn Error>> {
    let level = env::var("JINJA_CST_LOG")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Warn);
    log::set_logger(&LOGGER).map_err(|error| error.to_string())?;
    log::set_max_level(level);

    let file_path = env::args().nth(1).ok_or("usage: jinja_cst <file>")?;
    let source = fs::read_to_string(&file_path)?;
    let parse = parse_with_options(
        &source,
        &ParseOptions {
            error_recovery: true,
            ..Default::default()
        },
    );

    println!("{}", parse.tree.pretty(80));
    for error in &parse.errors {
        let line = source[..error.pos].matches('\n').count() + 1;
        let column = error.pos - source[..error.pos].rfind('\n').map_or(0, |i| i + 1) + 1;
        eprintln!("{file_path}:{line}:{column}: {}", error.message());
    }
    Ok(())
}
