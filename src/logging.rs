use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Target};
use log::{LevelFilter, debug};

/// Installs the stderr logger at `level`. `RUST_LOG` takes precedence.
///
/// The logger itself lets every record through and the level is enforced as
/// the global max level, so [`set_level`] can still change it once the
/// configuration is known. Calling this again only adjusts the level.
pub fn init(level: LevelFilter) {
    let mut builder = Builder::new();
    match std::env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(LevelFilter::Trace),
    };

    builder
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if builder.try_init().is_err() {
        debug!("Logger already initialised");
    }
    set_level(level);
}

/// Applies the configured level, unless `RUST_LOG` governs filtering.
pub fn set_level(level: LevelFilter) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_follows_the_latest_call() {
        init(LevelFilter::Debug);
        init(LevelFilter::Warn);
        log::warn!("still logging");

        set_level(LevelFilter::Debug);
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(log::max_level(), LevelFilter::Debug);
        }
    }
}
