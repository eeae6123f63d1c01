use crate::config::LogConfig;
use anyhow::Context;
use std::fs::OpenOptions;
use std::sync::Mutex;

/// Install the global fmt subscriber: stdout, or a dated file in `log.dir`.
pub fn init(cfg: &LogConfig) -> anyhow::Result<()> {
    let level: tracing::Level = cfg
        .level
        .parse()
        .with_context(|| format!("invalid log level {:?}", cfg.level))?;

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level);

    match &cfg.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create dir {}", dir.display()))?;
            let path = dir.join(file_name(time::OffsetDateTime::now_utc().date()));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

fn file_name(date: time::Date) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    format!("app-{}.log", date.format(&format).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(date!(2024 - 11 - 02)), "app-2024-11-02.log");
    }
}
