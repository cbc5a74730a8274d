use std::io;

use anyhow::{Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// 引数の指定からログレベルを決める。
///
/// 既定は`Info`。`quiet`が優先される。
pub fn level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// ログを標準エラー出力に色付きで出力するように設定する。
///
/// 標準出力は結果の表示に使うため、ログは標準エラー出力に出す。
pub fn init(level: LevelFilter) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
        .context("Failed to initialize logger")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;
    use rstest::rstest;

    use super::level;

    #[rstest]
    #[case::default(0, false, LevelFilter::Info)]
    #[case::verbose(1, false, LevelFilter::Debug)]
    #[case::very_verbose(3, false, LevelFilter::Trace)]
    #[case::quiet_wins(2, true, LevelFilter::Warn)]
    fn test_level(#[case] verbose: u8, #[case] quiet: bool, #[case] expected: LevelFilter) {
        assert_eq!(level(verbose, quiet), expected);
    }
}
