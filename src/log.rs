//! Console output for the build pipeline: the [`log!`] macro for prefixed
//! progress lines, phase banners, and a small timing helper.
//!
//! ```ignore
//! log!("js"; "generating {}", dest.display());
//! banner("J S");
//! ```

use colored::{ColoredString, Colorize};
use std::time::{Duration, Instant};

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::log::log($module, &format!($($arg)*))
    }};
}

/// Prints `[module] message` to stdout. Prefer the [`log!`] macro.
pub fn log(module: &str, message: &str) {
    println!("{} {}", prefix(module), message);
}

/// Prints a phase banner, e.g. `=== J S ===`.
pub fn banner(phase: &str) {
    println!();
    println!("{}", format!("=== {} ===", phase).bold());
}

fn prefix(module: &str) -> ColoredString {
    let bracketed = format!("[{}]", module);
    match module {
        "error" => bracketed.red().bold(),
        "watch" => bracketed.magenta().bold(),
        "clean" | "misc" => bracketed.yellow().bold(),
        "js" | "css" => bracketed.cyan().bold(),
        "html" => bracketed.green().bold(),
        _ => bracketed.blue().bold(),
    }
}

/// Formats a duration the way every log line reports it: seconds with four
/// decimal places.
pub fn seconds(elapsed: Duration) -> String {
    format!("{:.4}s", elapsed.as_secs_f64())
}

/// Runs `f` and returns its result together with its wall-clock duration.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seconds_has_four_decimals() {
        assert_eq!("1.5000s", seconds(Duration::from_millis(1500)));
    }

    #[test]
    fn test_timed_returns_result() {
        let (value, _) = timed(|| 40 + 2);
        assert_eq!(42, value);
    }
}
