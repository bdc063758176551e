use std::time::Duration;

/// Compile time as shown in logs: `340ms`, `2.1s`, `1m 05s`.
///
/// ```
/// use devserve::ui::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(340)), "340ms");
/// assert_eq!(format_duration(Duration::from_millis(2140)), "2.1s");
/// assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    match duration.as_millis() {
        ms @ 0..=999 => format!("{ms}ms"),
        1_000..=59_999 => format!("{:.1}s", duration.as_secs_f64()),
        _ => {
            let secs = duration.as_secs();
            format!("{}m {:02}s", secs / 60, secs % 60)
        }
    }
}
