use chrono::Duration;

/// Renders a duration as `1d 2h 3m 4s`, omitting zero units.
pub fn describe_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let mut rest = total.unsigned_abs();
    let mut parts = Vec::new();
    for (unit, size) in [("d", 86_400u64), ("h", 3_600), ("m", 60), ("s", 1)] {
        let count = rest / size;
        rest %= size;
        if count > 0 {
            parts.push(format!("{}{}", count, unit));
        }
    }
    if parts.is_empty() {
        return "0s".to_string();
    }
    format!("{}{}", sign, parts.join(" "))
}
