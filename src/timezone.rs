use time::OffsetDateTime;

/// Formats the UTC offset in force at `instant` as `+HH:MM` or
/// `-HH:MM`. Stored next to every timestamp so the local time of the
/// event can be recovered from the UTC instant the database keeps.
pub fn derive_offset(instant: Option<OffsetDateTime>) -> Option<String> {
    let seconds = instant?.offset().whole_seconds();

    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.unsigned_abs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    Some(format!("{}{:02}:{:02}", sign, hours, minutes))
}
