/// Render a byte count as a human-readable size ("1.5 MB", "312 B").
///
/// Sizes below 1 KB are shown without a fractional part; everything else
/// gets one decimal place, matching what the storage report displays.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::format_bytes;

    #[test]
    fn bytes_below_one_kilobyte_have_no_fraction() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(312), "312 B");
        assert_eq!(format_bytes(1023), "1023 B");
    }

    #[test]
    fn larger_sizes_use_one_decimal_place() {
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_bytes(1_048_576_000), "1000.0 MB");
    }

    #[test]
    fn unit_caps_at_terabytes() {
        let huge = 1024u64.pow(4) * 2048;
        assert!(format_bytes(huge).ends_with("TB"));
    }
}
