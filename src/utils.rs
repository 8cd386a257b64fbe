const UNIT_STEP: f64 = 1024.0;
const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Human readable binary size: whole bytes below one KiB, two decimals above.
pub fn pretty_bytes_size(len: u64) -> String {
    if (len as f64) < UNIT_STEP {
        return format!("{len} bytes");
    }
    let mut value = len as f64 / UNIT_STEP;
    let mut unit = UNITS[0];
    for &next_unit in &UNITS[1..] {
        if value < UNIT_STEP {
            break;
        }
        value /= UNIT_STEP;
        unit = next_unit;
    }
    format!("{value:.2}{unit}")
}

#[cfg(test)]
mod tests {
    use super::pretty_bytes_size;

    #[test]
    fn small_sizes_stay_in_bytes() {
        assert_eq!(pretty_bytes_size(0), "0 bytes");
        assert_eq!(pretty_bytes_size(1023), "1023 bytes");
        assert_eq!(pretty_bytes_size(1024), "1.00KiB");
    }

    #[test]
    fn binary_units() {
        assert_eq!(pretty_bytes_size(1_200), "1.17KiB");
        assert_eq!(pretty_bytes_size(1_200_000), "1.14MiB");
        assert_eq!(pretty_bytes_size(1_200_000_000), "1.12GiB");
        assert_eq!(pretty_bytes_size(3 * 1024u64.pow(4)), "3.00TiB");
    }

    #[test]
    fn saturated_total() {
        assert_eq!(pretty_bytes_size(u64::MAX), "16.00EiB");
    }
}
