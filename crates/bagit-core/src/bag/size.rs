//! `Bag-Size` formatting.

const ONE_KB: u64 = 1024;
const ONE_MB: u64 = ONE_KB * ONE_KB;
const ONE_GB: u64 = ONE_KB * ONE_MB;

/// Human-readable size for the `Bag-Size` field: whole units, 1024-based,
/// rounded down (`999 bytes`, `1 KB`, `3 MB`).
pub fn display_size(bytes: u64) -> String {
    if bytes >= ONE_GB {
        format!("{} GB", bytes / ONE_GB)
    } else if bytes >= ONE_MB {
        format!("{} MB", bytes / ONE_MB)
    } else if bytes >= ONE_KB {
        format!("{} KB", bytes / ONE_KB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_down_to_whole_units() {
        assert_eq!(display_size(0), "0 bytes");
        assert_eq!(display_size(10), "10 bytes");
        assert_eq!(display_size(1023), "1023 bytes");
        assert_eq!(display_size(1024), "1 KB");
        assert_eq!(display_size(2047), "1 KB");
        assert_eq!(display_size(5 * ONE_MB + 1), "5 MB");
        assert_eq!(display_size(3 * ONE_GB), "3 GB");
    }
}
