//! RAM from `free -b`, swap and zram from `/proc/swaps`.

use serde::Serialize;

use crate::error::SampleError;

pub const FREE_COMMAND: &str = "free -b";
pub const PROC_SWAPS_COMMAND: &str = "cat /proc/swaps";

const MEM_ROW_LABEL: &str = "Mem:";
const SWAPS_HEADER_LABEL: &str = "Filename";
const ZRAM_TOKEN: &str = "zram";

/// RAM, swap file and zram usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub ram_total: u64,
    pub ram_used: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub zram_total: u64,
    pub zram_used: u64,
}

/// Extracts `(total, used)` bytes from `free -b` output.
///
/// ```text
///               total        used        free      shared  buff/cache   available
/// Mem:     7823405056  4831297536   250458112    20480000  2741649408  2880000000
/// Swap:    4294963200   402653184  3892310016
/// ```
pub fn parse_free<S: AsRef<str>>(lines: &[S]) -> Result<(u64, u64), SampleError> {
    let line = lines
        .iter()
        .map(|l| l.as_ref().trim())
        .find(|l| l.split_whitespace().next() == Some(MEM_ROW_LABEL))
        .ok_or_else(|| SampleError::missing(FREE_COMMAND, "no Mem: row"))?;

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(SampleError::parse(
            "Mem: row",
            format!("expected at least 3 fields, got {}", parts.len()),
        ));
    }

    let total = parts[1]
        .parse::<u64>()
        .map_err(|e| SampleError::parse("ram total", format!("{:?}: {}", parts[1], e)))?;
    let used = parts[2]
        .parse::<u64>()
        .map_err(|e| SampleError::parse("ram used", format!("{:?}: {}", parts[2], e)))?;
    Ok((total, used))
}

/// One data row of `/proc/swaps`, sizes converted to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapEntry {
    pub filename: String,
    pub size_bytes: u64,
    pub used_bytes: u64,
}

impl SwapEntry {
    pub fn is_zram(&self) -> bool {
        self.filename.contains(ZRAM_TOKEN)
    }

    /// Parses a data row: `filename type size_kb used_kb priority`.
    /// Returns `Ok(None)` for the header row.
    pub fn parse_line(line: &str) -> Result<Option<Self>, SampleError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.first() {
            None => return Ok(None),
            Some(&SWAPS_HEADER_LABEL) => return Ok(None),
            Some(_) => {}
        }
        if parts.len() < 4 {
            return Err(SampleError::parse(
                "swaps row",
                format!("expected at least 4 fields, got {}", parts.len()),
            ));
        }

        let size_kb = parts[2]
            .parse::<u64>()
            .map_err(|e| SampleError::parse("swap size", format!("{:?}: {}", parts[2], e)))?;
        let used_kb = parts[3]
            .parse::<u64>()
            .map_err(|e| SampleError::parse("swap used", format!("{:?}: {}", parts[3], e)))?;

        Ok(Some(Self {
            filename: parts[0].to_string(),
            size_bytes: size_kb.saturating_mul(1024),
            used_bytes: used_kb.saturating_mul(1024),
        }))
    }
}

impl MemorySnapshot {
    /// Adds one swap area to the zram or swap file totals.
    pub fn add_swap(&mut self, entry: &SwapEntry) {
        if entry.is_zram() {
            self.zram_total = self.zram_total.saturating_add(entry.size_bytes);
            self.zram_used = self.zram_used.saturating_add(entry.used_bytes);
        } else {
            self.swap_total = self.swap_total.saturating_add(entry.size_bytes);
            self.swap_used = self.swap_used.saturating_add(entry.used_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_free() {
        let lines = [
            "              total        used        free      shared  buff/cache   available",
            "Mem:     7823405056  4831297536   250458112    20480000  2741649408  2880000000",
            "Swap:    4294963200   402653184  3892310016",
        ];
        assert_eq!(parse_free(&lines).unwrap(), (7823405056, 4831297536));
    }

    #[test]
    fn test_parse_free_missing_row() {
        let lines = ["Swap: 1 2 3"];
        assert!(matches!(
            parse_free(&lines),
            Err(SampleError::MissingOutput { .. })
        ));
    }

    #[test]
    fn test_parse_free_malformed_row() {
        assert!(parse_free(&["Mem: 100"]).is_err());
        assert!(parse_free(&["Mem: abc 100"]).is_err());
    }

    #[test]
    fn test_swap_header_is_skipped() {
        let header = "Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority";
        assert_eq!(SwapEntry::parse_line(header).unwrap(), None);
        assert_eq!(SwapEntry::parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_swap_entry_kb_to_bytes() {
        let entry = SwapEntry::parse_line("/dev/block/zram0 partition 524288 10240 -2")
            .unwrap()
            .unwrap();
        assert!(entry.is_zram());
        assert_eq!(entry.size_bytes, 536870912);
        assert_eq!(entry.used_bytes, 10485760);
    }

    #[test]
    fn test_swap_entries_accumulate_per_class() {
        let mut snap = MemorySnapshot::default();
        for line in [
            "/dev/block/zram0 partition 524288 10240 -2",
            "/dev/block/zram1 partition 524288 0 -3",
            "/data/swapfile file 1048576 20480 -1",
        ] {
            snap.add_swap(&SwapEntry::parse_line(line).unwrap().unwrap());
        }
        assert_eq!(snap.zram_total, 2 * 536870912);
        assert_eq!(snap.zram_used, 10485760);
        assert_eq!(snap.swap_total, 1073741824);
        assert_eq!(snap.swap_used, 20971520);
    }

    #[test]
    fn test_swap_row_too_short() {
        assert!(SwapEntry::parse_line("/data/swapfile file 1048576").is_err());
    }
}
