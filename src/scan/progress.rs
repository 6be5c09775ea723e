/// Progress of one scan.
///
/// `total_frames` is `None` when the source did not report a positive frame
/// count; the percentage is then unknown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanProgress {
    pub frames_processed: u64,
    pub total_frames: Option<u64>,
}

impl ScanProgress {
    pub fn new(frames_processed: u64, total_frames: Option<u64>) -> Self {
        Self {
            frames_processed,
            total_frames: total_frames.filter(|n| *n > 0),
        }
    }

    /// `floor(processed / total * 100)`, capped at 100.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total_frames?;
        let percent = (self.frames_processed as u128 * 100) / total as u128;
        Some(percent.min(100) as u8)
    }
}

impl std::fmt::Display for ScanProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.percent(), self.total_frames) {
            (Some(percent), Some(total)) => {
                write!(f, "{}/{} frames ({}%)", self.frames_processed, total, percent)
            }
            _ => write!(f, "{} frames", self.frames_processed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_floors() {
        assert_eq!(ScanProgress::new(25, Some(50)).percent(), Some(50));
        assert_eq!(ScanProgress::new(1, Some(3)).percent(), Some(33));
        assert_eq!(ScanProgress::new(2, Some(3)).percent(), Some(66));
        assert_eq!(ScanProgress::new(50, Some(50)).percent(), Some(100));
    }

    #[test]
    fn zero_or_missing_total_is_unknown() {
        assert_eq!(ScanProgress::new(10, Some(0)).percent(), None);
        assert_eq!(ScanProgress::new(10, None).percent(), None);
        assert_eq!(ScanProgress::new(10, Some(0)).to_string(), "10 frames");
    }

    #[test]
    fn over_reported_frames_cap_at_100() {
        assert_eq!(ScanProgress::new(12, Some(10)).percent(), Some(100));
        assert_eq!(
            ScanProgress::new(u64::MAX, Some(1)).percent(),
            Some(100)
        );
        assert_eq!(ScanProgress::new(5, Some(10)).to_string(), "5/10 frames (50%)");
    }
}
