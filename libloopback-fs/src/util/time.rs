use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nix::sys::time::TimeSpec;

/// Converts a `(seconds, nanoseconds)` pair relative to the epoch.
pub(crate) fn system_time_from(sec: i64, nsec: u32) -> SystemTime {
    if sec >= 0 {
        UNIX_EPOCH + Duration::new(sec as u64, nsec)
    } else {
        UNIX_EPOCH - Duration::from_secs(sec.unsigned_abs()) + Duration::from_nanos(nsec as u64)
    }
}

/// Encodes a time for `utimensat`/`futimens`; `None` becomes `UTIME_OMIT`.
pub(crate) fn to_timespec(time: Option<SystemTime>) -> TimeSpec {
    let Some(time) = time else {
        return TimeSpec::UTIME_OMIT;
    };
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => TimeSpec::from(d),
        Err(e) => {
            // before the epoch: whole seconds round down, nanoseconds stay positive
            let d = e.duration();
            let mut sec = -(d.as_secs() as i64);
            let mut nsec = d.subsec_nanos() as i64;
            if nsec > 0 {
                sec -= 1;
                nsec = 1_000_000_000 - nsec;
            }
            TimeSpec::new(sec as libc::time_t, nsec as _)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timespec_omit() {
        let ts = to_timespec(None);
        assert_eq!(ts.tv_nsec(), libc::UTIME_OMIT as _);
    }

    #[test]
    fn test_timespec_matches_system_time() {
        let t = system_time_from(1_600_000_000, 123_456_789);
        let ts = to_timespec(Some(t));
        assert_eq!(ts.tv_sec(), 1_600_000_000);
        assert_eq!(ts.tv_nsec(), 123_456_789);
    }

    #[test]
    fn test_before_epoch() {
        let t = system_time_from(-2, 250_000_000);
        let ts = to_timespec(Some(t));
        assert_eq!(ts.tv_sec(), -2);
        assert_eq!(ts.tv_nsec(), 250_000_000);
    }
}
