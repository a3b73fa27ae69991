use std::fmt;
use std::time::{Duration, Instant};

const NB_SECTIONS: usize = 7;

/// Sections of the test generation flow, for time accounting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// Anything else
    Misc,
    /// Reading files
    Read,
    /// Random pattern generation
    Rtpg,
    /// Deterministic pattern generation
    Dtpg,
    /// SAT solving, within deterministic generation
    Sat,
    /// Fault simulation
    Fsim,
    /// Pattern compaction
    Compact,
}

impl Section {
    /// All sections, in reporting order
    pub const ALL: [Section; NB_SECTIONS] = [
        Section::Misc,
        Section::Read,
        Section::Rtpg,
        Section::Dtpg,
        Section::Sat,
        Section::Fsim,
        Section::Compact,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::Misc => "misc",
            Section::Read => "read",
            Section::Rtpg => "rtpg",
            Section::Dtpg => "dtpg",
            Section::Sat => "sat",
            Section::Fsim => "fsim",
            Section::Compact => "compact",
        };
        write!(f, "{s}")
    }
}

/// Wall-clock timer accumulating time in named sections
///
/// Exactly one section is running at any time.
#[derive(Clone, Debug)]
pub struct SectionTimer {
    current: Section,
    start: Instant,
    elapsed: [Duration; NB_SECTIONS],
}

impl SectionTimer {
    /// Create a timer, running in [`Section::Misc`]
    pub fn new() -> SectionTimer {
        SectionTimer {
            current: Section::Misc,
            start: Instant::now(),
            elapsed: [Duration::ZERO; NB_SECTIONS],
        }
    }

    /// Section currently running
    pub fn current(&self) -> Section {
        self.current
    }

    /// Switch to another section, and return the one that was running
    pub fn change(&mut self, section: Section) -> Section {
        let now = Instant::now();
        self.elapsed[self.current.index()] += now - self.start;
        self.start = now;
        std::mem::replace(&mut self.current, section)
    }

    /// Time spent in a section so far
    pub fn elapsed(&self, section: Section) -> Duration {
        let mut ret = self.elapsed[section.index()];
        if section == self.current {
            ret += self.start.elapsed();
        }
        ret
    }

    /// Zero all sections
    pub fn reset(&mut self) {
        self.elapsed = [Duration::ZERO; NB_SECTIONS];
        self.start = Instant::now();
    }
}

impl Default for SectionTimer {
    fn default() -> Self {
        SectionTimer::new()
    }
}

impl fmt::Display for SectionTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in Section::ALL {
            writeln!(f, "  {:8} {:.3}s", s.to_string(), self.elapsed(s).as_secs_f64())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change() {
        let mut timer = SectionTimer::new();
        assert_eq!(timer.change(Section::Dtpg), Section::Misc);
        let prev = timer.change(Section::Sat);
        assert_eq!(prev, Section::Dtpg);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(timer.change(prev), Section::Sat);
        assert!(timer.elapsed(Section::Sat) >= Duration::from_millis(5));
        assert_eq!(timer.current(), Section::Dtpg);
        assert_eq!(timer.elapsed(Section::Compact), Duration::ZERO);
        timer.reset();
        assert!(timer.elapsed(Section::Sat) < Duration::from_millis(5));
    }
}
