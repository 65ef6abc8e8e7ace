//! Pass timing.
//!
//! This module provides facilities for timing the execution of individual
//! processing passes.

use core::any::Any;
use core::cell::{Cell, RefCell};
use core::fmt;
use std::time::{Duration, Instant};

// Each pass that can be timed is predefined with the `define_passes!` macro.
// Each pass has a snake_case name and a plain text description used when
// printing out the timing report.
//
// This macro defines:
//
// - A C-style enum containing all the pass names and a `None` variant.
// - A usize constant with the number of defined passes.
// - A const array of pass descriptions.
// - A public function per pass used to start the timing of that pass.
macro_rules! define_passes {
    ($($pass:ident: $desc:expr,)+) => {
        /// A single profiled pass.
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum Pass {
            $(#[doc=$desc] $pass,)+
            /// No active pass.
            None,
        }

        /// The amount of profiled passes.
        pub const NUM_PASSES: usize = Pass::None as usize;

        const DESCRIPTIONS: [&str; NUM_PASSES] = [ $($desc),+ ];

        $(
            #[doc=$desc]
            #[must_use]
            pub fn $pass() -> Box<dyn Any> {
                start_pass(Pass::$pass)
            }
        )+
    }
}

// Pass definitions.
define_passes! {
    process_file: "Processing input file",
    parse_text: "Parsing WebAssembly text",
    parse_binary: "Decoding WebAssembly binary",
    dce: "Dead code elimination",
    other_pass: "Other passes",
    write_binary: "Encoding WebAssembly binary",
    write_text: "Rendering WebAssembly text",
    validate: "Validating output",
}

impl Pass {
    fn idx(self) -> usize {
        self as usize
    }

    /// Description of the pass.
    pub fn description(self) -> &'static str {
        match DESCRIPTIONS.get(self.idx()) {
            Some(s) => s,
            None => "<no pass>",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Accumulated timing for all passes.
#[derive(Default, Clone)]
pub struct PassTimes {
    totals: [Duration; NUM_PASSES],
}

impl PassTimes {
    /// Add `other`'s times into this set, e.g. to merge per-thread reports.
    pub fn add(&mut self, other: &Self) {
        for (mine, theirs) in self.totals.iter_mut().zip(&other.totals) {
            *mine += *theirs;
        }
    }

    /// The total time spent in all passes.
    pub fn total(&self) -> Duration {
        self.totals.iter().sum()
    }
}

impl fmt::Display for PassTimes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "========  ==================================")?;
        writeln!(f, "   Total  Pass")?;
        writeln!(f, "--------  ----------------------------------")?;
        for (idx, total) in self.totals.iter().enumerate() {
            if *total == Duration::ZERO {
                continue;
            }
            writeln!(
                f,
                "{:4}.{:03}  {}",
                total.as_secs(),
                total.subsec_millis(),
                DESCRIPTIONS[idx]
            )?;
        }
        writeln!(f, "========  ==================================")
    }
}

thread_local! {
    static CURRENT_PASS: Cell<Pass> = const { Cell::new(Pass::None) };
    static PASS_TIME: RefCell<PassTimes> = RefCell::new(PassTimes::default());
}

/// Start timing `pass` on this thread.
///
/// Returns a token which, when dropped, charges the elapsed time to the pass.
/// Multiple passes can be active at the same time, but they must be started
/// and stopped in a LIFO fashion.
pub fn start_pass(pass: Pass) -> Box<dyn Any> {
    let prev = CURRENT_PASS.with(|p| p.replace(pass));
    log::debug!("timing: starting {}, (during {})", pass, prev);
    Box::new(TimingToken {
        start: Instant::now(),
        pass,
        prev,
    })
}

/// A timing token, charging its pass on drop.
struct TimingToken {
    start: Instant,
    pass: Pass,
    prev: Pass,
}

impl Drop for TimingToken {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        log::debug!("timing: ending {}: {}ms", self.pass, duration.as_millis());
        CURRENT_PASS.with(|p| p.set(self.prev));
        PASS_TIME.with(|t| t.borrow_mut().totals[self.pass.idx()] += duration);
    }
}

/// Take this thread's accumulated pass timings, resetting them to zero.
pub fn take_current() -> PassTimes {
    PASS_TIME.with(|t| core::mem::take(&mut *t.borrow_mut()))
}
