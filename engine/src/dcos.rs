//! Directional-change / overshoot detector.
//!
//! Classifies every new [`Price`] into an intrinsic event:
//! - a **directional change** (DC) once the price retraces from its running
//!   extreme by at least the DC threshold, which flips the expected direction;
//! - an **overshoot** (OS) each time the price extends past the last reference
//!   by at least the OS size, without changing the direction.
//!
//! While expecting an upward DC the detector tracks the lowest ask; while
//! expecting a downward DC it tracks the highest bid. Price distances are
//! either log returns or raw differences, fixed per instance by [`Moves`].

use crate::price::Price;

/// Direction of the next expected directional change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Expecting an upward DC (+1).
    Up,
    /// Expecting a downward DC (-1).
    Down,
}

impl Mode {
    pub fn sign(self) -> i8 {
        match self {
            Mode::Up => 1,
            Mode::Down => -1,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Mode::Up => Mode::Down,
            Mode::Down => Mode::Up,
        }
    }
}

/// How a price move between two levels is measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Moves {
    /// `ln(a / b)`
    Relative,
    /// `a - b`
    Absolute,
}

impl Moves {
    /// Signed move from `b` to `a`.
    #[inline]
    pub fn delta(self, a: f64, b: f64) -> f64 {
        match self {
            Moves::Relative => (a / b).ln(),
            Moves::Absolute => a - b,
        }
    }
}

/// Intrinsic event produced by one observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    None,
    DcUp,
    DcDown,
    OsUp,
    OsDown,
}

impl Event {
    /// Signed event code: ±1 for a DC, ±2 for an OS, 0 otherwise.
    pub fn code(self) -> i8 {
        match self {
            Event::None => 0,
            Event::DcUp => 1,
            Event::DcDown => -1,
            Event::OsUp => 2,
            Event::OsDown => -2,
        }
    }

    pub fn is_directional_change(self) -> bool {
        matches!(self, Event::DcUp | Event::DcDown)
    }

    pub fn is_overshoot(self) -> bool {
        matches!(self, Event::OsUp | Event::OsDown)
    }
}

/// DC thresholds and OS sizes, all strictly positive.
///
/// In relative mode `0.01` is 1%.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub dc_up: f64,
    pub dc_down: f64,
    pub os_up: f64,
    pub os_down: f64,
}

impl Thresholds {
    /// Same size for both directions and for overshoots.
    pub fn symmetric(threshold: f64) -> Self {
        Self {
            dc_up: threshold,
            dc_down: threshold,
            os_up: threshold,
            os_down: threshold,
        }
    }
}

/// Directional-change / overshoot state for one asset.
#[derive(Clone, Debug)]
pub struct DcOs {
    thresholds: Thresholds,
    moves: Moves,
    mode: Mode,
    initialized: bool,

    extreme: f64,
    prev_extreme: f64,
    reference: f64,
    latest_dc_price: f64,
    prev_dc_price: f64,

    /// Length of the overshoot that ended at the latest DC.
    os_len: f64,
}

impl DcOs {
    /// Detector that seeds itself from the first observed price.
    pub fn new(thresholds: Thresholds, initial_mode: Mode, moves: Moves) -> Self {
        Self {
            thresholds,
            moves,
            mode: initial_mode,
            initialized: false,
            extreme: 0.0,
            prev_extreme: 0.0,
            reference: 0.0,
            latest_dc_price: 0.0,
            prev_dc_price: 0.0,
            os_len: 0.0,
        }
    }

    /// Detector seeded from `init` instead of waiting for the first observation.
    pub fn with_initial_price(
        thresholds: Thresholds,
        initial_mode: Mode,
        moves: Moves,
        init: &Price,
    ) -> Self {
        let mut dcos = Self::new(thresholds, initial_mode, moves);
        dcos.seed(init);
        dcos
    }

    fn seed(&mut self, price: &Price) {
        let level = match self.mode {
            Mode::Up => price.ask,
            Mode::Down => price.bid,
        };
        self.initialized = true;
        self.extreme = level;
        self.prev_extreme = level;
        self.reference = level;
        self.prev_dc_price = level;
        self.latest_dc_price = level;
    }

    /// Feeds one price and returns the intrinsic event it triggers.
    pub fn run(&mut self, price: &Price) -> Event {
        if !self.initialized {
            self.seed(price);
            return Event::None;
        }

        match self.mode {
            Mode::Up => {
                if price.ask < self.extreme {
                    self.extreme = price.ask;
                    if -self.moves.delta(self.extreme, self.reference) >= self.thresholds.os_down {
                        self.reference = self.extreme;
                        return Event::OsDown;
                    }
                    return Event::None;
                }
                if self.moves.delta(price.bid, self.extreme) >= self.thresholds.dc_up {
                    self.os_len = -self.moves.delta(self.extreme, self.latest_dc_price);
                    self.register_dc(price.bid);
                    return Event::DcUp;
                }
            }
            Mode::Down => {
                if price.bid > self.extreme {
                    self.extreme = price.bid;
                    if self.moves.delta(self.extreme, self.reference) >= self.thresholds.os_up {
                        self.reference = self.extreme;
                        return Event::OsUp;
                    }
                    return Event::None;
                }
                if -self.moves.delta(price.ask, self.extreme) >= self.thresholds.dc_down {
                    self.os_len = self.moves.delta(self.extreme, self.latest_dc_price);
                    self.register_dc(price.ask);
                    return Event::DcDown;
                }
            }
        }

        Event::None
    }

    fn register_dc(&mut self, level: f64) {
        self.prev_dc_price = self.latest_dc_price;
        self.latest_dc_price = level;
        self.prev_extreme = self.extreme;
        self.extreme = level;
        self.reference = level;
        self.mode = self.mode.flipped();
    }

    /// Squared deviation of the latest overshoot length from its threshold.
    ///
    /// Read right after a DC, when `mode` already points at the next expected
    /// direction; the threshold is picked from that post-flip mode.
    pub fn sqrt_os_deviation(&self) -> f64 {
        let threshold = match self.mode {
            Mode::Up => self.thresholds.dc_up,
            Mode::Down => self.thresholds.dc_down,
        };
        (self.os_len - threshold).powi(2)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn extreme(&self) -> f64 {
        self.extreme
    }

    pub fn prev_extreme(&self) -> f64 {
        self.prev_extreme
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn latest_dc_price(&self) -> f64 {
        self.latest_dc_price
    }

    pub fn prev_dc_price(&self) -> f64 {
        self.prev_dc_price
    }

    pub fn os_len(&self) -> f64 {
        self.os_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flat(p: f64, t: i64) -> Price {
        Price::new(p, p, t)
    }

    #[test]
    fn first_observation_seeds_from_ask_when_expecting_up() {
        let mut d = DcOs::new(Thresholds::symmetric(0.01), Mode::Up, Moves::Relative);
        let e = d.run(&Price::new(99.0, 101.0, 0));

        assert_eq!(e, Event::None);
        assert!(d.is_initialized());
        assert_eq!(d.extreme(), 101.0);
        assert_eq!(d.reference(), 101.0);
        assert_eq!(d.latest_dc_price(), 101.0);
    }

    #[test]
    fn first_observation_seeds_from_bid_when_expecting_down() {
        let mut d = DcOs::new(Thresholds::symmetric(0.01), Mode::Down, Moves::Relative);
        d.run(&Price::new(99.0, 101.0, 0));

        assert_eq!(d.extreme(), 99.0);
        assert_eq!(d.prev_dc_price(), 99.0);
    }

    #[test]
    fn relative_overshoot_then_directional_change() {
        let mut d = DcOs::new(Thresholds::symmetric(0.01), Mode::Up, Moves::Relative);

        assert_eq!(d.run(&flat(100.0, 0)), Event::None);

        // -ln(99/100) = 0.01005 >= 0.01
        assert_eq!(d.run(&flat(99.0, 1)), Event::OsDown);
        assert_eq!(d.reference(), 99.0);
        assert_eq!(d.mode(), Mode::Up);

        // ln(100.5/99) = 0.01504 >= 0.01
        assert_eq!(d.run(&flat(100.5, 2)), Event::DcUp);
        assert_eq!(d.mode(), Mode::Down);
        assert_eq!(d.extreme(), 100.5);
        assert_eq!(d.reference(), 100.5);
        assert_eq!(d.prev_extreme(), 99.0);
        assert_eq!(d.latest_dc_price(), 100.5);
        assert_eq!(d.prev_dc_price(), 100.0);

        let expected_os = -(99.0f64 / 100.0).ln();
        assert!((d.os_len() - expected_os).abs() < 1e-15);

        // mode is Down after the flip, so the down threshold is charged.
        let dev = (expected_os - 0.01).powi(2);
        assert!((d.sqrt_os_deviation() - dev).abs() < 1e-18);
    }

    #[test]
    fn small_moves_produce_no_event() {
        let mut d = DcOs::new(Thresholds::symmetric(0.01), Mode::Up, Moves::Relative);
        d.run(&flat(100.0, 0));

        assert_eq!(d.run(&flat(99.5, 1)), Event::None);
        assert_eq!(d.extreme(), 99.5);
        assert_eq!(d.run(&flat(100.2, 2)), Event::None);
        assert_eq!(d.extreme(), 99.5);
        assert_eq!(d.mode(), Mode::Up);
    }

    #[test]
    fn absolute_mode_uses_raw_differences() {
        let mut d = DcOs::new(Thresholds::symmetric(0.5), Mode::Down, Moves::Absolute);

        assert_eq!(d.run(&flat(10.0, 0)), Event::None);
        assert_eq!(d.run(&flat(10.3, 1)), Event::None);
        assert_eq!(d.extreme(), 10.3);
        assert_eq!(d.run(&flat(10.6, 2)), Event::OsUp);
        assert_eq!(d.mode(), Mode::Down);

        assert_eq!(d.run(&flat(10.0, 3)), Event::DcDown);
        assert_eq!(d.mode(), Mode::Up);
        assert!((d.os_len() - 0.6).abs() < 1e-9);
        assert_eq!(d.extreme(), 10.0);
    }

    #[test]
    fn down_dc_triggers_on_ask_and_up_dc_on_bid() {
        let mut d = DcOs::new(Thresholds::symmetric(0.01), Mode::Down, Moves::Relative);
        d.run(&Price::new(100.0, 100.02, 0));

        // bid stays below extreme, ask falls more than 1% under it
        assert_eq!(d.run(&Price::new(98.9, 98.95, 1)), Event::DcDown);
        assert_eq!(d.latest_dc_price(), 98.95);

        // ask now tracked as the running minimum, bid triggers the up DC
        assert_eq!(d.run(&Price::new(100.0, 100.1, 2)), Event::DcUp);
        assert_eq!(d.latest_dc_price(), 100.0);
    }

    #[test]
    fn seeded_constructor_skips_warmup() {
        let init = flat(100.0, 0);
        let mut d = DcOs::with_initial_price(
            Thresholds::symmetric(0.01),
            Mode::Up,
            Moves::Relative,
            &init,
        );
        assert!(d.is_initialized());
        assert_eq!(d.run(&flat(98.0, 1)), Event::OsDown);
    }

    #[test]
    fn event_codes() {
        assert_eq!(Event::None.code(), 0);
        assert_eq!(Event::DcUp.code(), 1);
        assert_eq!(Event::DcDown.code(), -1);
        assert_eq!(Event::OsUp.code(), 2);
        assert_eq!(Event::OsDown.code(), -2);
        assert!(Event::DcDown.is_directional_change());
        assert!(Event::OsUp.is_overshoot());
        assert_eq!(Mode::Up.sign(), 1);
        assert_eq!(Mode::Down.sign(), -1);
    }

    fn walk() -> impl Strategy<Value = Vec<(f64, f64)>> {
        // (log step, half spread)
        prop::collection::vec((-0.004f64..0.004, 0.0f64..0.0002), 1..400)
    }

    fn prices(steps: &[(f64, f64)]) -> Vec<Price> {
        let mut mid = 1.1f64;
        steps
            .iter()
            .enumerate()
            .map(|(i, (step, half))| {
                mid *= step.exp();
                Price::new(mid - half, mid + half, i as i64)
            })
            .collect()
    }

    proptest! {
        #[test]
        fn overshoots_never_flip_mode_and_dcs_always_do(
            steps in walk(),
            relative in any::<bool>(),
        ) {
            let moves = if relative { Moves::Relative } else { Moves::Absolute };
            let threshold = 0.002;
            let mut d = DcOs::new(Thresholds::symmetric(threshold), Mode::Down, moves);

            for p in prices(&steps) {
                let before = d.mode();
                let extreme_before = d.extreme();
                let event = d.run(&p);

                match event {
                    Event::DcUp => {
                        prop_assert_eq!(before, Mode::Up);
                        prop_assert_eq!(d.mode(), Mode::Down);
                        prop_assert!(moves.delta(p.bid, extreme_before) >= threshold);
                        prop_assert_eq!(d.reference(), p.bid);
                    }
                    Event::DcDown => {
                        prop_assert_eq!(before, Mode::Down);
                        prop_assert_eq!(d.mode(), Mode::Up);
                        prop_assert!(-moves.delta(p.ask, extreme_before) >= threshold);
                        prop_assert_eq!(d.reference(), p.ask);
                    }
                    Event::OsUp | Event::OsDown | Event::None => {
                        prop_assert_eq!(before, d.mode());
                        match d.mode() {
                            Mode::Up => prop_assert!(d.extreme() <= p.ask),
                            Mode::Down => prop_assert!(d.extreme() >= p.bid),
                        }
                    }
                }
                prop_assert!(d.sqrt_os_deviation() >= 0.0);
            }
        }

        #[test]
        fn replay_is_deterministic(steps in walk()) {
            let series = prices(&steps);
            let mut a = DcOs::new(Thresholds::symmetric(0.001), Mode::Down, Moves::Relative);
            let mut b = a.clone();

            let ea: Vec<Event> = series.iter().map(|p| a.run(p)).collect();
            let eb: Vec<Event> = series.iter().map(|p| b.run(p)).collect();
            prop_assert_eq!(ea, eb);
        }
    }
}
