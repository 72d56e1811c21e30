/// A paired bid/ask observation for one asset pair.
///
/// `time_ms` is epoch milliseconds; for prices merged from independent ask and
/// bid ticks it is the later of the two tick timestamps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Price {
    pub bid: f64,
    pub ask: f64,
    pub time_ms: i64,
}

impl Price {
    pub fn new(bid: f64, ask: f64, time_ms: i64) -> Self {
        Self { bid, ask, time_ms }
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}
