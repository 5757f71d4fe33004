//! Quadrature rotary encoder decoding and tier classification.
//!
//! The decoder only counts on edges of the clock line. The data line, sampled
//! at the same instant, gives the direction: data differing from clock is a
//! clockwise detent (+1), equal levels are counter-clockwise (-1).
use cycler_traits::{BoxError, DigitalInput, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderState {
    pub last_level: Level,
    pub counter: i32,
    /// Counter wraps to 0 when its magnitude reaches this value.
    pub bound: i32,
}

impl EncoderState {
    pub fn new(initial: Level, bound: i32) -> Self {
        Self {
            last_level: initial,
            counter: 0,
            bound: bound.max(1),
        }
    }
}

/// Advance the decoder by one sample of the clock and data lines.
///
/// A sample with no clock edge returns the state unchanged. Reaching the bound
/// in either direction resets the counter to 0, so a single detent can jump
/// the classified tier from High or Low straight back to Mid.
#[must_use]
pub fn decode(clk: Level, dt: Level, state: EncoderState) -> EncoderState {
    if clk == state.last_level {
        return state;
    }
    let step = if dt != clk { 1 } else { -1 };
    let mut counter = state.counter + step;
    if counter.abs() >= state.bound {
        counter = 0;
    }
    EncoderState {
        last_level: clk,
        counter,
        bound: state.bound,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Low,
    Mid,
    High,
}

/// `counter <= -threshold` is Low, `counter >= threshold` is High, anything
/// strictly between is Mid.
#[inline]
pub fn classify(counter: i32, threshold: i32) -> Tier {
    if counter <= -threshold {
        Tier::Low
    } else if counter < threshold {
        Tier::Mid
    } else {
        Tier::High
    }
}

/// One value per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierValues<T> {
    pub low: T,
    pub mid: T,
    pub high: T,
}

impl<T: Copy> TierValues<T> {
    #[inline]
    pub fn select(&self, tier: Tier) -> T {
        match tier {
            Tier::Low => self.low,
            Tier::Mid => self.mid,
            Tier::High => self.high,
        }
    }
}

/// An encoder wired to two input channels.
///
/// The first sample only primes the last clock level; counting starts on the
/// first edge after that.
#[derive(Debug, Clone)]
pub struct Encoder {
    clk: u8,
    dt: u8,
    bound: i32,
    state: Option<EncoderState>,
}

impl Encoder {
    pub fn new(clk: u8, dt: u8, bound: i32) -> Self {
        Self {
            clk,
            dt,
            bound,
            state: None,
        }
    }

    pub fn counter(&self) -> i32 {
        self.state.map_or(0, |s| s.counter)
    }

    /// Sample both lines. Returns the new counter when it changed.
    pub fn poll<I: DigitalInput + ?Sized>(&mut self, inputs: &mut I) -> Result<Option<i32>, BoxError> {
        let clk = inputs.read(self.clk)?;
        let Some(prev) = self.state else {
            self.state = Some(EncoderState::new(clk, self.bound));
            return Ok(None);
        };
        if clk == prev.last_level {
            return Ok(None);
        }
        let dt = inputs.read(self.dt)?;
        let next = decode(clk, dt, prev);
        self.state = Some(next);
        Ok((next.counter != prev.counter).then_some(next.counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(state: EncoderState, clockwise: bool) -> EncoderState {
        let clk = match state.last_level {
            Level::High => Level::Low,
            Level::Low => Level::High,
        };
        let dt = if clockwise {
            match clk {
                Level::High => Level::Low,
                Level::Low => Level::High,
            }
        } else {
            clk
        };
        decode(clk, dt, state)
    }

    #[test]
    fn no_edge_means_no_change() {
        let s = EncoderState::new(Level::High, 40);
        assert_eq!(decode(Level::High, Level::Low, s), s);
    }

    #[test]
    fn direction_follows_data_line() {
        let s = EncoderState::new(Level::High, 40);
        assert_eq!(decode(Level::Low, Level::High, s).counter, 1);
        assert_eq!(decode(Level::Low, Level::Low, s).counter, -1);
    }

    #[test]
    fn wraps_to_zero_at_bound() {
        let mut s = EncoderState::new(Level::High, 40);
        for _ in 0..39 {
            s = turn(s, true);
        }
        assert_eq!(s.counter, 39);
        assert_eq!(classify(s.counter, 10), Tier::High);
        s = turn(s, true);
        assert_eq!(s.counter, 0);
        assert_eq!(classify(s.counter, 10), Tier::Mid);

        for _ in 0..40 {
            s = turn(s, false);
        }
        assert_eq!(s.counter, 0);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(-10, 10), Tier::Low);
        assert_eq!(classify(-9, 10), Tier::Mid);
        assert_eq!(classify(9, 10), Tier::Mid);
        assert_eq!(classify(10, 10), Tier::High);
    }
}
