//! Averaged baseline readings of one board.

use crate::register::Subchannel;

/// Physical input channel of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Ch1,
    Ch2,
}

/// Two raw 12-bit traces, one per physical channel.
///
/// Samples interleave the two converters of a channel: even indices come from
/// the positive-edge ADC, odd indices from the negative-edge ADC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    ch1: Vec<u16>,
    ch2: Vec<u16>,
}

impl Measurement {
    /// Shortest trace that still holds one sample of each subchannel.
    pub const MIN_TRACE_LEN: usize = 2;

    /// Returns None if either trace is too short to yield every mean.
    pub fn new(ch1: Vec<u16>, ch2: Vec<u16>) -> Option<Self> {
        if ch1.len() < Self::MIN_TRACE_LEN || ch2.len() < Self::MIN_TRACE_LEN {
            return None;
        }
        Some(Self { ch1, ch2 })
    }

    pub fn trace(&self, channel: Channel) -> &[u16] {
        match channel {
            Channel::Ch1 => &self.ch1,
            Channel::Ch2 => &self.ch2,
        }
    }

    pub fn trace_mean(&self, channel: Channel) -> f64 {
        mean(self.trace(channel).iter().copied())
    }

    /// Average of the two trace means; the feedback of the common registers.
    pub fn mean_of_traces(&self) -> f64 {
        (self.trace_mean(Channel::Ch1) + self.trace_mean(Channel::Ch2)) / 2.0
    }

    pub fn subchannel_mean(&self, sub: Subchannel) -> f64 {
        let (trace, parity) = match sub {
            Subchannel::Ch1Positive => (&self.ch1, 0),
            Subchannel::Ch1Negative => (&self.ch1, 1),
            Subchannel::Ch2Positive => (&self.ch2, 0),
            Subchannel::Ch2Negative => (&self.ch2, 1),
        };
        mean(trace.iter().skip(parity).step_by(2).copied())
    }

    /// Means in `Subchannel::ALL` order: ch1_pos, ch1_neg, ch2_pos, ch2_neg.
    pub fn subchannel_means(&self) -> [f64; 4] {
        Subchannel::ALL.map(|s| self.subchannel_mean(s))
    }
}

fn mean(samples: impl Iterator<Item = u16>) -> f64 {
    let (sum, n) = samples.fold((0u64, 0u64), |(s, n), v| (s + u64::from(v), n + 1));
    if n == 0 { 0.0 } else { sum as f64 / n as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_traces() {
        assert!(Measurement::new(vec![1], vec![1, 2]).is_none());
        assert!(Measurement::new(vec![1, 2], vec![]).is_none());
        assert!(Measurement::new(vec![1, 2], vec![3, 4]).is_some());
    }

    #[test]
    fn subchannels_split_even_and_odd_samples() {
        let m = Measurement::new(vec![100, 200, 102, 202], vec![10, 20, 30, 40, 50]).unwrap();
        assert_eq!(m.subchannel_means(), [101.0, 201.0, 30.0, 30.0]);
    }

    #[test]
    fn mean_of_traces_averages_channel_means() {
        let m = Measurement::new(vec![2000, 2010], vec![2100, 2110]).unwrap();
        assert_eq!(m.trace_mean(Channel::Ch1), 2005.0);
        assert_eq!(m.trace_mean(Channel::Ch2), 2105.0);
        assert_eq!(m.mean_of_traces(), 2055.0);
    }
}
