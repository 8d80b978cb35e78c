//! Integer root bracketing over the 8-bit register domain.
//!
//! A finder holds a bracket `[a, b]` whose feedback values straddle zero and
//! narrows it one measurement at a time. The scalar finder drives one search;
//! the parallel finder drives N independent searches that share each
//! measurement round.
//!
//! Guesses are rounded half away from zero (`f64::round`), so the first
//! bisection guess over `0..=255` is 128.

use crate::error::AlignError;

/// How the next guess is picked inside the current bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Midpoint of the bracket.
    Bisection,
    /// Zero crossing of the line through both endpoints.
    #[default]
    Secant,
}

impl Strategy {
    pub const fn name(self) -> &'static str {
        match self {
            Strategy::Bisection => "bisection",
            Strategy::Secant => "secant",
        }
    }
}

impl core::fmt::Display for Strategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sign of a feedback value: -1, 0 or 1.
#[inline]
pub fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Two register values with feedback values of opposite sign (or a zero).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub a: u8,
    pub b: u8,
    pub fa: f64,
    pub fb: f64,
}

impl Bracket {
    #[inline]
    pub fn width(&self) -> u8 {
        self.a.abs_diff(self.b)
    }

    /// The sign-change invariant. NaN feedback never brackets anything.
    #[inline]
    pub fn is_sign_change(&self) -> bool {
        if self.fa.is_nan() || self.fb.is_nan() {
            return false;
        }
        sign(self.fa) != sign(self.fb) || self.fa == 0.0 || self.fb == 0.0
    }

    fn lo_hi(&self) -> (u8, u8) {
        (self.a.min(self.b), self.a.max(self.b))
    }

    fn midpoint(&self) -> u8 {
        let mid = (f64::from(self.a) + f64::from(self.b)) / 2.0;
        mid.round() as u8
    }

    fn secant(&self) -> u8 {
        if self.fa == self.fb {
            return self.midpoint();
        }
        let (a, b) = (f64::from(self.a), f64::from(self.b));
        let slope = (self.fa - self.fb) / (a - b);
        let intercept = self.fa - slope * a;
        let (lo, hi) = self.lo_hi();
        (-intercept / slope)
            .round()
            .clamp(f64::from(lo), f64::from(hi)) as u8
    }

    fn guess(&self, strategy: Strategy) -> u8 {
        match strategy {
            Strategy::Bisection => self.midpoint(),
            Strategy::Secant => self.secant(),
        }
    }
}

/// One-dimensional bracketing search.
#[derive(Debug, Clone)]
pub struct ScalarBracketFinder {
    strategy: Strategy,
    bracket: Bracket,
    x: u8,
    done: bool,
    steps: usize,
}

impl ScalarBracketFinder {
    /// Fails unless `a != b` and `fa`, `fb` bracket a root.
    pub fn new(strategy: Strategy, a: u8, b: u8, fa: f64, fb: f64) -> Result<Self, AlignError> {
        Self::for_channel(strategy, 0, a, b, fa, fb)
    }

    fn for_channel(
        strategy: Strategy,
        channel: usize,
        a: u8,
        b: u8,
        fa: f64,
        fb: f64,
    ) -> Result<Self, AlignError> {
        if a == b {
            return Err(AlignError::DegenerateBracket(a));
        }
        let bracket = Bracket { a, b, fa, fb };
        if !bracket.is_sign_change() {
            return Err(AlignError::InvalidBracket {
                channel,
                a,
                b,
                fa,
                fb,
            });
        }
        Ok(Self {
            strategy,
            bracket,
            x: bracket.guess(strategy),
            done: false,
            steps: 0,
        })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn bracket(&self) -> Bracket {
        self.bracket
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of feedback values consumed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// First value to evaluate. Once done, the final value.
    pub fn first_step(&mut self) -> u8 {
        if self.done {
            return self.x;
        }
        self.x = self.bracket.guess(self.strategy);
        self.x
    }

    /// Feed back `fx = f(x)` for the last guess. Returns the next guess, or
    /// the final value once done. A finished finder ignores further feedback.
    ///
    /// # Panics
    ///
    /// If the bracket loses its sign change, which valid construction rules out.
    pub fn next_step(&mut self, fx: f64) -> (u8, bool) {
        if self.done {
            return (self.x, true);
        }
        self.steps += 1;

        let br = &mut self.bracket;
        if sign(fx) == sign(br.fa) {
            br.a = self.x;
            br.fa = fx;
        } else {
            br.b = self.x;
            br.fb = fx;
        }
        assert!(
            br.is_sign_change(),
            "bracket lost its sign change: {br:?}"
        );

        if fx == 0.0 || br.width() <= 1 {
            self.done = true;
            return (self.x, true);
        }
        let next = br.guess(self.strategy);
        if self.strategy == Strategy::Secant && (next == br.a || next == br.b) {
            self.done = true;
            return (self.x, true);
        }
        self.x = next;
        (next, false)
    }
}

/// N independent scalar searches advanced in lockstep.
///
/// Index `i` of every input and output vector belongs to channel `i`.
#[derive(Debug, Clone)]
pub struct ParallelBracketFinder {
    channels: Vec<ScalarBracketFinder>,
    guesses: Vec<u8>,
}

impl ParallelBracketFinder {
    pub fn new(
        strategy: Strategy,
        a: &[u8],
        b: &[u8],
        fa: &[f64],
        fb: &[f64],
    ) -> Result<Self, AlignError> {
        let n = a.len();
        for len in [b.len(), fa.len(), fb.len()] {
            if len != n {
                return Err(AlignError::LengthMismatch {
                    expected: n,
                    got: len,
                });
            }
        }
        let channels = (0..n)
            .map(|i| ScalarBracketFinder::for_channel(strategy, i, a[i], b[i], fa[i], fb[i]))
            .collect::<Result<Vec<_>, _>>()?;
        let guesses = channels.iter().map(|c| c.x).collect();
        Ok(Self { channels, guesses })
    }

    pub fn width(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, i: usize) -> Option<&ScalarBracketFinder> {
        self.channels.get(i)
    }

    pub fn is_done(&self) -> bool {
        self.channels.iter().all(ScalarBracketFinder::is_done)
    }

    pub fn first_step(&mut self) -> Vec<u8> {
        self.guesses = self
            .channels
            .iter_mut()
            .map(ScalarBracketFinder::first_step)
            .collect();
        self.guesses.clone()
    }

    /// Advance every unfinished channel with its feedback value. Finished
    /// channels ignore theirs and keep re-emitting their final value.
    pub fn next_step(&mut self, fx: &[f64]) -> Result<(Vec<u8>, Vec<bool>), AlignError> {
        if fx.len() != self.channels.len() {
            return Err(AlignError::LengthMismatch {
                expected: self.channels.len(),
                got: fx.len(),
            });
        }
        let mut done = Vec::with_capacity(fx.len());
        for ((ch, guess), &f) in self.channels.iter_mut().zip(&mut self.guesses).zip(fx) {
            let (g, d) = ch.next_step(f);
            *guess = g;
            done.push(d);
        }
        Ok((self.guesses.clone(), done))
    }
}

/// Common driver interface over the scalar and parallel finders.
pub trait BracketSearch {
    fn width(&self) -> usize;
    fn first_guesses(&mut self) -> Vec<u8>;
    fn advance(&mut self, fx: &[f64]) -> Result<(Vec<u8>, Vec<bool>), AlignError>;
}

impl BracketSearch for ScalarBracketFinder {
    fn width(&self) -> usize {
        1
    }

    fn first_guesses(&mut self) -> Vec<u8> {
        vec![self.first_step()]
    }

    fn advance(&mut self, fx: &[f64]) -> Result<(Vec<u8>, Vec<bool>), AlignError> {
        match fx {
            [f] => {
                let (g, d) = self.next_step(*f);
                Ok((vec![g], vec![d]))
            }
            _ => Err(AlignError::LengthMismatch {
                expected: 1,
                got: fx.len(),
            }),
        }
    }
}

impl BracketSearch for ParallelBracketFinder {
    fn width(&self) -> usize {
        ParallelBracketFinder::width(self)
    }

    fn first_guesses(&mut self) -> Vec<u8> {
        self.first_step()
    }

    fn advance(&mut self, fx: &[f64]) -> Result<(Vec<u8>, Vec<bool>), AlignError> {
        self.next_step(fx)
    }
}

/// Scalar finder for one channel, parallel finder for several.
pub fn finder_for(
    strategy: Strategy,
    a: &[u8],
    b: &[u8],
    fa: &[f64],
    fb: &[f64],
) -> Result<Box<dyn BracketSearch>, AlignError> {
    match (a, b, fa, fb) {
        ([a], [b], [fa], [fb]) => Ok(Box::new(ScalarBracketFinder::new(
            strategy, *a, *b, *fa, *fb,
        )?)),
        _ => Ok(Box::new(ParallelBracketFinder::new(strategy, a, b, fa, fb)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn drive(finder: &mut ScalarBracketFinder, f: impl Fn(u8) -> f64) -> (u8, usize) {
        let mut x = finder.first_step();
        loop {
            let (next, done) = finder.next_step(f(x));
            x = next;
            if done {
                return (x, finder.steps());
            }
        }
    }

    #[test]
    fn bisection_hits_exact_root_on_first_guess() {
        let f = |x: u8| 128.0 - f64::from(x);
        let mut finder = ScalarBracketFinder::new(Strategy::Bisection, 0, 255, f(0), f(255)).unwrap();
        assert_eq!(finder.first_step(), 128);
        assert_eq!(finder.next_step(f(128)), (128, true));
    }

    #[test]
    fn same_sign_endpoints_are_rejected() {
        let f = |x: u8| 2048.0 - 8.0 * f64::from(x);
        let err = ScalarBracketFinder::new(Strategy::Secant, 0, 255, f(0), f(255)).unwrap_err();
        assert!(matches!(
            err,
            AlignError::InvalidBracket {
                channel: 0,
                a: 0,
                b: 255,
                ..
            }
        ));
    }

    #[test]
    fn secant_solves_linear_function_in_one_step() {
        let f = |x: u8| 2048.0 - 16.0 * f64::from(x);
        let mut finder = ScalarBracketFinder::new(Strategy::Secant, 0, 255, f(0), f(255)).unwrap();
        let x = finder.first_step();
        assert_eq!(x, 128);
        assert_eq!(finder.next_step(f(x)), (128, true));
        assert_eq!(finder.steps(), 1);
    }

    #[rstest]
    #[case(0.0, 5.0)]
    #[case(-3.0, 0.0)]
    #[case(0.0, 0.0)]
    fn zero_endpoint_counts_as_bracket(#[case] fa: f64, #[case] fb: f64) {
        assert!(ScalarBracketFinder::new(Strategy::Secant, 10, 20, fa, fb).is_ok());
    }

    #[test]
    fn equal_endpoints_are_degenerate() {
        assert_eq!(
            ScalarBracketFinder::new(Strategy::Secant, 7, 7, -1.0, 1.0).unwrap_err(),
            AlignError::DegenerateBracket(7)
        );
    }

    #[test]
    fn nan_feedback_is_not_a_bracket() {
        assert!(ScalarBracketFinder::new(Strategy::Bisection, 0, 255, f64::NAN, 1.0).is_err());
    }

    #[rstest]
    #[case(0, 3, 2)] // 1.5 rounds up
    #[case(0, 255, 128)] // 127.5 rounds up
    #[case(254, 255, 255)]
    #[case(10, 20, 15)]
    fn midpoint_rounds_half_away_from_zero(#[case] a: u8, #[case] b: u8, #[case] want: u8) {
        let mut finder = ScalarBracketFinder::new(Strategy::Bisection, a, b, 1.0, -1.0).unwrap();
        assert_eq!(finder.first_step(), want);
    }

    #[test]
    fn secant_with_both_zero_falls_back_to_midpoint() {
        let mut finder = ScalarBracketFinder::new(Strategy::Secant, 0, 100, 0.0, 0.0).unwrap();
        assert_eq!(finder.first_step(), 50);
    }

    #[test]
    fn secant_stops_when_next_guess_lands_on_endpoint() {
        // Flat far side: interpolation creeps toward the root from one end.
        let f = |x: u8| if x < 200 { 1000.0 } else { -1.0 - f64::from(x - 200) };
        let mut finder = ScalarBracketFinder::new(Strategy::Secant, 0, 255, f(0), f(255)).unwrap();
        let (x, steps) = drive(&mut finder, f);
        assert!(steps < 60, "took {steps} steps");
        let br = finder.bracket();
        assert!(br.is_sign_change());
        assert!(x == br.a || x == br.b);
    }

    #[test]
    fn finished_finder_ignores_feedback() {
        let f = |x: u8| 128.0 - f64::from(x);
        let mut finder = ScalarBracketFinder::new(Strategy::Bisection, 0, 255, f(0), f(255)).unwrap();
        finder.first_step();
        assert_eq!(finder.next_step(0.0), (128, true));
        let before = finder.bracket();
        assert_eq!(finder.next_step(-999.0), (128, true));
        assert_eq!(finder.bracket(), before);
        assert_eq!(finder.steps(), 1);
        assert_eq!(finder.strategy(), Strategy::Bisection);
    }

    #[test]
    fn restarting_a_finished_finder_keeps_its_value() {
        let roots = [128.0, 10.0];
        let eval = |xs: &[u8]| -> Vec<f64> {
            xs.iter().zip(roots).map(|(x, r)| r - f64::from(*x)).collect()
        };
        let (a, b) = ([0u8; 2], [255u8; 2]);
        let mut finder =
            ParallelBracketFinder::new(Strategy::Bisection, &a, &b, &eval(&a), &eval(&b)).unwrap();
        let xs = finder.first_step();
        let (xs, done) = finder.next_step(&eval(&xs)).unwrap();
        assert_eq!(xs, vec![128, 64]);
        assert_eq!(done, vec![true, false]);

        let again = finder.first_step();
        assert_eq!(again[0], 128);
        let ch0 = finder.channel(0).unwrap();
        assert!(ch0.is_done());
        assert_eq!(ch0.steps(), 1);
        let (xs, done) = finder.next_step(&eval(&again)).unwrap();
        assert_eq!(xs[0], 128);
        assert!(done[0]);
        assert!(finder.channel(2).is_none());
    }

    // Different slopes and intercepts per channel: f_i(x) = k_i * (r_i - x).
    fn sloped(roots: &[f64], slopes: &[f64]) -> Vec<Box<dyn Fn(u8) -> f64>> {
        roots
            .iter()
            .zip(slopes)
            .map(|(&r, &k)| Box::new(move |x: u8| k * r - k * f64::from(x)) as Box<dyn Fn(u8) -> f64>)
            .collect()
    }

    #[rstest]
    #[case(Strategy::Bisection)]
    #[case(Strategy::Secant)]
    fn parallel_channels_converge_independently(#[case] strategy: Strategy) {
        let roots = [17.0, 90.0, 128.0, 240.0];
        let fs = sloped(&roots, &[1.0, 4.0, 0.25, 12.0]);
        let eval = |xs: &[u8]| -> Vec<f64> { xs.iter().zip(&fs).map(|(x, f)| f(*x)).collect() };

        let a = [0u8; 4];
        let b = [255u8; 4];
        let mut finder =
            ParallelBracketFinder::new(strategy, &a, &b, &eval(&a), &eval(&b)).unwrap();

        // Reference: each channel run on its own.
        let solo: Vec<(u8, usize)> = fs
            .iter()
            .map(|f| {
                let mut s = ScalarBracketFinder::new(strategy, 0, 255, f(0), f(255)).unwrap();
                drive(&mut s, f)
            })
            .collect();
        let solo_steps: Vec<usize> = solo.iter().map(|(_, n)| *n).collect();

        let mut xs = finder.first_step();
        let mut rounds = 0;
        loop {
            let (next, done) = finder.next_step(&eval(&xs)).unwrap();
            rounds += 1;
            xs = next;
            if done.iter().all(|d| *d) {
                break;
            }
        }
        assert_eq!(rounds, *solo_steps.iter().max().unwrap());
        for ((x, r), (solo_x, _)) in xs.iter().zip(roots).zip(&solo) {
            assert_eq!(x, solo_x);
            assert!((f64::from(*x) - r).abs() <= 1.0, "{x} vs {r}");
        }
        if strategy == Strategy::Secant {
            // Integer roots of linear feedback are hit exactly in one round.
            assert_eq!(rounds, 1);
            assert_eq!(xs, vec![17, 90, 128, 240]);
        }
    }

    #[test]
    fn parallel_rejects_mismatched_lengths() {
        let err = ParallelBracketFinder::new(Strategy::Secant, &[0, 0], &[255], &[1.0, 1.0], &[-1.0, -1.0])
            .unwrap_err();
        assert_eq!(
            err,
            AlignError::LengthMismatch {
                expected: 2,
                got: 1
            }
        );

        let mut ok =
            ParallelBracketFinder::new(Strategy::Secant, &[0, 0], &[255, 255], &[1.0, 1.0], &[-1.0, -1.0])
                .unwrap();
        ok.first_step();
        assert!(matches!(
            ok.next_step(&[0.5]),
            Err(AlignError::LengthMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn parallel_reports_failing_channel() {
        let err = ParallelBracketFinder::new(
            Strategy::Secant,
            &[0, 0, 0],
            &[255, 255, 255],
            &[1.0, 1.0, 1.0],
            &[-1.0, -1.0, 2.0],
        )
        .unwrap_err();
        assert!(matches!(err, AlignError::InvalidBracket { channel: 2, .. }));
    }

    #[test]
    fn finder_for_picks_scalar_for_one_channel() {
        let search = finder_for(Strategy::Secant, &[0], &[255], &[5.0], &[-5.0]).unwrap();
        assert_eq!(search.width(), 1);
        let search = finder_for(Strategy::Secant, &[0; 3], &[255; 3], &[5.0; 3], &[-5.0; 3]).unwrap();
        assert_eq!(search.width(), 3);
    }
}
