//! Deterministic color assignment for categorical series
//!
//! Drivers listed next to each other are often teammates with similar lap
//! times, so coloring them with neighboring colors of a continuous scale makes
//! the chart unreadable. [`ColorAssigner`] therefore walks the scale in
//! bit-reversal order: the `i`-th key (in first-seen order) gets slot
//! `p(i)` of the bit-reversal permutation of `0..n`, and slot `s` maps to the
//! scale parameter
//!
//! ```text
//! t_s = color_start + s * (color_end - color_start) / n      (forward)
//! t_s = color_end   - s * (color_end - color_start) / n      (use_end_as_start)
//! ```
//!
//! so consecutive keys land far apart on the scale while the table stays a pure
//! function of the key order.
//!
//! # Example
//!
//! ```
//! use karting_telemetry::color::{ColorAssigner, ColorRange, Turbo};
//!
//! let assigner = ColorAssigner::new(Turbo, ColorRange::default());
//! let table = assigner.assign(["Max", "Sam", "Eva", "Max"]);
//! assert_eq!(table.len(), 3);
//! assert_eq!(table.get(&"Sam"), Some(table.colors()[1]));
//! ```

use std::{collections::HashMap, fmt, hash::Hash};

use serde::{Deserialize, Serialize};

/// An sRGB color, serialized as the CSS string `rgb(r, g, b)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A continuous color scale over `[0, 1]`
pub trait ColorScale {
    /// Color at parameter `t`; values outside `[0, 1]` are clamped.
    fn color_at(&self, t: f64) -> Rgb;
}

impl<S> ColorScale for &S
where
    S: ColorScale + ?Sized,
{
    fn color_at(&self, t: f64) -> Rgb {
        (**self).color_at(t)
    }
}

/// The Turbo rainbow colormap (polynomial approximation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Turbo;

impl ColorScale for Turbo {
    fn color_at(&self, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let r = 34.61 + t * (1172.33 - t * (10793.56 - t * (33300.12 - t * (38394.49 - t * 14825.05))));
        let g = 23.31 + t * (557.33 + t * (1225.33 - t * (3574.96 - t * (1073.77 + t * 707.56))));
        let b = 27.2 + t * (3211.1 - t * (15327.97 - t * (27814.0 - t * (22569.18 - t * 6838.66))));
        Rgb::new(channel(r), channel(g), channel(b))
    }
}

/// Linear interpolation between two colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gradient {
    pub from: Rgb,
    pub to: Rgb,
}

impl ColorScale for Gradient {
    fn color_at(&self, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| channel(f64::from(a) + (f64::from(b) - f64::from(a)) * t);
        Rgb::new(
            lerp(self.from.r, self.to.r),
            lerp(self.from.g, self.to.g),
            lerp(self.from.b, self.to.b),
        )
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ColorRangeError {
    #[display("{field} must be a finite number within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// The part of the color scale a chart draws from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawColorRange")]
pub struct ColorRange {
    color_start: f64,
    color_end: f64,
    use_end_as_start: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawColorRange {
    color_start: f64,
    color_end: f64,
    use_end_as_start: bool,
}

impl Default for RawColorRange {
    fn default() -> Self {
        let ColorRange {
            color_start,
            color_end,
            use_end_as_start,
        } = ColorRange::default();
        Self {
            color_start,
            color_end,
            use_end_as_start,
        }
    }
}

impl TryFrom<RawColorRange> for ColorRange {
    type Error = ColorRangeError;

    fn try_from(raw: RawColorRange) -> Result<Self, Self::Error> {
        ColorRange::new(raw.color_start, raw.color_end, raw.use_end_as_start)
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        Self {
            color_start: 0.2,
            color_end: 1.0,
            use_end_as_start: false,
        }
    }
}

impl ColorRange {
    pub fn new(
        color_start: f64,
        color_end: f64,
        use_end_as_start: bool,
    ) -> Result<Self, ColorRangeError> {
        for (field, value) in [("color_start", color_start), ("color_end", color_end)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ColorRangeError::OutOfRange { field, value });
            }
        }
        Ok(Self {
            color_start,
            color_end,
            use_end_as_start,
        })
    }

    #[must_use]
    pub fn color_start(&self) -> f64 {
        self.color_start
    }

    #[must_use]
    pub fn color_end(&self) -> f64 {
        self.color_end
    }

    #[must_use]
    pub fn use_end_as_start(&self) -> bool {
        self.use_end_as_start
    }

    /// Scale parameter of `slot` when the range is split into `n` slots.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn parameter(&self, slot: usize, n: usize) -> f64 {
        debug_assert!(slot < n.max(1));
        let interval = (self.color_end - self.color_start) / n.max(1) as f64;
        if self.use_end_as_start {
            self.color_end - slot as f64 * interval
        } else {
            self.color_start + slot as f64 * interval
        }
    }
}

/// Bit-reversal permutation of `0..n`
///
/// Reverses the bits of `0..2^k` (the smallest power of two `>= n`) and keeps
/// the values below `n`.
///
/// ```
/// use karting_telemetry::color::bit_reversal_permutation;
///
/// assert_eq!(bit_reversal_permutation(3), vec![0, 2, 1]);
/// assert_eq!(bit_reversal_permutation(5), vec![0, 4, 2, 1, 3]);
/// ```
#[must_use]
pub fn bit_reversal_permutation(n: usize) -> Vec<usize> {
    if n <= 1 {
        return (0..n).collect();
    }
    let bits = usize::BITS - (n - 1).leading_zeros();
    (0..1_usize << bits)
        .map(|i| i.reverse_bits() >> (usize::BITS - bits))
        .filter(|&slot| slot < n)
        .collect()
}

/// Maps an ordered key set to colors of a [`ColorScale`]
#[derive(Debug, Clone)]
pub struct ColorAssigner<S> {
    scale: S,
    range: ColorRange,
}

impl<S> ColorAssigner<S>
where
    S: ColorScale,
{
    pub fn new(scale: S, range: ColorRange) -> Self {
        Self { scale, range }
    }

    /// Scale parameters for `n` categories, in category order.
    #[must_use]
    pub fn parameters(&self, n: usize) -> Vec<f64> {
        bit_reversal_permutation(n)
            .into_iter()
            .map(|slot| self.range.parameter(slot, n))
            .collect()
    }

    /// Colors for `n` categories, in category order.
    #[must_use]
    pub fn colors(&self, n: usize) -> Vec<Rgb> {
        self.parameters(n)
            .into_iter()
            .map(|t| self.scale.color_at(t))
            .collect()
    }

    /// Builds the color table of `keys`; duplicates keep their first position.
    pub fn assign<K, I>(&self, keys: I) -> ColorTable<K>
    where
        K: Eq + Hash + Clone,
        I: IntoIterator<Item = K>,
    {
        let mut index = HashMap::new();
        let mut ordered = vec![];
        for key in keys {
            if !index.contains_key(&key) {
                index.insert(key.clone(), ordered.len());
                ordered.push(key);
            }
        }
        let colors = self.colors(ordered.len());
        ColorTable {
            keys: ordered,
            colors,
            index,
        }
    }
}

/// Colors indexed by key, in first-seen key order
#[derive(Debug, Clone)]
pub struct ColorTable<K> {
    keys: Vec<K>,
    colors: Vec<Rgb>,
    index: HashMap<K, usize>,
}

impl<K> ColorTable<K>
where
    K: Eq + Hash,
{
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Rgb> {
        self.index.get(key).map(|&i| self.colors[i])
    }

    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    #[must_use]
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, Rgb)> + '_ {
        self.keys.iter().zip(self.colors.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng as _, SeedableRng as _};
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_permutation_is_complete() {
        for n in 0..100 {
            let mut perm = bit_reversal_permutation(n);
            perm.sort_unstable();
            assert_eq!(perm, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_empty_and_single() {
        let assigner = ColorAssigner::new(Turbo, ColorRange::default());
        assert!(assigner.colors(0).is_empty());
        assert!(assigner.assign(Vec::<String>::new()).is_empty());
        assert_eq!(assigner.parameters(1), vec![0.2]);
        assert_eq!(assigner.colors(1), vec![Turbo.color_at(0.2)]);
    }

    #[test]
    fn test_single_walking_backwards_starts_at_end() {
        let range = ColorRange::new(0.2, 0.9, true).unwrap();
        let assigner = ColorAssigner::new(Turbo, range);
        assert_eq!(assigner.parameters(1), vec![0.9]);
    }

    #[test]
    fn test_consecutive_keys_are_spread() {
        let range = ColorRange::new(0.0, 1.0, false).unwrap();
        let assigner = ColorAssigner::new(Turbo, range);
        assert_eq!(
            assigner.parameters(4),
            vec![0.0, 0.5, 0.25, 0.75]
        );
        let params = assigner.parameters(8);
        assert!((params[1] - params[0]).abs() >= 0.5);
    }

    #[test]
    fn test_count_range_and_idempotence() {
        let mut rng = Pcg64Mcg::seed_from_u64(42);
        for _ in 0..200 {
            let start = rng.random_range(0.0..=1.0);
            let end = rng.random_range(0.0..=1.0);
            let backwards = rng.random_bool(0.5);
            let n = rng.random_range(0..40);
            let assigner = ColorAssigner::new(Turbo, ColorRange::new(start, end, backwards).unwrap());

            let params = assigner.parameters(n);
            assert_eq!(params.len(), n);
            let (lo, hi) = (f64::min(start, end), f64::max(start, end));
            for t in &params {
                assert!(
                    *t >= lo - 1e-12 && *t <= hi + 1e-12,
                    "{t} outside [{lo}, {hi}]"
                );
            }
            assert_eq!(assigner.colors(n), assigner.colors(n));
        }
    }

    #[test]
    fn test_table_lookup_by_key() {
        let assigner = ColorAssigner::new(Turbo, ColorRange::default());
        let table = assigner.assign(["b", "a", "b", "c"]);
        assert_eq!(table.keys(), &["b", "a", "c"]);
        assert_eq!(table.get(&"a"), Some(table.colors()[1]));
        assert_eq!(table.get(&"z"), None);
        let other = assigner.assign(["b", "a", "c"]);
        assert_eq!(table.colors(), other.colors());
    }

    #[test]
    fn test_range_validation() {
        assert!(ColorRange::new(-0.1, 1.0, false).is_err());
        assert!(ColorRange::new(0.0, 1.5, false).is_err());
        assert!(ColorRange::new(f64::NAN, 1.0, false).is_err());

        let range: ColorRange = serde_json::from_str(r#"{"color_end": 0.8}"#).unwrap();
        assert_eq!(range.color_start(), 0.2);
        assert_eq!(range.color_end(), 0.8);
        assert!(serde_json::from_str::<ColorRange>(r#"{"color_start": 2.0}"#).is_err());
    }

    #[test]
    fn test_turbo_endpoints() {
        assert_eq!(Turbo.color_at(0.0), Rgb::new(35, 23, 27));
        assert_eq!(Turbo.color_at(1.0), Rgb::new(144, 12, 0));
        assert_eq!(Turbo.color_at(-3.0), Turbo.color_at(0.0));
    }

    #[test]
    fn test_gradient_and_css_output() {
        let gradient = Gradient {
            from: Rgb::new(0, 0, 0),
            to: Rgb::new(255, 255, 255),
        };
        assert_eq!(gradient.color_at(0.5), Rgb::new(128, 128, 128));
        assert_eq!(
            serde_json::to_string(&Rgb::new(1, 2, 3)).unwrap(),
            r#""rgb(1, 2, 3)""#
        );
    }
}
