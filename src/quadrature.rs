//! Adaptive Gauss–Kronrod (7/15) quadrature over finite intervals.
//!
//! Waypoints split the domain before adaptation starts, so kinks in a
//! piecewise integrand always sit on a subinterval edge.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::config::NumericsConfig;

/// Kronrod abscissae on [0, 1]; odd indices are the Gauss nodes, the last is the centre.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.000_000_000_000_000_000_000_000_000_000_000,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

/// Gauss weights for XGK[1], XGK[3], XGK[5] and the centre.
const WG: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

/// Result of an adaptive integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integral {
    pub value: f64,
    /// Summed error estimate over all subintervals.
    pub error: f64,
    pub subdivisions: usize,
}

impl Integral {
    const ZERO: Integral = Integral { value: 0.0, error: 0.0, subdivisions: 0 };
}

#[derive(Debug, Clone, Copy)]
pub struct Quadrature {
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub max_subdivisions: usize,
}

impl Default for Quadrature {
    fn default() -> Self {
        Quadrature::from(&NumericsConfig::default())
    }
}

impl From<&NumericsConfig> for Quadrature {
    fn from(numerics: &NumericsConfig) -> Self {
        Quadrature {
            abs_tolerance: numerics.quadrature_abs_tolerance,
            rel_tolerance: numerics.quadrature_rel_tolerance,
            max_subdivisions: numerics.quadrature_max_subdivisions,
        }
    }
}

/// One subinterval with its local estimate; heap order is by error.
#[derive(Debug, Clone, Copy)]
struct Segment {
    lower: f64,
    upper: f64,
    value: f64,
    error: f64,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Segment {}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Quadrature {
    /// Integrate `f` over `[lower, upper]`, splitting first at every finite
    /// waypoint strictly inside the interval. An empty or reversed interval
    /// integrates to zero.
    ///
    /// Stops when the summed error estimate meets
    /// `max(abs_tolerance, rel_tolerance * |value|)` or the subdivision limit
    /// is reached; in the latter case the best estimate is returned.
    pub fn integrate<F>(&self, f: F, lower: f64, upper: f64, waypoints: &[f64]) -> Integral
    where
        F: Fn(f64) -> f64,
    {
        if !(upper > lower) {
            return Integral::ZERO;
        }

        let mut cuts: Vec<f64> = waypoints
            .iter()
            .copied()
            .filter(|w| w.is_finite() && *w > lower && *w < upper)
            .collect();
        cuts.sort_by(f64::total_cmp);
        cuts.dedup();

        let mut active = BinaryHeap::new();
        let mut left = lower;
        for right in cuts.into_iter().chain(std::iter::once(upper)) {
            active.push(gauss_kronrod(&f, left, right));
            left = right;
        }
        // Segments too narrow to bisect in floating point.
        let mut exhausted: Vec<Segment> = Vec::new();

        loop {
            let (value, error) = active
                .iter()
                .chain(exhausted.iter())
                .fold((0.0, 0.0), |(v, e), s| (v + s.value, e + s.error));
            let subdivisions = active.len() + exhausted.len();

            if error <= self.abs_tolerance.max(self.rel_tolerance * value.abs()) {
                return Integral { value, error, subdivisions };
            }
            if subdivisions >= self.max_subdivisions {
                debug!(lower, upper, value, error, subdivisions, "quadrature hit subdivision limit");
                return Integral { value, error, subdivisions };
            }

            let Some(worst) = active.pop() else {
                return Integral { value, error, subdivisions };
            };
            let mid = 0.5 * (worst.lower + worst.upper);
            if mid <= worst.lower || mid >= worst.upper {
                exhausted.push(worst);
                continue;
            }
            active.push(gauss_kronrod(&f, worst.lower, mid));
            active.push(gauss_kronrod(&f, mid, worst.upper));
        }
    }
}

/// 15-point Kronrod estimate with the embedded 7-point Gauss rule as error
/// reference, scaled the QUADPACK way.
fn gauss_kronrod<F>(f: &F, lower: f64, upper: f64) -> Segment
where
    F: Fn(f64) -> f64,
{
    let center = 0.5 * (lower + upper);
    let half = 0.5 * (upper - lower);

    let f_center = f(center);
    let mut kronrod = f_center * WGK[7];
    let mut gauss = f_center * WG[3];
    let mut abs_kronrod = kronrod.abs();
    let mut left = [0.0; 7];
    let mut right = [0.0; 7];

    for j in 0..7 {
        let dx = half * XGK[j];
        let (f1, f2) = (f(center - dx), f(center + dx));
        left[j] = f1;
        right[j] = f2;
        kronrod += WGK[j] * (f1 + f2);
        abs_kronrod += WGK[j] * (f1.abs() + f2.abs());
        if j % 2 == 1 {
            gauss += WG[j / 2] * (f1 + f2);
        }
    }

    let mean = 0.5 * kronrod;
    let mut spread = WGK[7] * (f_center - mean).abs();
    for j in 0..7 {
        spread += WGK[j] * ((left[j] - mean).abs() + (right[j] - mean).abs());
    }

    let scale = half.abs();
    let value = kronrod * half;
    let abs_value = abs_kronrod * scale;
    let spread = spread * scale;

    let mut error = ((kronrod - gauss) * half).abs();
    if spread != 0.0 && error != 0.0 {
        error = spread * (200.0 * error / spread).powf(1.5).min(1.0);
    }
    if abs_value > f64::MIN_POSITIVE / (50.0 * f64::EPSILON) {
        error = error.max(50.0 * f64::EPSILON * abs_value);
    }

    Segment { lower, upper, value, error }
}
