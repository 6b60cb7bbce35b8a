//! Derivative-free minimisers: golden-section search on an interval and a
//! box-constrained Nelder–Mead simplex with restarts.

/// Configuration for the Nelder–Mead search.
#[derive(Clone, Copy, Debug)]
pub struct NelderMeadOptions {
    /// Iteration cap for each simplex run.
    pub max_iterations: usize,
    /// Fresh simplexes built around the incumbent after the first run.
    pub max_restarts: usize,
    /// Largest coordinate spread of a converged simplex.
    pub x_tolerance: f64,
    /// Largest objective spread of a converged simplex.
    pub f_tolerance: f64,
    /// Relative size of the initial simplex edges.
    pub initial_step: f64,
    /// Stop as soon as the objective drops to this value.
    pub target: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            max_restarts: 10,
            x_tolerance: 1e-10,
            f_tolerance: 1e-12,
            initial_step: 0.05,
            target: f64::NEG_INFINITY,
        }
    }
}

/// Best point found and the work spent finding it.
#[derive(Clone, Debug)]
pub struct Minimum<const N: usize> {
    pub x: [f64; N],
    pub value: f64,
    /// Simplex iterations summed over all runs.
    pub iterations: usize,
    pub restarts: usize,
}

/// Minimise a unimodal `f` on `[lower, upper]` by golden-section search.
/// Returns the abscissa of the smallest value seen.
pub fn golden_section<F>(f: F, lower: f64, upper: f64, tolerance: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    if !(upper > lower) {
        return lower;
    }
    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = (lower, upper);
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let (mut fc, mut fd) = (f(c), f(d));

    for _ in 0..200 {
        if b - a <= tolerance {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d);
        }
    }
    if fc < fd { c } else { d }
}

fn project<const N: usize>(x: [f64; N], lower: &[f64; N], upper: &[f64; N]) -> [f64; N] {
    std::array::from_fn(|i| x[i].max(lower[i]).min(upper[i]))
}

/// `a + t * (b - a)`, projected onto the box.
fn along<const N: usize>(
    a: &[f64; N],
    b: &[f64; N],
    t: f64,
    lower: &[f64; N],
    upper: &[f64; N],
) -> [f64; N] {
    project(std::array::from_fn(|i| a[i] + t * (b[i] - a[i])), lower, upper)
}

/// Simplex edge scales, relative to `initial_step`, cycled through by the
/// first run and each restart.
const RESTART_SCALES: [f64; 4] = [1.0, 0.1, 4.0, 0.01];

/// Minimise `f` over the box `[lower, upper]` starting from `start`.
///
/// Trial points are projected onto the box. After the first simplex run
/// converges, a fresh simplex is built around the incumbent with the next
/// edge scale in `RESTART_SCALES`. The search stops once a full cycle of
/// scales fails to improve, `target` is reached, or the restart budget is
/// spent.
pub fn nelder_mead<const N: usize, F>(
    f: F,
    start: [f64; N],
    lower: &[f64; N],
    upper: &[f64; N],
    options: &NelderMeadOptions,
) -> Minimum<N>
where
    F: Fn(&[f64; N]) -> f64,
{
    let mut x = project(start, lower, upper);
    let mut value = f(&x);
    let mut iterations = 0;
    let mut restarts = 0;
    let mut stale = 0;

    for run in 0..=options.max_restarts {
        if value <= options.target || stale >= RESTART_SCALES.len() {
            break;
        }
        let scale = RESTART_SCALES[run % RESTART_SCALES.len()];
        let (next_x, next_value, used) =
            simplex_run(&f, x, lower, upper, options.initial_step * scale, options);
        iterations += used;
        if run > 0 {
            restarts += 1;
        }
        if next_value < value - options.f_tolerance {
            stale = 0;
        } else {
            stale += 1;
        }
        if next_value < value {
            x = next_x;
            value = next_value;
        }
    }

    Minimum { x, value, iterations, restarts }
}

/// Run `nelder_mead` from each start in turn and keep the best result,
/// stopping early once `target` is met. Iterations and restarts are summed.
pub fn nelder_mead_multistart<const N: usize, F>(
    f: F,
    starts: &[[f64; N]],
    lower: &[f64; N],
    upper: &[f64; N],
    options: &NelderMeadOptions,
) -> Option<Minimum<N>>
where
    F: Fn(&[f64; N]) -> f64,
{
    let mut best: Option<Minimum<N>> = None;
    let (mut iterations, mut restarts) = (0, 0);
    for start in starts {
        let run = nelder_mead(&f, *start, lower, upper, options);
        iterations += run.iterations;
        restarts += run.restarts;
        if best.as_ref().is_none_or(|b| run.value < b.value) {
            best = Some(run);
        }
        if best.as_ref().is_some_and(|b| b.value <= options.target) {
            break;
        }
    }
    best.map(|b| Minimum { iterations, restarts, ..b })
}

fn simplex_run<const N: usize, F>(
    f: &F,
    start: [f64; N],
    lower: &[f64; N],
    upper: &[f64; N],
    step_scale: f64,
    options: &NelderMeadOptions,
) -> ([f64; N], f64, usize)
where
    F: Fn(&[f64; N]) -> f64,
{
    let steps: [f64; N] =
        std::array::from_fn(|i| if start[i] != 0.0 { step_scale * start[i].abs() } else { 0.00025 });
    // A base point on a bound would put every vertex but one on that face.
    let base: [f64; N] = project(
        std::array::from_fn(|i| {
            if start[i] >= upper[i] {
                start[i] - steps[i] / 2.0
            } else if start[i] <= lower[i] {
                start[i] + steps[i] / 2.0
            } else {
                start[i]
            }
        }),
        lower,
        upper,
    );

    let mut simplex: Vec<([f64; N], f64)> = Vec::with_capacity(N + 1);
    simplex.push((base, f(&base)));
    for i in 0..N {
        let mut vertex = base;
        vertex[i] = base[i] + steps[i];
        vertex = project(vertex, lower, upper);
        if vertex[i] == base[i] {
            // Pinned against the upper bound: step the other way.
            vertex[i] = base[i] - steps[i];
            vertex = project(vertex, lower, upper);
        }
        simplex.push((vertex, f(&vertex)));
    }

    let mut iterations = 0;
    while iterations < options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, best_value) = simplex[0];
        if best_value <= options.target {
            break;
        }

        let f_spread = simplex.iter().map(|v| (v.1 - best_value).abs()).fold(0.0, f64::max);
        let x_spread = simplex
            .iter()
            .flat_map(|v| (0..N).map(move |i| (v.0[i] - best[i]).abs()))
            .fold(0.0, f64::max);
        if f_spread <= options.f_tolerance && x_spread <= options.x_tolerance {
            break;
        }
        iterations += 1;

        let centroid: [f64; N] = std::array::from_fn(|i| {
            simplex[..N].iter().map(|v| v.0[i]).sum::<f64>() / N as f64
        });
        let (worst, worst_value) = simplex[N];
        let second_worst_value = simplex[N - 1].1;

        let reflected = along(&centroid, &worst, -1.0, lower, upper);
        let reflected_value = f(&reflected);

        if reflected_value < best_value {
            let expanded = along(&centroid, &worst, -2.0, lower, upper);
            let expanded_value = f(&expanded);
            simplex[N] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }
        if reflected_value < second_worst_value {
            simplex[N] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value, accept) = if reflected_value < worst_value {
            let p = along(&centroid, &reflected, 0.5, lower, upper);
            let v = f(&p);
            (p, v, v <= reflected_value)
        } else {
            let p = along(&centroid, &worst, 0.5, lower, upper);
            let v = f(&p);
            (p, v, v < worst_value)
        };
        if accept {
            simplex[N] = (contracted, contracted_value);
            continue;
        }

        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = along(&best, &vertex.0, 0.5, lower, upper);
            *vertex = (shrunk, f(&shrunk));
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    (simplex[0].0, simplex[0].1, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golden_section_finds_parabola_minimum() {
        let x = golden_section(|x| (x - 2.0) * (x - 2.0), 0.0, 5.0, 1e-9);
        assert!((x - 2.0).abs() < 1e-6, "got {x}");
    }

    #[test]
    fn golden_section_respects_bounds() {
        let x = golden_section(|x| x, 3.0, 7.0, 1e-9);
        assert!((x - 3.0).abs() < 1e-6, "minimum of increasing f is the left edge, got {x}");
    }

    #[test]
    fn golden_section_degenerate_interval_returns_lower() {
        assert_eq!(golden_section(|x| x * x, 4.0, 4.0, 1e-9), 4.0);
    }

    #[test]
    fn nelder_mead_solves_rosenbrock() {
        let rosenbrock =
            |x: &[f64; 2]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let lower = [f64::NEG_INFINITY; 2];
        let upper = [f64::INFINITY; 2];
        let min =
            nelder_mead(rosenbrock, [-1.2, 1.0], &lower, &upper, &NelderMeadOptions::default());
        assert!((min.x[0] - 1.0).abs() < 1e-4, "x = {:?}", min.x);
        assert!((min.x[1] - 1.0).abs() < 1e-4, "x = {:?}", min.x);
    }

    #[test]
    fn nelder_mead_stays_in_box() {
        let f = |x: &[f64; 2]| (x[0] + 1.0).powi(2) + (x[1] - 3.0).powi(2);
        let min =
            nelder_mead(f, [2.0, 2.0], &[0.0, 0.0], &[5.0, 5.0], &NelderMeadOptions::default());
        assert!(min.x[0].abs() < 1e-6, "x = {:?}", min.x);
        assert!((min.x[1] - 3.0).abs() < 1e-6, "x = {:?}", min.x);
    }

    #[test]
    fn nelder_mead_handles_absolute_residuals() {
        // Polyhedral objective with its minimum on two creases.
        let f = |x: &[f64; 2]| (x[0] + x[1] - 3.0).abs() + (x[0] - 2.0 * x[1]).abs();
        let lower = [f64::NEG_INFINITY; 2];
        let upper = [f64::INFINITY; 2];
        let min = nelder_mead(f, [0.5, 0.5], &lower, &upper, &NelderMeadOptions::default());
        assert!(min.value < 1e-6, "value = {}", min.value);
        assert!((min.x[0] - 2.0).abs() < 1e-5 && (min.x[1] - 1.0).abs() < 1e-5, "x = {:?}", min.x);
    }

    #[test]
    fn start_pinned_at_upper_bound_still_moves() {
        let f = |x: &[f64; 1]| (x[0] - 0.5).powi(2);
        let min = nelder_mead(f, [1.0], &[0.0], &[1.0], &NelderMeadOptions::default());
        assert!((min.x[0] - 0.5).abs() < 1e-6, "x = {:?}", min.x);
    }

    #[test]
    fn target_stops_early() {
        let f = |x: &[f64; 1]| x[0] * x[0];
        let options = NelderMeadOptions { target: 1e-2, ..NelderMeadOptions::default() };
        let min = nelder_mead(f, [3.0], &[-10.0], &[10.0], &options);
        assert!(min.value <= 1e-2);
        assert_eq!(min.restarts, 0);
    }

    #[test]
    fn restarts_cycle_through_every_scale() {
        let f = |x: &[f64; 1]| x[0] * x[0];
        let unbounded = ([f64::NEG_INFINITY], [f64::INFINITY]);
        let min = nelder_mead(f, [3.0], &unbounded.0, &unbounded.1, &NelderMeadOptions::default());
        assert!(min.value < 1e-12);
        // The first run solves it; each scale then gets one fruitless restart.
        assert_eq!(min.restarts, RESTART_SCALES.len());
    }

    #[test]
    fn start_on_box_corner_reaches_interior_crease() {
        let f = |x: &[f64; 2]| (x[0] - 0.99).abs() + (x[1] - 1.02).abs();
        let min =
            nelder_mead(f, [1.0, 1.0], &[0.0, 1.0], &[1.0, f64::INFINITY], &NelderMeadOptions::default());
        assert!(min.value < 1e-6, "value = {}, x = {:?}", min.value, min.x);
    }

    #[test]
    fn multistart_keeps_the_deeper_basin() {
        let f = |x: &[f64; 1]| ((x[0] - 1.0).powi(2)).min((x[0] + 2.0).powi(2) + 0.5);
        let lower = [-10.0];
        let upper = [10.0];
        let options = NelderMeadOptions::default();
        let min = nelder_mead_multistart(f, &[[-2.5], [0.8]], &lower, &upper, &options).unwrap();
        assert!((min.x[0] - 1.0).abs() < 1e-5, "x = {:?}", min.x);
        assert!(nelder_mead_multistart(f, &[], &lower, &upper, &options).is_none());
    }

    #[test]
    fn multistart_stops_once_target_is_met() {
        let f = |x: &[f64; 1]| x[0].abs();
        let options = NelderMeadOptions { target: 1e-3, ..NelderMeadOptions::default() };
        let first = nelder_mead(f, [0.0005], &[-1.0], &[1.0], &options);
        let multi =
            nelder_mead_multistart(f, &[[0.0005], [0.9]], &[-1.0], &[1.0], &options).unwrap();
        // The second start is never run.
        assert_eq!(multi.iterations, first.iterations);
        assert_eq!(multi.x, first.x);
    }
}
