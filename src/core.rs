//! Driving Markov chains: the burn-in/sampling loop and independent parallel
//! chains.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ndarray::{ArrayD, NdFloat};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::HmcError;
use crate::leapfrog::Trajectory;
use crate::metropolis::{AcceptanceRecord, Decision};
use crate::stats::AcceptanceWindow;

const PROGRESS_TEMPLATE: &str = "{prefix:8} {bar:40.white} ETA {eta:3} | {msg}";

/// Where a sampler is in its life cycle.
///
/// Every run moves `BurnIn → Sampling → Done`. Any error moves the sampler to
/// `Aborted`, after which it refuses to step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Init,
    BurnIn,
    Sampling,
    Done,
    Aborted,
}

/// One completed accept/reject step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    pub decision: Decision<T>,
    /// Leapfrog steps used for this trajectory.
    pub n_steps: usize,
    /// Full trajectory, present only when requested.
    pub path: Option<Trajectory<T>>,
}

pub trait MarkovChain<T> {
    /// Performs one transition. Afterwards [`current_state`](Self::current_state)
    /// is either the accepted proposal or the unchanged previous state.
    fn step(&mut self, save_path: bool) -> Result<Transition<T>, HmcError>;

    /// The state the next transition starts from.
    fn current_state(&self) -> &ArrayD<T>;

    /// Notification that the driver moved to `phase`.
    fn enter(&mut self, _phase: Phase) {}
}

/// Per-run switches for what gets retained besides the configurations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Keep every leapfrog trajectory.
    #[serde(default)]
    pub save_paths: bool,
    /// Keep per-decision energies and acceptance probabilities.
    #[serde(default)]
    pub record_acceptance: bool,
}

/// Output of one run.
///
/// `initial` is the state before the first decision. `burn_in` and `samples`
/// each hold one configuration per decision, so the chain has
/// `1 + burn_in.len() + samples.len()` entries and the acceptance record, when
/// present, has one entry fewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain<T> {
    pub initial: ArrayD<T>,
    pub burn_in: Vec<ArrayD<T>>,
    pub samples: Vec<ArrayD<T>>,
    pub acceptance: Option<AcceptanceRecord<T>>,
    pub paths: Option<Vec<Trajectory<T>>>,
}

impl<T> Chain<T> {
    /// Number of configurations including the initial state.
    pub fn len(&self) -> usize {
        1 + self.burn_in.len() + self.samples.len()
    }

    /// Always `false`: a chain holds at least its initial state.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of accept/reject decisions taken.
    pub fn n_decisions(&self) -> usize {
        self.len() - 1
    }

    /// All configurations in order: initial, burn-in, samples.
    pub fn iter(&self) -> impl Iterator<Item = &ArrayD<T>> {
        std::iter::once(&self.initial)
            .chain(self.burn_in.iter())
            .chain(self.samples.iter())
    }

    /// The final configuration.
    pub fn last(&self) -> &ArrayD<T> {
        self.samples
            .last()
            .or_else(|| self.burn_in.last())
            .unwrap_or(&self.initial)
    }

    /// `(burn_in, samples)`.
    pub fn into_parts(self) -> (Vec<ArrayD<T>>, Vec<ArrayD<T>>) {
        (self.burn_in, self.samples)
    }
}

fn progress_style() -> Result<ProgressStyle, HmcError> {
    Ok(ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)?
        .progress_chars("=>-"))
}

/// Runs `n_burn_in` burn-in transitions followed by `n_samples` sampling
/// transitions and collects every configuration.
///
/// When `pb` is given it is advanced once per transition and its message shows
/// the acceptance rate over the last 100 decisions.
pub fn run_chain<T, M>(
    chain: &mut M,
    n_samples: usize,
    n_burn_in: usize,
    options: &RunOptions,
    pb: Option<&ProgressBar>,
) -> Result<Chain<T>, HmcError>
where
    T: NdFloat,
    M: MarkovChain<T> + ?Sized,
{
    let total = n_burn_in + n_samples;
    let initial = chain.current_state().clone();
    let mut acceptance = options
        .record_acceptance
        .then(|| AcceptanceRecord::with_capacity(total));
    let mut paths = options.save_paths.then(|| Vec::with_capacity(total));
    let mut window = AcceptanceWindow::default();
    let mut n_accepted = 0usize;

    if let Some(pb) = pb {
        pb.set_length(total as u64);
    }

    let mut burn_in = Vec::with_capacity(n_burn_in);
    let mut samples = Vec::with_capacity(n_samples);

    for (phase, n, out) in [
        (Phase::BurnIn, n_burn_in, &mut burn_in),
        (Phase::Sampling, n_samples, &mut samples),
    ] {
        chain.enter(phase);
        for _ in 0..n {
            let transition = match chain.step(options.save_paths) {
                Ok(t) => t,
                Err(e) => {
                    chain.enter(Phase::Aborted);
                    return Err(e);
                }
            };
            out.push(chain.current_state().clone());

            let accepted = transition.decision.accepted;
            n_accepted += accepted as usize;
            if let Some(record) = acceptance.as_mut() {
                record.push(&transition.decision, transition.n_steps);
            }
            if let (Some(paths), Some(path)) = (paths.as_mut(), transition.path) {
                paths.push(path);
            }
            if let Some(pb) = pb {
                window.push(accepted);
                pb.inc(1);
                pb.set_message(format!("p(accept)≈{:.2}", window.rate()));
            }
        }
    }
    chain.enter(Phase::Done);

    if let Some(pb) = pb {
        pb.finish_with_message("Done!");
    }
    if total > 0 {
        log::info!(
            "chain finished: {} burn-in + {} samples, acceptance rate {:.3}",
            n_burn_in,
            n_samples,
            n_accepted as f64 / total as f64
        );
    }

    Ok(Chain {
        initial,
        burn_in,
        samples,
        acceptance,
        paths,
    })
}

/// Like [`run_chain`] with a single progress bar labelled `prefix`.
pub fn run_chain_with_progress<T, M>(
    chain: &mut M,
    n_samples: usize,
    n_burn_in: usize,
    options: &RunOptions,
    prefix: &str,
) -> Result<Chain<T>, HmcError>
where
    T: NdFloat,
    M: MarkovChain<T> + ?Sized,
{
    let pb = ProgressBar::new((n_samples + n_burn_in) as u64);
    pb.set_style(progress_style()?);
    pb.set_prefix(prefix.to_string());
    run_chain(chain, n_samples, n_burn_in, options, Some(&pb))
}

/// Runs independent chains in parallel, one rayon task per chain.
///
/// Chains share nothing; each must own its random source. The result for each
/// chain is reported separately so one diverging chain does not discard the
/// others.
pub fn run_chains<T, M>(
    chains: &mut [M],
    n_samples: usize,
    n_burn_in: usize,
    options: &RunOptions,
) -> Vec<Result<Chain<T>, HmcError>>
where
    T: NdFloat,
    M: MarkovChain<T> + Send,
{
    chains
        .par_iter_mut()
        .map(|chain| run_chain(chain, n_samples, n_burn_in, options, None))
        .collect()
}

/// [`run_chains`] with one progress bar per chain.
pub fn run_chains_with_progress<T, M>(
    chains: &mut [M],
    n_samples: usize,
    n_burn_in: usize,
    options: &RunOptions,
) -> Result<Vec<Result<Chain<T>, HmcError>>, HmcError>
where
    T: NdFloat,
    M: MarkovChain<T> + Send,
{
    let multi = MultiProgress::new();
    let style = progress_style()?;
    let total = (n_samples + n_burn_in) as u64;

    Ok(chains
        .par_iter_mut()
        .enumerate()
        .map(|(i, chain)| {
            let pb = multi.add(ProgressBar::new(total));
            pb.set_prefix(format!("Chain {i}"));
            pb.set_style(style.clone());
            run_chain(chain, n_samples, n_burn_in, options, Some(&pb))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, IxDyn};

    /// Counts upward on acceptance and stays put on rejection, rejecting
    /// every third step.
    struct Counter {
        state: ArrayD<f64>,
        calls: usize,
        fail_at: Option<usize>,
        phases: Vec<Phase>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                state: arr1(&[0.0]).into_dyn(),
                calls: 0,
                fail_at: None,
                phases: Vec::new(),
            }
        }
    }

    impl MarkovChain<f64> for Counter {
        fn step(&mut self, save_path: bool) -> Result<Transition<f64>, HmcError> {
            self.calls += 1;
            if Some(self.calls) == self.fail_at {
                return Err(HmcError::InvalidConfig("boom".to_string()));
            }
            let accepted = self.calls % 3 != 0;
            if accepted {
                self.state += 1.0;
            }
            let path = save_path.then(|| Trajectory {
                momenta: vec![self.state.clone()],
                positions: vec![self.state.clone()],
            });
            Ok(Transition {
                decision: Decision {
                    accepted,
                    probability: 1.0,
                    delta_h: 0.0,
                    h_old: 0.0,
                    h_new: 0.0,
                },
                n_steps: 1,
                path,
            })
        }

        fn current_state(&self) -> &ArrayD<f64> {
            &self.state
        }

        fn enter(&mut self, phase: Phase) {
            self.phases.push(phase);
        }
    }

    #[test]
    fn test_lengths_and_phases() {
        let mut chain = Counter::new();
        let options = RunOptions {
            save_paths: true,
            record_acceptance: true,
        };
        let out = run_chain(&mut chain, 7, 5, &options, None).unwrap();
        assert_eq!(out.burn_in.len(), 5);
        assert_eq!(out.samples.len(), 7);
        assert_eq!(out.len(), 13);
        assert_eq!(out.n_decisions(), 12);
        assert_eq!(out.iter().count(), 13);
        assert_eq!(out.acceptance.as_ref().unwrap().len(), 12);
        assert_eq!(out.paths.as_ref().unwrap().len(), 12);
        assert_eq!(out.initial, arr1(&[0.0]).into_dyn());
        assert_eq!(out.last(), chain.current_state());
        assert_eq!(
            chain.phases,
            vec![Phase::BurnIn, Phase::Sampling, Phase::Done]
        );
    }

    #[test]
    fn test_rejection_repeats_previous_entry() {
        let mut chain = Counter::new();
        let out = run_chain(
            &mut chain,
            9,
            0,
            &RunOptions {
                record_acceptance: true,
                ..Default::default()
            },
            None,
        )
        .unwrap();
        let states: Vec<&ArrayD<f64>> = out.iter().collect();
        let record = out.acceptance.as_ref().unwrap();
        for (i, accepted) in record.accepted.iter().enumerate() {
            if *accepted {
                assert_ne!(states[i + 1], states[i]);
            } else {
                assert_eq!(states[i + 1], states[i]);
            }
        }
    }

    #[test]
    fn test_nothing_retained_by_default() {
        let mut chain = Counter::new();
        let out = run_chain(&mut chain, 3, 2, &RunOptions::default(), None).unwrap();
        assert!(out.acceptance.is_none());
        assert!(out.paths.is_none());
        let (burn_in, samples) = out.into_parts();
        assert_eq!((burn_in.len(), samples.len()), (2, 3));
    }

    #[test]
    fn test_empty_run_keeps_initial_state() {
        let mut chain = Counter::new();
        let out = run_chain(&mut chain, 0, 0, &RunOptions::default(), None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.last(), &ArrayD::<f64>::zeros(IxDyn(&[1])));
    }

    #[test]
    fn test_error_aborts_run() {
        let mut chain = Counter::new();
        chain.fail_at = Some(4);
        let err = run_chain(&mut chain, 10, 2, &RunOptions::default(), None).unwrap_err();
        assert!(matches!(err, HmcError::InvalidConfig(_)));
        assert_eq!(
            chain.phases,
            vec![Phase::BurnIn, Phase::Sampling, Phase::Aborted]
        );
    }

    #[test]
    fn test_parallel_chains_are_independent() {
        let mut chains: Vec<Counter> = (0..4).map(|_| Counter::new()).collect();
        chains[2].fail_at = Some(3);
        let results = run_chains(&mut chains, 4, 1, &RunOptions::default());
        assert_eq!(results.len(), 4);
        for (i, result) in results.iter().enumerate() {
            if i == 2 {
                assert!(result.is_err());
            } else {
                assert_eq!(result.as_ref().unwrap().len(), 6);
            }
        }
    }
}
