//! Default implementation of the [`Evaluator`] trait.
use super::Evaluator;
use crate::{
    record::{Record, RecordValue},
    Env, Policy,
};
use anyhow::Result;
use log::info;

/// Runs a fixed number of episodes and averages their returns and lengths.
///
/// The returned [`Record`] has the scalar entries `"Episode return"` and
/// `"Episode length"`.
///
/// ```ignore
/// let mut evaluator = DefaultEvaluator::<SumoEnv>::new(&config, 42, 5)?;
/// let record = evaluator.evaluate(&mut policy)?;
/// println!("Average return: {}", record.get_scalar("Episode return")?);
/// ```
pub struct DefaultEvaluator<E: Env> {
    n_episodes: usize,
    env: E,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P>(&mut self, policy: &mut P) -> Result<Record>
    where
        P: Policy<E>,
    {
        let mut r_total = 0f32;
        let mut len_total = 0usize;

        for ix in 0..self.n_episodes {
            let (mut prev_obs, _) = self.env.reset_with_index(ix)?;
            let mut r_episode = 0f32;
            let mut len_episode = 0usize;

            loop {
                let act = policy.sample(&prev_obs);
                let (step, _) = self.env.step(&act)?;
                r_episode += step.reward;
                len_episode += 1;
                if step.is_done() {
                    break;
                }
                prev_obs = step.obs;
            }

            info!(
                "Evaluation episode {}: {} steps, return = {}",
                ix, len_episode, r_episode
            );
            r_total += r_episode;
            len_total += len_episode;
        }
        self.env.close();

        let n = self.n_episodes.max(1) as f32;
        Ok(Record::from_slice(&[
            ("Episode return", RecordValue::Scalar(r_total / n)),
            ("Episode length", RecordValue::Scalar(len_total as f32 / n)),
        ]))
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a new [`DefaultEvaluator`].
    ///
    /// * `config` - Configuration of the environment.
    /// * `seed` - Random seed given to [`Env::build`].
    /// * `n_episodes` - Number of episodes to run in one evaluation.
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            env: E::build(config, seed)?,
        })
    }

    /// Constructs a [`DefaultEvaluator`] from an already built environment.
    pub fn from_env(env: E, n_episodes: usize) -> Self {
        Self { n_episodes, env }
    }
}
