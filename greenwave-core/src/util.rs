//! Utilities for interaction of policies and environments.
use crate::{
    record::{RecordValue, Recorder},
    Env, Policy,
};
use anyhow::Result;
use log::info;

/// Run episodes with a policy and a recorder, returning the return of each episode.
///
/// Every step is written to `recorder` with the entries produced by the environment
/// plus `"episode"`, `"step"` and `"reward"`.
pub fn eval_with_recorder<E, P, R>(
    env: &mut E,
    policy: &mut P,
    n_episodes: usize,
    recorder: &mut R,
) -> Result<Vec<f32>>
where
    E: Env,
    P: Policy<E>,
    R: Recorder,
{
    let mut rs = Vec::new();

    for episode in 0..n_episodes {
        let (mut prev_obs, _) = env.reset_with_index(episode)?;
        let mut count_step = 0;
        let mut r_total = 0.0;

        loop {
            let act = policy.sample(&prev_obs);
            let (step, mut record) = env.step(&act)?;
            r_total += step.reward;

            record.insert("episode", RecordValue::Scalar(episode as _));
            record.insert("step", RecordValue::Scalar(count_step as _));
            record.insert("reward", RecordValue::Scalar(step.reward));
            recorder.write(record);

            if step.is_done() {
                break;
            }
            prev_obs = step.obs;
            count_step += 1;
        }

        info!(
            "Episode {}: {} steps, return = {}",
            episode,
            count_step + 1,
            r_total
        );
        rs.push(r_total);
    }

    Ok(rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        record::{BufferedRecorder, Record},
        Act, DefaultEvaluator, Evaluator, Obs, Step,
    };

    #[derive(Clone, Debug)]
    struct CountObs(usize);

    impl Obs for CountObs {
        fn len(&self) -> usize {
            1
        }
    }

    #[derive(Clone, Debug)]
    struct CountAct(usize);

    impl Act for CountAct {
        fn len(&self) -> usize {
            1
        }
    }

    /// Ends after `horizon` steps; the reward is the action value.
    struct CountEnv {
        horizon: usize,
        t: usize,
    }

    impl Env for CountEnv {
        type Config = usize;
        type Obs = CountObs;
        type Act = CountAct;
        type Info = ();

        fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
            Ok(Self {
                horizon: *config,
                t: 0,
            })
        }

        fn reset(&mut self) -> Result<(Self::Obs, Self::Info)> {
            self.t = 0;
            Ok((CountObs(0), ()))
        }

        fn reset_with_index(&mut self, _ix: usize) -> Result<(Self::Obs, Self::Info)> {
            self.reset()
        }

        fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
            self.t += 1;
            let done = self.t >= self.horizon;
            let step = Step::new(CountObs(self.t), a.clone(), a.0 as f32, done, false, ());
            Ok((step, Record::from_scalar("t", self.t as f32)))
        }

        fn close(&mut self) {}
    }

    struct ConstPolicy(usize);

    impl Policy<CountEnv> for ConstPolicy {
        fn sample(&mut self, _obs: &CountObs) -> CountAct {
            CountAct(self.0)
        }
    }

    #[test]
    fn test_eval_with_recorder() -> Result<()> {
        let mut env = CountEnv::build(&3, 0)?;
        let mut recorder = BufferedRecorder::new();
        let rs = eval_with_recorder(&mut env, &mut ConstPolicy(2), 2, &mut recorder)?;

        assert_eq!(rs, vec![6.0, 6.0]);
        assert_eq!(recorder.len(), 6);
        let last = recorder.iter().last().unwrap();
        assert_eq!(last.get_scalar("episode")?, 1.0);
        assert_eq!(last.get_scalar("step")?, 2.0);
        assert_eq!(last.get_scalar("t")?, 3.0);
        Ok(())
    }

    #[test]
    fn test_default_evaluator() -> Result<()> {
        let mut evaluator = DefaultEvaluator::<CountEnv>::new(&4, 0, 3)?;
        let record = evaluator.evaluate(&mut ConstPolicy(1))?;

        assert_eq!(record.get_scalar("Episode return")?, 4.0);
        assert_eq!(record.get_scalar("Episode length")?, 4.0);
        Ok(())
    }
}
