//! Property tests for the step scheduler.

use contagion_kernel::{
    ChannelPair, Model, SatiationConfig, SatiationOrder, SimConfig, ThresholdSource,
};
use proptest::prelude::*;

fn satiating_config(agents: usize, constant: f64, seed: u64) -> SimConfig {
    SimConfig {
        agents,
        max_steps: 60,
        seed: Some(seed),
        satiation: Some(SatiationConfig {
            constant,
            order: SatiationOrder::BeforeRelaxation,
        }),
        ..Default::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn deterministic_under_fixed_seed(seed in 0_u64..10_000, agents in 1_usize..30) {
        let config = satiating_config(agents, 0.2, seed);
        let mut a = Model::new(config.clone()).unwrap();
        let mut b = Model::new(config).unwrap();
        prop_assert_eq!(a.run(), b.run());

        let bits = |m: &Model| -> Vec<u64> {
            m.inactive()
                .iter()
                .flat_map(|agent| agent.history().iter())
                .flat_map(|s| [s.valence.to_bits(), s.arousal.to_bits()])
                .chain(m.field().history().iter().map(|c| c.signed.to_bits()))
                .collect()
        };
        prop_assert_eq!(bits(&a), bits(&b));
        prop_assert_eq!(a.population_history(), b.population_history());
    }

    #[test]
    fn population_conserved(seed in 0_u64..10_000, agents in 1_usize..40, constant in 0.0_f64..2.0) {
        let mut model = Model::new(satiating_config(agents, constant, seed)).unwrap();
        while model.step().is_some() {
            prop_assert_eq!(model.active().len() + model.inactive().len(), agents);
        }
        prop_assert_eq!(model.inactive().len(), agents);

        let mut ids: Vec<usize> = model.inactive().iter().map(|a| a.id().0).collect();
        ids.sort_unstable();
        prop_assert_eq!(ids, (0..agents).collect::<Vec<_>>());
    }

    #[test]
    fn histories_align_with_steps(seed in 0_u64..10_000, constant in 0.0_f64..1.0) {
        let mut model = Model::new(satiating_config(15, constant, seed)).unwrap();
        model.run();
        let steps = model.step_count();
        prop_assert_eq!(model.field().history().len(), steps + 1);
        prop_assert_eq!(model.population_history().len(), steps + 1);
        for agent in model.inactive() {
            let expected = agent.exited_at().unwrap_or(steps);
            prop_assert_eq!(agent.history().len(), expected);
        }
    }

    #[test]
    fn relaxation_never_overshoots(seed in 0_u64..1_000, v0 in -5.0_f64..5.0, a0 in -5.0_f64..5.0) {
        let config = SimConfig {
            agents: 1,
            threshold: ThresholdSource::Fixed { value: 1.0e9 },
            amplitude: ChannelPair::new(0.0, 0.0),
            ..Default::default()
        };
        let mut agent = contagion_kernel::Agent::new(0, &config, seed).with_state(v0, a0);
        let baseline = agent.baseline();
        let mut last = (agent.valence() - baseline.valence).abs();
        for _ in 0..40 {
            agent.relax(&config.decay, config.dt);
            let now = (agent.valence() - baseline.valence).abs();
            prop_assert!(now <= last);
            last = now;
        }
    }
}
