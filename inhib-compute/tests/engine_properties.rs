//! End-to-end behavior of the inhibition engine on small literal networks.

use rand::seq::SliceRandom;
use rand::Rng;

use inhib_compute::{accumulate_cells, InhibitionEngine};
use inhib_core::config::{BandParams, BlockConfig, EngineConfig, InhibOptions};
use inhib_core::fixed::{Activity, BAND_SUM_CEILING, ONE_S20};
use inhib_core::layer::{LayerId, LayerRegistry, LayerShape};
use inhib_core::traits::{Delivery, SliceSource, VecSink};

/// Separate 2x2 source and target layers, one cell per group
fn two_by_two() -> (InhibitionEngine, LayerId, LayerId) {
    let mut registry = LayerRegistry::new();
    let source = registry.register(LayerShape::new(2, 2, 1).unwrap());
    let target = registry.register(LayerShape::new(2, 2, 1).unwrap());
    (
        InhibitionEngine::new(registry, EngineConfig::default()).unwrap(),
        source,
        target,
    )
}

fn two_band_block(source: LayerId) -> BlockConfig {
    let mut config = BlockConfig::new(source, 2, 1);
    config.bands = vec![
        BandParams {
            beta: ONE_S20 / 2,
            mxib: 0,
        },
        BandParams { beta: ONE_S20, mxib: 0 },
    ];
    config
}

fn additive(values: &[i32]) -> Vec<Delivery> {
    values.iter().map(|&v| Delivery::Additive(v)).collect()
}

/// 4.0, 2.0, 6.0, 8.0 in S7
const ACTIVITY: [Activity; 4] = [512, 256, 768, 1024];

#[test]
fn test_all_options_off_matches_weighted_sum() {
    let (mut engine, source, target) = two_by_two();
    let mut config = two_band_block(source);
    config.itt = 128;
    engine.add_block(target, config).unwrap();

    let mut feed = SliceSource::new();
    feed.set(source, ACTIVITY.to_vec());
    let mut sink = VecSink::new();
    engine.cycle(&feed, &mut sink).unwrap();

    // band 0 is the group itself (area 1), band 1 the 8 neighbors of
    // which 3 are inside the layer (nominal area 8)
    let total: i64 = ACTIVITY.iter().map(|&a| a as i64).sum();
    let expected: Vec<i32> = ACTIVITY
        .iter()
        .map(|&a| {
            let own = a as i64 / 2;
            let others = (total - a as i64) / 8;
            (own + others - 128).max(0) as i32
        })
        .collect();
    assert_eq!(expected, vec![384, 288, 480, 576]);
    assert_eq!(sink.latest(target, 0), Some(&additive(&expected)[..]));
}

#[test]
fn test_max_combine_picks_strongest_band() {
    let (mut engine, source, target) = two_by_two();
    let mut config = two_band_block(source);
    config.options = InhibOptions {
        max_combine: true,
        ..InhibOptions::default()
    };
    engine.add_block(target, config).unwrap();

    let mut feed = SliceSource::new();
    feed.set(source, ACTIVITY.to_vec());
    let mut sink = VecSink::new();
    engine.cycle(&feed, &mut sink).unwrap();

    assert_eq!(sink.latest(target, 0), Some(&additive(&[256, 288, 384, 512])[..]));
}

#[test]
fn test_band_sums_ignore_visit_order() {
    let mut rng = rand::thread_rng();
    let nel = 4;
    let groups = 25;
    let activity: Vec<Activity> = (0..nel * groups).map(|_| rng.gen_range(-2000..2000)).collect();

    for options in [
        InhibOptions::default(),
        InhibOptions {
            square_sums: true,
            ..InhibOptions::default()
        },
        InhibOptions {
            positive_only: true,
            ..InhibOptions::default()
        },
    ] {
        let mut exc = vec![0; groups];
        let mut inh = vec![0; groups];
        accumulate_cells(activity.iter().copied().enumerate(), nel, &options, &mut exc, &mut inh);

        let mut order: Vec<(usize, Activity)> = activity.iter().copied().enumerate().collect();
        for _ in 0..5 {
            order.shuffle(&mut rng);
            let mut shuffled_exc = vec![0; groups];
            let mut shuffled_inh = vec![0; groups];
            accumulate_cells(order.iter().copied(), nel, &options, &mut shuffled_exc, &mut shuffled_inh);
            assert_eq!(exc, shuffled_exc);
            assert_eq!(inh, shuffled_inh);
        }
    }
}

#[test]
fn test_overflow_clamps_and_counts() {
    let mut registry = LayerRegistry::new();
    let source = registry.register(LayerShape::new(1, 1, 3).unwrap());
    let target = registry.register(LayerShape::new(1, 1, 1).unwrap());
    let mut engine = InhibitionEngine::new(registry, EngineConfig::default()).unwrap();

    let mut config = BlockConfig::new(source, 1, 1);
    config.bands[0].beta = 4 * ONE_S20;
    config.iovec = Some(0);
    engine.add_block(target, config).unwrap();

    let mut feed = SliceSource::new();
    feed.set(source, vec![i32::MAX; 3]);
    let mut sink = VecSink::new();
    let stats = engine.cycle(&feed, &mut sink).unwrap();

    let block = &engine.blocks_for(target)[0];
    assert_eq!(block.bands()[0].sums[0], BAND_SUM_CEILING);
    assert!(block.overflows().band_sum >= 1);
    assert!(block.overflows().combined >= 1);
    assert_eq!(stats.overflows.total(), block.overflows().total());
    assert_eq!(engine.overflow_vector().get(0), block.overflows().total());

    // clamped, never wrapped to a negative value
    assert_eq!(sink.latest(target, 0), Some(&[Delivery::Additive(i32::MAX)][..]));
}

#[test]
fn test_delay_shifts_step_by_depth() {
    let mut registry = LayerRegistry::new();
    let source = registry.register(LayerShape::new(1, 1, 1).unwrap());
    let target = registry.register(LayerShape::new(1, 1, 1).unwrap());
    let mut engine = InhibitionEngine::new(registry, EngineConfig::default()).unwrap();

    let mut config = BlockConfig::new(source, 1, 1);
    config.ihdelay = 2;
    engine.add_block(target, config).unwrap();

    let mut feed = SliceSource::new();
    let mut sink = VecSink::new();
    for t in 0..8 {
        feed.set(source, vec![if t >= 3 { 256 } else { 0 }]);
        engine.cycle(&feed, &mut sink).unwrap();
        let expected = if t >= 5 { 256 } else { 0 };
        assert_eq!(
            sink.latest(target, 0),
            Some(&[Delivery::Additive(expected)][..]),
            "cycle {}",
            t
        );
    }
}

#[test]
fn test_fast_start_primes_delay_line() {
    let mut registry = LayerRegistry::new();
    let source = registry.register(LayerShape::new(1, 1, 1).unwrap());
    let target = registry.register(LayerShape::new(1, 1, 1).unwrap());
    let mut engine = InhibitionEngine::new(registry, EngineConfig::default()).unwrap();

    let mut config = BlockConfig::new(source, 1, 1);
    config.ihdelay = 2;
    config.options.fast_start = true;
    engine.add_block(target, config).unwrap();

    let mut feed = SliceSource::new();
    feed.set(source, vec![256]);
    let mut sink = VecSink::new();
    for _ in 0..4 {
        engine.cycle(&feed, &mut sink).unwrap();
        assert_eq!(sink.latest(target, 0), Some(&[Delivery::Additive(256)][..]));
    }
}
