//! inhib-probe - drive an inhibition network with synthetic activity
//!
//! Usage: `inhib-probe [network.json]`
//!
//! Without a path a built-in two-layer network is used. Engine settings
//! come from `INHIB_*` variables; probe settings from `INHIB_PROBE_*`.

mod config;

use rand::Rng;
use tracing::{error, info, Level};

use inhib_compute::InhibitionEngine;
use inhib_core::config::{EngineConfig, NetworkConfig};
use inhib_core::error::InhibResult;
use inhib_core::traits::{Delivery, SliceSource, VecSink};
use inhib_core::LayerId;

use config::{default_network, print_banner, ProbeConfig};

fn main() {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let probe = ProbeConfig::from_env();
    if let Err(e) = run(&probe) {
        error!("Probe failed: {}", e);
        std::process::exit(1);
    }
}

fn run(probe: &ProbeConfig) -> InhibResult<()> {
    let network = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading network from {}", path);
            NetworkConfig::load(&path)?
        }
        None => default_network(EngineConfig::from_env())?,
    };
    print_banner(probe, &network);

    let mut engine = InhibitionEngine::from_network(&network)?;
    let mut source = SliceSource::new();
    for (i, shape) in network.layers.iter().enumerate() {
        source.set(LayerId(i as u32), vec![0; shape.cells()]);
    }
    let mut sink = VecSink::new();
    let mut rng = rand::thread_rng();

    for cycle in 0..probe.cycles {
        if probe.trial_length > 0 && cycle > 0 && cycle % probe.trial_length == 0 {
            engine.new_trial();
        }

        for i in 0..network.layers.len() {
            if let Some(cells) = source.get_mut(LayerId(i as u32)) {
                for a in cells.iter_mut() {
                    *a = probe.mean_activity.saturating_add(rng.gen_range(-probe.spread..=probe.spread));
                }
            }
        }

        let stats = engine.cycle(&source, &mut sink)?;
        if probe.json {
            println!("{}", serde_json::to_string(&stats)?);
        }
    }

    // === Summary ===
    for (i, _) in network.layers.iter().enumerate() {
        let layer = LayerId(i as u32);
        for (index, block) in engine.blocks_for(layer).iter().enumerate() {
            let mean = sink.latest(layer, index).map(mean_magnitude).unwrap_or(0);
            info!(
                "Layer {} block {}: source {}, mean |out| {}, gbcm {}, overflows {}",
                i,
                index,
                block.source().0,
                mean,
                block.gbcm(),
                block.overflows().total()
            );
        }
    }
    info!("Overflow vector: {:?}", engine.overflow_vector().snapshot());
    info!("Scratch held: {} elements", engine.arena().held());

    Ok(())
}

fn mean_magnitude(values: &[Delivery]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().map(|d| (d.magnitude() as i64).abs()).sum::<i64>() / values.len() as i64
}
