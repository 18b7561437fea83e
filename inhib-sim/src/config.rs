//! Probe Configuration
//!
//! Run length and activity statistics for the synthetic driver.

use std::env;

use inhib_core::config::{AutoscaleParams, BandParams, BlockConfig, BoundaryKind, NetworkConfig, TargetedBlock};
use inhib_core::fixed::{ONE_S15, ONE_S20, ONE_S7};
use inhib_core::layer::{LayerId, LayerShape};
use inhib_core::{ConfigurationError, EngineConfig};

/// Probe run settings
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Cycles to run
    pub cycles: u64,
    /// Cycles per trial, 0 = a single trial
    pub trial_length: u64,
    /// Mean source activity (S7)
    pub mean_activity: i32,
    /// Uniform spread around the mean (S7)
    pub spread: i32,
    /// Print per-cycle stats as JSON lines
    pub json: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cycles: 100,
            trial_length: 25,
            mean_activity: 2 * ONE_S7,
            spread: ONE_S7,
            json: false,
        }
    }
}

impl ProbeConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(cycles) = env::var("INHIB_PROBE_CYCLES") {
            if let Ok(c) = cycles.parse() {
                config.cycles = c;
            }
        }

        if let Ok(trial) = env::var("INHIB_PROBE_TRIAL") {
            if let Ok(t) = trial.parse() {
                config.trial_length = t;
            }
        }

        if let Ok(mean) = env::var("INHIB_PROBE_MEAN") {
            if let Ok(m) = mean.parse() {
                config.mean_activity = m;
            }
        }

        if let Ok(spread) = env::var("INHIB_PROBE_SPREAD") {
            if let Ok(s) = spread.parse::<i32>() {
                config.spread = s.max(0);
            }
        }

        config.json = env::var("INHIB_PROBE_JSON")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        config
    }
}

/// Two layers with a surround block between them and a self-avoiding
/// block on the second layer
pub fn default_network(engine: EngineConfig) -> Result<NetworkConfig, ConfigurationError> {
    let retina = LayerShape::new(32, 32, 4)?;
    let cortex = LayerShape::new(32, 32, 2)?;

    let mut surround = BlockConfig::new(LayerId(0), 3, 2);
    surround.options.round = true;
    surround.boundary = BoundaryKind::Mirror;
    surround.bands = vec![
        BandParams {
            beta: ONE_S20 / 4,
            mxib: 0,
        },
        BandParams { beta: ONE_S20, mxib: 0 },
        BandParams {
            beta: ONE_S20 / 2,
            mxib: 8 * ONE_S7,
        },
    ];
    surround.itt = ONE_S7 / 2;
    surround.decay.omega = ONE_S15 / 2;
    surround.ihdelay = 1;
    surround.iovec = Some(0);

    let mut lateral = BlockConfig::new(LayerId(1), 2, 1);
    lateral.options.self_avoid = true;
    lateral.options.opposite_result = true;
    lateral.options.fast_start = true;
    lateral.boundary = BoundaryKind::Norm;
    lateral.gdefer = 2;
    lateral.gfscyc = 4;
    lateral.autoscale = Some(AutoscaleParams {
        target: ONE_S7,
        ..AutoscaleParams::default()
    });
    lateral.iovec = Some(1);

    Ok(NetworkConfig {
        engine,
        layers: vec![retina, cortex],
        blocks: vec![
            TargetedBlock {
                target: LayerId(1),
                block: surround,
            },
            TargetedBlock {
                target: LayerId(1),
                block: lateral,
            },
        ],
    })
}

/// Print startup banner with config info
pub fn print_banner(probe: &ProbeConfig, network: &NetworkConfig) {
    println!();
    println!("+----------------------------------------------+");
    println!("|          inhib-probe - lateral inhibition    |");
    println!("+----------------------------------------------+");
    println!("|  Layers: {:>6}                              |", network.layers.len());
    println!("|  Blocks: {:>6}                              |", network.blocks.len());
    println!("|  Cycles: {:>6}                              |", probe.cycles);
    println!("|  Trial:  {:>6}                              |", probe.trial_length);
    println!("|  Threads:{:>6}                              |", network.engine.threads);
    println!("+----------------------------------------------+");
    println!();
}
