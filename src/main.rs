//! VMC command-line driver.
//!
//! Reads a YAML run configuration, builds the molecule and trial
//! wavefunction, samples it and reports walker-averaged statistics.

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rust_vmc::io::coefficient_matrix;
use rust_vmc::sampling::stats;
use rust_vmc::{
    boundary, initial_guess, initial_guess_vectorized, normalize_obdm, DipoleAccumulator, MolecularSystem, Molecule,
    ObdmAccumulator, PadeJastrow, Product, RunConfig, SlaterDeterminant, StepAverages, VmcSimulation, Wavefunction,
};

#[derive(Parser, Debug)]
#[command(version, about = "Variational Monte Carlo sampler", long_about = None)]
struct Args {
    /// Path to the YAML run configuration
    #[arg(short, long, default_value = "config/h2.yml")]
    config: String,

    /// Random seed (overrides config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of VMC steps (overrides config file)
    #[arg(long)]
    steps: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let mut config = RunConfig::load(&args.config)
        .wrap_err_with(|| format!("Unable to load configuration file: {}", args.config))?;
    if let Some(seed) = args.seed {
        info!("Overriding seed with: {}", seed);
        config.seed = seed;
    }
    if let Some(steps) = args.steps {
        info!("Overriding nsteps with: {}", steps);
        config.vmc.nsteps = steps;
    }
    info!("Configuration loaded:\n{:?}", config);

    let mol = config.build_molecule().wrap_err("Invalid molecule")?;
    let nbasis = mol.nbasis();
    let up = coefficient_matrix(&config.orbitals.up, nbasis).wrap_err("Invalid spin-up orbitals")?;
    let slater = match &config.orbitals.down {
        Some(down) => {
            let down = coefficient_matrix(down, nbasis).wrap_err("Invalid spin-down orbitals")?;
            SlaterDeterminant::new(mol.clone(), [up, down])?
        }
        None => SlaterDeterminant::restricted(mol.clone(), &up)?,
    };

    match config.jastrow {
        Some(params) => {
            let distance = boundary(config.lattice_vectors())?;
            let jastrow = PadeJastrow::new(params, mol.nelec(), distance)?;
            info!("Trial wavefunction: Slater x Pade-Jastrow (b = {})", params.b);
            run(&config, &mol, Product::new(slater, jastrow))
        }
        None => {
            info!("Trial wavefunction: Slater determinant");
            run(&config, &mol, slater)
        }
    }
}

fn run<W: Wavefunction>(config: &RunConfig, mol: &Molecule, mut wf: W) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut configs = if config.vectorized_init {
        initial_guess_vectorized(mol, config.nconfig, config.init_spread, &mut rng)?
    } else {
        initial_guess(mol, config.nconfig, config.init_spread, &mut rng)?
    };

    let mut vmc = VmcSimulation::new(mol, config.vmc).with_accumulator("dipole", DipoleAccumulator);
    if let (Some(obdm), Some(orb_coeff)) = (&config.obdm, config.obdm_coefficients(mol.nbasis())?) {
        let accumulator = ObdmAccumulator::new(mol, orb_coeff, obdm.params.clone(), &mut rng)
            .wrap_err("Unable to set up the OBDM accumulator")?;
        vmc.add_accumulator("obdm", accumulator);
    }

    let history = vmc.run(&mut wf, &mut configs, &mut rng)?;
    report(&history, config.warmup);
    Ok(())
}

fn report(history: &[StepAverages], warmup: usize) {
    info!("\nVMC finished: {} steps, {} discarded as warmup", history.len(), warmup);

    for name in ["acceptance", "obdmacceptance"] {
        if let Some(est) = stats::estimate(&stats::scalar_series(history, name, warmup)) {
            info!(
                "{}: {:.6} ± {:.6} (autocorrelation time {:.2})",
                name, est.mean, est.error, est.autocorrelation_time
            );
        }
    }

    if let Some(dipole) = stats::average_matrix(history, "dipolevec", warmup) {
        info!("Electronic dipole: [{:.6}, {:.6}, {:.6}]", dipole[0], dipole[1], dipole[2]);
    }

    let value = stats::average_matrix(history, "obdmvalue", warmup);
    let norm = stats::average_matrix(history, "obdmnorm", warmup);
    if let (Some(value), Some(norm)) = (value, norm) {
        let norm = norm.column(0).into_owned();
        let rho = normalize_obdm(&value, &norm);
        info!("Normalized one-body density matrix:");
        for i in 0..rho.nrows() {
            for j in 0..rho.ncols() {
                let series: Vec<f64> = history
                    .iter()
                    .skip(warmup)
                    .filter_map(|step| step.get("obdmvalue"))
                    .map(|m| m[(i, j)])
                    .collect();
                let error = stats::estimate(&series).map_or(0.0, |est| est.error);
                info!(
                    "  rho[{}][{}] = {:.6} ± {:.6}",
                    i,
                    j,
                    rho[(i, j)],
                    error / (norm[i] * norm[j]).sqrt()
                );
            }
        }
    }
}
