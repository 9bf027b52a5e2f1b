//! Solve the 3-D Poisson test problem with distributed CG.
//!
//! ```sh
//! cg_poisson                 # 128 x 128 x 128
//! cg_poisson 64 --ranks 8    # 64^3 on eight in-process ranks
//! cg_poisson 96 64 32 --tol 1e-10
//! ```
//!
//! With the `mpi` feature every MPI process is one rank and `--ranks` is
//! ignored; launch through `mpirun` instead.

use std::f64::consts::PI;

use anyhow::bail;
use clap::Parser;
use log::warn;

use poisson_cg::parallel::init_thread_pool;
use poisson_cg::{Comm, GridSize, KError, PoissonContext, SolveStats, SolverOptions, UniverseComm};
#[cfg(not(feature = "mpi"))]
use poisson_cg::SerialComm;

#[derive(Parser)]
#[command(name = "cg_poisson")]
#[command(about = "Matrix-free CG for -Δu = f on the unit cube")]
#[command(version)]
struct Cli {
    /// Grid points: none for 128^3, one for a cube, three for nx ny nz.
    #[arg(num_args = 0..=3)]
    dims: Vec<usize>,
    /// Number of in-process ranks (ignored under MPI).
    #[arg(long, default_value_t = 1)]
    ranks: usize,
    /// Relative residual tolerance.
    #[arg(long)]
    tol: Option<f64>,
    /// Iteration budget.
    #[arg(long)]
    max_iters: Option<usize>,
    /// Rayon threads per rank (default: logical CPUs shared among the ranks).
    #[arg(long)]
    threads: Option<usize>,
}

impl Cli {
    fn grid(&self) -> anyhow::Result<GridSize> {
        let grid = match self.dims[..] {
            [] => GridSize::cube(128)?,
            [n] => GridSize::cube(n)?,
            [nx, ny, nz] => GridSize::new(nx, ny, nz)?,
            _ => bail!("invalid number of grid arguments {} (should be 0, 1 or 3)", self.dims.len()),
        };
        Ok(grid)
    }

    fn options(&self) -> anyhow::Result<SolverOptions> {
        let defaults = SolverOptions::default();
        let options = SolverOptions {
            tol: self.tol.unwrap_or(defaults.tol),
            max_iters: self.max_iters.unwrap_or(defaults.max_iters),
        };
        options.validate()?;
        Ok(options)
    }
}

fn forcing(x: f64, y: f64, z: f64) -> f64 {
    z * (2.0 * PI * x).sin() * (PI * y).sin() + 8.0 * z * z * z
}

fn bottom_boundary(x: f64, y: f64) -> f64 {
    x * (1.0 - x) * y * (1.0 - y)
}

fn solve_poisson<C: Comm>(comm: &C, grid: GridSize, options: SolverOptions) -> Result<SolveStats, KError> {
    let mut ctx = PoissonContext::new(comm, grid, options)?;
    let d = ctx.decomposition().clone();
    let rank = comm.rank();
    if rank == 0 {
        let [npx, npy, npz] = d.process_dims();
        println!("Domain decomposition:");
        println!("Grid is           [{} x {} x {}]", grid.nx, grid.ny, grid.nz);
        println!("Processor grid is [{npx} x {npy} x {npz}]");
    }
    // one rank at a time for readable output
    for p in 0..comm.size() {
        if rank == p {
            let [nx, ny, nz] = d.local_dims();
            println!("Local grid on P{rank}: [{nx} x {ny} x {nz}]");
        }
        comm.barrier()?;
    }

    let b = ctx.assemble_rhs(forcing, bottom_boundary);
    let mut x = vec![0.0; b.len()];
    let stats = ctx.solve(&b, &mut x)?;
    if rank == 0 {
        println!(
            "CG converged in {} iterations, residual norm {:.6e}",
            stats.iterations, stats.final_residual
        );
        println!("{}", stats.timings);
    }
    Ok(stats)
}

/// Run one rank to completion and return its exit code.
fn run_rank<C: Comm>(comm: C, grid: GridSize, options: SolverOptions) -> i32 {
    let rank = comm.rank();
    match solve_poisson(&comm, grid, options) {
        Ok(_) => 0,
        Err(e) if e.is_fatal() => {
            eprintln!("cg_poisson: rank {rank}: {e}");
            comm.abort(1)
        }
        Err(e) => {
            if rank == 0 {
                eprintln!("cg_poisson: {e}");
            }
            1
        }
    }
}

#[cfg(feature = "mpi")]
fn launch(cli: &Cli, grid: GridSize, options: SolverOptions) -> anyhow::Result<i32> {
    let comm = UniverseComm::Mpi(poisson_cg::MpiComm::new()?);
    if cli.ranks != 1 && comm.rank() == 0 {
        warn!("--ranks {} ignored, running on {} MPI processes", cli.ranks, comm.size());
    }
    init_thread_pool(cli.threads, 1);
    Ok(run_rank(comm, grid, options))
}

#[cfg(not(feature = "mpi"))]
fn launch(cli: &Cli, grid: GridSize, options: SolverOptions) -> anyhow::Result<i32> {
    if cli.ranks == 0 {
        bail!("--ranks must be at least 1");
    }
    if cli.threads.is_some() && !cfg!(feature = "rayon") {
        warn!("--threads has no effect without the rayon feature");
    }
    init_thread_pool(cli.threads, cli.ranks);
    if cli.ranks == 1 {
        return Ok(run_rank(UniverseComm::Serial(SerialComm), grid, options));
    }
    let codes = poisson_cg::run_spmd(cli.ranks, |comm| run_rank(UniverseComm::Threads(comm), grid, options));
    Ok(codes.into_iter().max().unwrap_or(0))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let grid = cli.grid()?;
    let options = cli.options()?;

    let code = launch(&cli, grid, options)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
