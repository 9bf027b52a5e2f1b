//! Partition and neighbor properties of the block decomposition.
//!
//! For many grid shapes and process counts, every global cell must be owned
//! by exactly one rank, and neighbor relations must be symmetric with matching
//! shared-face extents.

use poisson_cg::{factor_process_grid, DomainDecomposition, Face, GridSize, KError};

fn shapes() -> Vec<GridSize> {
    let mut out = Vec::new();
    for nx in [3, 4, 7, 10] {
        for ny in [3, 5, 8] {
            for nz in [3, 6, 11] {
                out.push(GridSize::new(nx, ny, nz).unwrap());
            }
        }
    }
    out
}

fn all_ranks(grid: GridSize, nprocs: usize) -> Result<Vec<DomainDecomposition>, KError> {
    (0..nprocs).map(|r| DomainDecomposition::new(grid, nprocs, r)).collect()
}

#[test]
fn every_cell_has_exactly_one_owner() {
    for grid in shapes() {
        for nprocs in 1..=12 {
            let Ok(ranks) = all_ranks(grid, nprocs) else {
                continue;
            };
            let mut owner = vec![None; grid.num_points()];
            let mut total = 0;
            for d in &ranks {
                assert!(d.local_dims().iter().all(|&n| n >= 1));
                total += d.local_len();
                for idx in 0..d.local_len() {
                    let g = d.global_index(d.local_to_global(d.local_coords(idx)));
                    assert_eq!(owner[g], None, "cell {g} owned twice for {grid:?} on {nprocs} ranks");
                    owner[g] = Some(d.rank());
                }
            }
            assert_eq!(total, grid.num_points());
            assert!(owner.iter().all(Option::is_some));
        }
    }
}

#[test]
fn neighbors_are_symmetric_and_faces_match() {
    for grid in shapes() {
        for nprocs in [2, 3, 4, 6, 8, 12] {
            let Ok(ranks) = all_ranks(grid, nprocs) else {
                continue;
            };
            for d in &ranks {
                for face in Face::ALL {
                    let Some(peer) = d.neighbor(face) else {
                        assert!(d.boundary_faces().contains_face(face));
                        continue;
                    };
                    let other = &ranks[peer];
                    assert_eq!(other.neighbor(face.opposite()), Some(d.rank()));
                    // the shared face has the same extent on both sides
                    for axis in (0..3).filter(|&a| a != face.axis()) {
                        assert_eq!(d.local_dims()[axis], other.local_dims()[axis]);
                        assert_eq!(d.offset()[axis], other.offset()[axis]);
                    }
                    // and the blocks touch
                    let (lo, hi) = if face.is_upper() { (d, other) } else { (other, d) };
                    let a = face.axis();
                    assert_eq!(lo.offset()[a] + lo.local_dims()[a], hi.offset()[a]);
                }
            }
        }
    }
}

#[test]
fn decomposition_is_deterministic_and_rank_ordered() {
    let grid = GridSize::new(10, 8, 6).unwrap();
    let procs = factor_process_grid(&grid, 12).unwrap();
    assert_eq!(procs, factor_process_grid(&grid, 12).unwrap());
    let ranks = all_ranks(grid, 12).unwrap();
    for d in &ranks {
        assert_eq!(d.process_dims(), procs);
        assert_eq!(d.rank_of(d.process_coords()), d.rank());
        assert_eq!(d.coords_of(d.rank()), d.process_coords());
        assert_eq!(d.for_rank(d.rank()).unwrap(), *d);
    }
}

#[test]
fn impossible_layouts_are_configuration_errors() {
    let grid = GridSize::cube(3).unwrap();
    // 5 and 7 are prime and larger than every axis
    assert!(matches!(all_ranks(grid, 5), Err(KError::Config(_))));
    assert!(matches!(all_ranks(grid, 7), Err(KError::Config(_))));
    assert!(matches!(GridSize::cube(2), Err(KError::Config(_))));
}
