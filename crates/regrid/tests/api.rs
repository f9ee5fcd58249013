//! Public API integration tests for regrid.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regrid::{
    resample, Bounds, EmissivityCalibration, GridDims, LineVariables, RegularGrid, SearchBox,
    SpatialIndex,
};

fn random_points(n: usize, extent: Vec3, seed: u64) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.gen_range(0.0..extent.x),
                rng.gen_range(0.0..extent.y),
                rng.gen_range(0.0..extent.z),
            )
        })
        .collect()
}

/// Reference answer: distance to the nearest in-box point.
fn brute_force_distance(points: &[Vec3], target: Vec3, search: &SearchBox) -> Option<f32> {
    points
        .iter()
        .filter(|p| search.contains(**p))
        .map(|p| p.distance_squared(target))
        .min_by(|a, b| a.total_cmp(b))
}

/// Compare `nearest_within` with a brute-force scan on random boxes whose
/// centres are drawn from `region` (padded by one unit).
fn check_against_brute_force(points: &[Vec3], region: Vec3, seed: u64) {
    let index = SpatialIndex::from_positions(points);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut found = 0;
    for _ in 0..500 {
        let target = Vec3::new(
            rng.gen_range(-1.0..region.x + 1.0),
            rng.gen_range(-1.0..region.y + 1.0),
            rng.gen_range(-1.0..region.z + 1.0),
        );
        let half = Vec3::new(
            rng.gen_range(0.05..0.8),
            rng.gen_range(0.05..0.8),
            rng.gen_range(0.01..1.5),
        );
        let search = SearchBox::new(target, half);

        let expected = brute_force_distance(points, target, &search);
        let actual = index.nearest_within(target, &search);
        match (expected, actual) {
            (None, None) => {}
            (Some(d), Some(id)) => {
                found += 1;
                assert!(search.contains(points[id]), "result must lie in the box");
                let got = points[id].distance_squared(target);
                assert!(
                    (got - d).abs() <= 1e-5,
                    "index returned distance^2 {got}, brute force {d}"
                );
            }
            (e, a) => panic!("mismatch at {target:?} half {half:?}: brute {e:?}, index {a:?}"),
        }
    }
    assert!(found > 0, "the test should exercise some hits");
}

#[test]
fn test_nearest_within_matches_brute_force() {
    let points = random_points(2_000, Vec3::new(10.0, 10.0, 4.0), 12345);
    check_against_brute_force(&points, Vec3::new(10.0, 10.0, 4.0), 777);
}

#[test]
fn test_nearest_within_on_planar_points() {
    // 2-D input: every sample shares z = 0
    let points: Vec<Vec3> = random_points(5_000, Vec3::new(10.0, 10.0, 1.0), 9)
        .into_iter()
        .map(|p| p.truncate().extend(0.0))
        .collect();
    check_against_brute_force(&points, Vec3::new(10.0, 10.0, 0.0), 31);
}

#[test]
fn test_nearest_within_on_lattice() {
    let mut points = Vec::with_capacity(200 * 200);
    for j in 0..200 {
        for i in 0..200 {
            points.push(Vec3::new(i as f32 * 0.05, j as f32 * 0.05, 0.0));
        }
    }
    check_against_brute_force(&points, Vec3::new(10.0, 10.0, 0.0), 5);
}

#[test]
fn test_nearest_within_on_duplicate_positions() {
    let sites = random_points(5, Vec3::new(10.0, 10.0, 4.0), 3);
    let points: Vec<Vec3> = (0..5_000).map(|i| sites[i % sites.len()]).collect();
    let index = SpatialIndex::from_positions(&points);

    for site in &sites {
        let search = SearchBox::new(*site, Vec3::splat(0.01));
        let id = index.nearest_within(*site, &search).unwrap();
        assert_eq!(points[id], *site);
    }
    check_against_brute_force(&points, Vec3::new(10.0, 10.0, 4.0), 8);
}

#[test]
fn test_resample_matches_per_cell_queries() {
    let points = random_points(300, Vec3::new(5.0, 5.0, 2.0), 42);
    let n = points.len();
    let peak: Vec<f32> = (0..n).map(|i| 1.0 + i as f32).collect();
    let width = vec![0.25; n];
    let zeros = vec![0.0; n];
    let vars = LineVariables::new(&peak, &width, [&zeros, &zeros, &zeros]);
    let index = SpatialIndex::from_positions(&points);
    let bounds = Bounds::from_points(points.iter().copied()).unwrap();
    let dims = GridDims::new(9, 8, 3);
    let radius = Vec3::new(0.3, 0.3, 0.5);
    let calibration = EmissivityCalibration::default();

    let grid = resample(&index, &vars, bounds, dims, radius, calibration).unwrap();

    assert_eq!(grid.cells.len(), dims.cell_count());
    assert_eq!(grid.emissivity.len(), dims.cell_count());

    let mut expected_hits = 0;
    for iy in 0..dims.ny {
        for ix in 0..dims.nx {
            for iz in 0..dims.nz {
                let position = RegularGrid::cell_position(&bounds, dims, ix, iy, iz);
                let search = SearchBox::new(position, radius);
                let cell = grid.cell(ix, iy, iz);
                match brute_force_distance(&points, position, &search) {
                    Some(_) => {
                        expected_hits += 1;
                        assert!(!cell.is_no_data());
                    }
                    None => assert!(cell.is_no_data(), "cell ({ix}, {iy}, {iz}) out of range"),
                }
            }
        }
    }
    assert_eq!(grid.hits, expected_hits);
}

#[test]
fn test_resample_planar_input() {
    let points: Vec<Vec3> = random_points(3_000, Vec3::new(6.0, 6.0, 1.0), 21)
        .into_iter()
        .map(|p| p.truncate().extend(0.0))
        .collect();
    let n = points.len();
    let peak = vec![2.0; n];
    let width = vec![0.5; n];
    let zeros = vec![0.0; n];
    let vars = LineVariables::new(&peak, &width, [&zeros, &zeros, &zeros]);
    let index = SpatialIndex::from_positions(&points);
    let bounds = Bounds::from_points(points.iter().copied()).unwrap();

    let grid = resample(
        &index,
        &vars,
        bounds,
        GridDims::new(16, 16, 1),
        Vec3::new(0.5, 0.5, 0.5),
        EmissivityCalibration::default(),
    )
    .unwrap();
    // dense enough that every cell finds a sample
    assert_eq!(grid.hits, 256);
}

#[test]
fn test_empty_input_gives_no_data_grid() {
    let index = SpatialIndex::from_positions(&[]);
    let empty: Vec<f32> = Vec::new();
    let vars = LineVariables::new(&empty, &empty, [&empty, &empty, &empty]);
    let bounds = Bounds::new(Vec3::ZERO, Vec3::ONE);
    let grid = resample(
        &index,
        &vars,
        bounds,
        GridDims::new(2, 2, 2),
        Vec3::ONE,
        EmissivityCalibration::default(),
    )
    .unwrap();
    assert_eq!(grid.hits, 0);
    assert!(grid.cells.iter().all(|c| c.is_no_data()));
}
