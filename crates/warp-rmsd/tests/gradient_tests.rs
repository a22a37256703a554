mod common;
use common::{assert_close, random_coords, seeded, REF_SOURCE, REF_TARGET};
use warp_rmsd::padding::{pad, unpad_with};
use warp_rmsd::{
    gradcheck, Coords2Rmsd, CoordTensor, GradCheckOptions, GradSpace, RmsdError, SolverOptions,
    SuperposeMethod,
};

fn padded(values: &[f64], capacity: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    out.resize(3 * capacity, 0.0);
    out
}

#[test]
fn reference_case_passes_gradcheck() {
    let layer = Coords2Rmsd::default();
    for space in [GradSpace::Rmsd, GradSpace::Msd] {
        let report = gradcheck(
            &layer,
            &CoordTensor::single(&REF_SOURCE).unwrap(),
            &CoordTensor::single(&REF_TARGET).unwrap(),
            &[3],
            &GradCheckOptions {
                space,
                ..GradCheckOptions::default()
            },
        )
        .unwrap();
        assert_eq!(report.rows.len(), 9);
        assert!(
            report.passed,
            "{space:?}: max rel error {}",
            report.max_rel_error
        );
    }
}

#[test]
fn reference_case_passes_gradcheck_with_padding() {
    // three valid atoms in six slots
    let source = padded(&REF_SOURCE, 6);
    let target = padded(&REF_TARGET, 6);
    for space in [GradSpace::Rmsd, GradSpace::Msd] {
        let report = gradcheck(
            &Coords2Rmsd::default(),
            &CoordTensor::single(&source).unwrap(),
            &CoordTensor::single(&target).unwrap(),
            &[3],
            &GradCheckOptions {
                space,
                ..GradCheckOptions::default()
            },
        )
        .unwrap();
        assert_eq!(report.rows.len(), 9);
        assert!(
            report.passed,
            "{space:?}: max rel error {}",
            report.max_rel_error
        );
    }
}

#[test]
fn reference_case_error_is_relative_to_numeric_derivative() {
    let report = gradcheck(
        &Coords2Rmsd::default(),
        &CoordTensor::single(&REF_SOURCE).unwrap(),
        &CoordTensor::single(&REF_TARGET).unwrap(),
        &[3],
        &GradCheckOptions::default(),
    )
    .unwrap();
    for row in &report.rows {
        assert!(row.numeric.abs() > 1e-6, "atom {} axis {}", row.atom, row.axis);
        let expected = (row.analytic - row.numeric).abs() / row.numeric.abs();
        assert_close(row.rel_error, expected, 1e-15);
        assert!(row.rel_error <= 1e-5, "atom {} axis {}: {}", row.atom, row.axis, row.rel_error);
    }
}

#[test]
fn quaternion_solver_passes_gradcheck() {
    let layer = Coords2Rmsd::new(SolverOptions {
        method: SuperposeMethod::Quaternion,
        ..SolverOptions::default()
    });
    let report = gradcheck(
        &layer,
        &CoordTensor::single(&REF_SOURCE).unwrap(),
        &CoordTensor::single(&REF_TARGET).unwrap(),
        &[3],
        &GradCheckOptions::default(),
    )
    .unwrap();
    assert!(report.passed, "max rel error {}", report.max_rel_error);
}

#[test]
fn random_batch_matches_finite_differences() {
    let mut rng = seeded(42);
    let sources: Vec<Vec<f64>> = (0..3).map(|k| random_coords(&mut rng, 4 + k, 3.0)).collect();
    let targets: Vec<Vec<f64>> = (0..3).map(|k| random_coords(&mut rng, 4 + k, 3.0)).collect();
    let src = pad(&sources, 6).unwrap();
    let tgt = pad(&targets, 6).unwrap();
    let report = gradcheck(
        &Coords2Rmsd::default(),
        &src.as_tensor().unwrap(),
        &tgt.as_tensor().unwrap(),
        &src.counts,
        &GradCheckOptions {
            step: 1e-4,
            ..GradCheckOptions::default()
        },
    )
    .unwrap();
    assert_eq!(report.rows.len(), 3 * (4 + 5 + 6));
    // central differences carry an O(step^2) absolute error, which only
    // dominates on components that are themselves close to zero
    for row in &report.rows {
        let abs_error = (row.analytic - row.numeric).abs();
        assert!(
            row.rel_error <= 1e-5 || abs_error <= 1e-7,
            "entry {} atom {} axis {}: analytic {} numeric {}",
            row.entry,
            row.atom,
            row.axis,
            row.analytic,
            row.numeric
        );
    }
}

#[test]
fn identical_structures_have_degenerate_rmsd_gradient() {
    let mut rng = seeded(5);
    let coords = random_coords(&mut rng, 4, 2.0);
    let layer = Coords2Rmsd::default();
    let tensor = CoordTensor::single(&coords).unwrap();
    let out = layer.forward(&tensor, &tensor, &[4]).unwrap();
    assert_eq!(out.msd[0], 0.0);

    let mut state = out.into_state();
    assert!(matches!(
        layer.backward(&[1.0], &mut state),
        Err(RmsdError::DegenerateGradient(_))
    ));
    let grad = layer.backward_msd(&[1.0], &mut state).unwrap();
    assert!(grad.as_slice().iter().all(|v| v.abs() < 1e-12));
}

#[test]
fn batched_gradient_keeps_input_shape_and_zero_padding() {
    let entries_src = vec![REF_SOURCE.to_vec(), REF_SOURCE[..6].to_vec()];
    let entries_tgt = vec![REF_TARGET.to_vec(), REF_TARGET[..6].to_vec()];
    let src = pad(&entries_src, 4).unwrap();
    let tgt = pad(&entries_tgt, 4).unwrap();
    let layer = Coords2Rmsd::default();
    let mut state = layer
        .forward(&src.as_tensor().unwrap(), &tgt.as_tensor().unwrap(), &src.counts)
        .unwrap()
        .into_state();
    let grad = layer.backward(&[1.0, 2.0], &mut state).unwrap();
    assert_eq!(grad.shape(), &[2, 12]);
    assert!(grad.entry(0)[9..].iter().all(|&v| v == 0.0));
    assert!(grad.entry(1)[6..].iter().all(|&v| v == 0.0));

    let ragged = unpad_with(grad.as_slice(), &src.counts, grad.capacity()).unwrap();
    assert_eq!(ragged[0].len(), 9);
    assert_eq!(ragged[1].len(), 6);
}

#[test]
fn batched_gradient_matches_single_runs() {
    let mut rng = seeded(9);
    let sources: Vec<Vec<f64>> = (0..4).map(|_| random_coords(&mut rng, 5, 2.0)).collect();
    let targets: Vec<Vec<f64>> = (0..4).map(|_| random_coords(&mut rng, 5, 2.0)).collect();
    let src = pad(&sources, 5).unwrap();
    let tgt = pad(&targets, 5).unwrap();
    let layer = Coords2Rmsd::default();

    let mut state = layer
        .forward(&src.as_tensor().unwrap(), &tgt.as_tensor().unwrap(), &src.counts)
        .unwrap()
        .into_state();
    let joined = layer.backward(&[1.0; 4], &mut state).unwrap();

    for (index, (s, t)) in sources.iter().zip(&targets).enumerate() {
        let mut single = layer
            .forward(
                &CoordTensor::single(s).unwrap(),
                &CoordTensor::single(t).unwrap(),
                &[5],
            )
            .unwrap()
            .into_state();
        let grad = layer.backward(&[1.0], &mut single).unwrap();
        assert_eq!(grad.as_slice(), joined.entry(index));
    }
}

#[test]
fn msd_gradient_is_twice_residual_over_count_in_source_frame() {
    let layer = Coords2Rmsd::default();
    let mut state = layer
        .forward(
            &CoordTensor::single(&REF_SOURCE).unwrap(),
            &CoordTensor::single(&REF_TARGET).unwrap(),
            &[3],
        )
        .unwrap()
        .into_state();
    let entry = state.entries()[0].clone();
    let grad = layer.backward_msd(&[1.0], &mut state).unwrap();
    let r_t = entry.rotation.transpose();
    for atom in 0..3 {
        let residual = nalgebra::Vector3::new(
            entry.rotated_source[3 * atom] - entry.centered_target[3 * atom],
            entry.rotated_source[3 * atom + 1] - entry.centered_target[3 * atom + 1],
            entry.rotated_source[3 * atom + 2] - entry.centered_target[3 * atom + 2],
        );
        let expected = r_t * residual * (2.0 / 3.0);
        for axis in 0..3 {
            assert_close(grad.as_slice()[3 * atom + axis], expected[axis], 1e-12);
        }
    }
}

#[test]
fn double_backward_is_stale() {
    let layer = Coords2Rmsd::default();
    let mut state = layer
        .forward(
            &CoordTensor::single(&REF_SOURCE).unwrap(),
            &CoordTensor::single(&REF_TARGET).unwrap(),
            &[3],
        )
        .unwrap()
        .into_state();
    layer.backward_msd(&[1.0], &mut state).unwrap();
    assert!(matches!(
        layer.backward_msd(&[1.0], &mut state),
        Err(RmsdError::StaleState(_))
    ));
}
