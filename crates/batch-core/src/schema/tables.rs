use super::{KeyDefinition, UnitFamily, ValueKind};
use crate::domain::Category;

const fn cell(key: &'static str, kind: ValueKind, priority: f64) -> KeyDefinition {
    KeyDefinition::new(key, Category::Cell, kind, priority)
}

const fn param(key: &'static str, kind: ValueKind, priority: f64) -> KeyDefinition {
    KeyDefinition::new(key, Category::Param, kind, priority)
}

const POSITIVE: Option<f64> = Some(0.0);

pub const CELL_DEFINITIONS: &[KeyDefinition] = &[
    cell("lattice_cart", ValueKind::Block, 1.0),
    cell("lattice_abc", ValueKind::Block, 1.1),
    cell("positions_frac", ValueKind::Block, 2.0),
    cell("positions_abs", ValueKind::Block, 2.1),
    cell("kpoints_mp_grid", ValueKind::IntVector, 3.0).range(Some(1.0), None),
    cell("kpoints_mp_offset", ValueKind::FloatVector, 3.1).range(Some(-1.0), Some(1.0)),
    cell("kpoints_mp_spacing", ValueKind::Float, 3.2)
        .range(POSITIVE, None)
        .unit(UnitFamily::InverseLength),
    cell("kpoints_list", ValueKind::Block, 3.3),
    cell("symmetry_generate", ValueKind::Boolean, 4.0),
    cell("symmetry_tol", ValueKind::Float, 4.1)
        .range(POSITIVE, None)
        .unit(UnitFamily::Length),
    cell("snap_to_symmetry", ValueKind::Boolean, 4.2),
    cell("fix_all_cell", ValueKind::Boolean, 5.0),
    cell("fix_all_ions", ValueKind::Boolean, 5.1),
    cell("fix_com", ValueKind::Boolean, 5.2),
    cell("cell_constraints", ValueKind::Block, 5.3),
    cell("ionic_constraints", ValueKind::Block, 5.4),
    cell("external_pressure", ValueKind::Block, 5.5),
    cell("species_pot", ValueKind::Block, 6.0),
    cell("species_mass", ValueKind::Block, 6.1),
    cell("hubbard_u", ValueKind::Block, 6.2),
];

pub const PARAM_DEFINITIONS: &[KeyDefinition] = &[
    param("task", ValueKind::Choice, 1.0).choices(&[
        "singlepoint",
        "geometryoptimization",
        "moleculardynamics",
        "bandstructure",
        "phonon",
        "elasticconstants",
        "spectral",
        "magres",
    ]),
    param("xc_functional", ValueKind::Choice, 2.0).choices(&[
        "lda", "pw91", "pbe", "pbesol", "rpbe", "wc", "blyp", "hf", "shf", "pbe0", "hse06",
    ]),
    param("spin_polarized", ValueKind::Boolean, 2.1),
    param("spin", ValueKind::Float, 2.2),
    param("charge", ValueKind::Float, 2.3),
    param("cut_off_energy", ValueKind::Float, 3.0)
        .range(POSITIVE, None)
        .unit(UnitFamily::Energy),
    param("basis_precision", ValueKind::Choice, 3.1)
        .choices(&["coarse", "medium", "fine", "precise", "extreme"]),
    param("finite_basis_corr", ValueKind::Integer, 3.2).range(Some(0.0), Some(2.0)),
    param("grid_scale", ValueKind::Float, 3.3).range(Some(1.0), None),
    param("elec_energy_tol", ValueKind::Float, 4.0)
        .range(POSITIVE, None)
        .unit(UnitFamily::Energy),
    param("max_scf_cycles", ValueKind::Integer, 4.1).range(Some(1.0), None),
    param("metals_method", ValueKind::Choice, 4.2).choices(&["dm", "edft", "none"]),
    param("mixing_scheme", ValueKind::Choice, 4.3)
        .choices(&["kerker", "linear", "broyden", "pulay"]),
    param("smearing_width", ValueKind::Float, 4.4)
        .range(POSITIVE, None)
        .unit(UnitFamily::Energy),
    param("nextra_bands", ValueKind::Integer, 4.5).range(Some(0.0), None),
    param("fix_occupancy", ValueKind::Boolean, 4.6),
    param("geom_method", ValueKind::Choice, 5.0)
        .choices(&["bfgs", "lbfgs", "delocalised", "tpsd"]),
    param("geom_max_iter", ValueKind::Integer, 5.1).range(Some(0.0), None),
    param("geom_energy_tol", ValueKind::Float, 5.2)
        .range(POSITIVE, None)
        .unit(UnitFamily::Energy),
    param("geom_force_tol", ValueKind::Float, 5.3)
        .range(POSITIVE, None)
        .unit(UnitFamily::Force),
    param("geom_stress_tol", ValueKind::Float, 5.4)
        .range(POSITIVE, None)
        .unit(UnitFamily::Pressure),
    param("md_ensemble", ValueKind::Choice, 6.0).choices(&["nve", "nvt", "nph", "npt"]),
    param("md_temperature", ValueKind::Float, 6.1)
        .range(POSITIVE, None)
        .unit(UnitFamily::Temperature),
    param("md_num_iter", ValueKind::Integer, 6.2).range(Some(0.0), None),
    param("md_delta_t", ValueKind::Float, 6.3)
        .range(POSITIVE, None)
        .unit(UnitFamily::Time),
    param("opt_strategy", ValueKind::Choice, 7.0).choices(&["default", "speed", "memory"]),
    param("write_checkpoint", ValueKind::Choice, 7.1)
        .choices(&["none", "minimal", "both", "all", "full"]),
    param("num_dump_cycles", ValueKind::Integer, 7.2).range(Some(0.0), None),
    param("iprint", ValueKind::Integer, 7.3).range(Some(0.0), Some(3.0)),
    param("write_formatted_density", ValueKind::Boolean, 7.4),
    param("calculate_stress", ValueKind::Boolean, 8.0),
    param("popn_calculate", ValueKind::Boolean, 8.1),
    param("devel_code", ValueKind::Block, 9.0),
];
