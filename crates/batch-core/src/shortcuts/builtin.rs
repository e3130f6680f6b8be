use super::{DEFAULTS_ALIAS, SettingToken, Shortcut, ShortcutTable};
use crate::domain::BatchResult;
use crate::schema::SchemaRegistry;
use crate::serialization::parse_keyword_line;
use crate::setting::Setting;

const DEFAULT_LINES: [&str; 7] = [
    "task : singlepoint",
    "xc_functional : pbe",
    "cut_off_energy : 500 ev",
    "max_scf_cycles : 100",
    "opt_strategy : speed",
    "write_checkpoint : none",
    "kpoints_mp_spacing : 0.05 1/ang",
];

const FIXED: [(&str, &[&str]); 5] = [
    ("spin", &["spin_polarized : true"]),
    ("stress", &["calculate_stress : true"]),
    ("fast", &["opt_strategy : speed", "write_checkpoint : none"]),
    (
        "geom",
        &[
            "task : geometryoptimization",
            "geom_method : lbfgs",
            "geom_max_iter : 100",
        ],
    ),
    (
        "md",
        &[
            "task : moleculardynamics",
            "md_ensemble : nvt",
            "md_temperature : 300 k",
            "md_num_iter : 1000",
            "md_delta_t : 1 fs",
        ],
    ),
];

const VARIABLE: [(&str, &[&str], &[&str]); 3] = [
    (
        "xc",
        &["xc_functional : lda", "xc_functional : pbe", "xc_functional : pbesol"],
        &["lda", "pbe", "pbesol"],
    ),
    (
        "cutoff",
        &[
            "cut_off_energy : 300 ev",
            "cut_off_energy : 400 ev",
            "cut_off_energy : 500 ev",
            "cut_off_energy : 600 ev",
        ],
        &["300ev", "400ev", "500ev", "600ev"],
    ),
    (
        "kgrid",
        &[
            "kpoints_mp_grid : 2 2 2",
            "kpoints_mp_grid : 4 4 4",
            "kpoints_mp_grid : 6 6 6",
        ],
        &["k2", "k4", "k6"],
    ),
];

impl ShortcutTable {
    /// Aliases shipped with the tool; configuration files may add to or
    /// override them through [`ShortcutTable::merge`].
    pub fn builtin(registry: &SchemaRegistry) -> BatchResult<Self> {
        let mut table = Self::new();
        let parse = |line: &str| parse_keyword_line(line, registry);

        let defaults = DEFAULT_LINES
            .iter()
            .map(|line| parse(*line))
            .collect::<BatchResult<Vec<Setting>>>()?;
        table.insert(DEFAULTS_ALIAS, Shortcut::Sequence(defaults));

        for (alias, lines) in FIXED {
            let mut settings = lines
                .iter()
                .map(|line| parse(*line))
                .collect::<BatchResult<Vec<Setting>>>()?;
            let shortcut = if settings.len() == 1 {
                Shortcut::Single(settings.remove(0))
            } else {
                Shortcut::Sequence(settings)
            };
            table.insert(alias, shortcut);
        }

        for (alias, lines, names) in VARIABLE {
            let alternatives = lines
                .iter()
                .map(|line| parse(*line).map(|setting| vec![SettingToken::Setting(setting)]))
                .collect::<BatchResult<Vec<_>>>()?;
            table.insert(alias, Shortcut::Alternatives(alternatives));
            table.insert_names(alias, names.iter().copied());
        }

        table.insert(
            "spin_states",
            Shortcut::Alternatives(vec![
                vec![SettingToken::Setting(parse("spin_polarized : false")?)],
                vec![SettingToken::Alias("spin".to_owned())],
            ]),
        );
        table.insert_names("spin_states", ["nospin", "spin"]);

        table.insert(
            "tasks",
            Shortcut::Alternatives(vec![
                vec![SettingToken::Setting(parse("task : singlepoint")?)],
                vec![SettingToken::Alias("geom".to_owned())],
            ]),
        );
        table.insert_names("tasks", ["sp", "geom"]);

        Ok(table)
    }
}
