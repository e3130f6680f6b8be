//! Cross-product generation of calculations.
//!
//! Each variable dimension contributes one alternative setting group per
//! calculation; each name dimension contributes the matching directory
//! fragment. Both products iterate in dimension order with the last
//! dimension varying fastest, so element `i` of one lines up with element
//! `i` of the other.

mod plan;

pub use plan::{GenerationPlan, NameSource, VariableSource};

use crate::calculation::Calculation;
use crate::domain::{BatchError, BatchResult};
use crate::setting::Setting;
use crate::shortcuts::{DEFAULTS_ALIAS, SettingToken, ShortcutTable};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum DimensionSpec {
    /// A variable shortcut alias.
    Alias(String),
    /// Explicit alternatives, each a group of settings or fixed aliases.
    Variants(Vec<Vec<SettingToken>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameDimension {
    Alias(String),
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationRequest {
    pub variables: Vec<DimensionSpec>,
    /// Directory fragments per dimension; zero-padded indices when absent.
    pub names: Option<Vec<NameDimension>>,
    pub globals: Vec<SettingToken>,
    pub fill_defaults: bool,
    /// Prefix for every generated directory.
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub calculations: Vec<Calculation>,
    /// Global settings after default filling, shared by every calculation.
    pub global_settings: Vec<Setting>,
}

pub struct CalculationGenerator<'a> {
    shortcuts: &'a ShortcutTable,
    index_width: usize,
}

impl<'a> CalculationGenerator<'a> {
    pub fn new(shortcuts: &'a ShortcutTable, index_width: usize) -> Self {
        Self {
            shortcuts,
            index_width,
        }
    }

    pub fn generate(&self, request: &GenerationRequest) -> BatchResult<Generation> {
        let dimensions = request
            .variables
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                self.resolve_dimension(spec)
                    .map_err(|error| error.context(format!("dimension {}", index + 1)))
            })
            .collect::<BatchResult<Vec<_>>>()?;

        for (index, dimension) in dimensions.iter().enumerate() {
            if dimension.is_empty() {
                return Err(BatchError::shape(
                    "SHAPE.EMPTY_DIMENSION",
                    format!("dimension {} has no alternatives", index + 1),
                ));
            }
        }

        let fragments = match &request.names {
            Some(names) => self.resolve_fragments(names, &dimensions)?,
            None => dimensions
                .iter()
                .map(|dimension| {
                    (1..=dimension.len())
                        .map(|index| format!("{:0width$}", index, width = self.index_width))
                        .collect()
                })
                .collect(),
        };

        let mut global_settings = self.shortcuts.resolve_fixed(&request.globals)?;
        if request.fill_defaults {
            fill_defaults(self.shortcuts, &dimensions, &mut global_settings)?;
        }

        let lengths: Vec<usize> = dimensions.iter().map(Vec::len).collect();
        let root = request.root.clone().unwrap_or_default();
        let mut calculations = Vec::new();

        for combination in cartesian_indices(&lengths) {
            let mut directory = root.clone();
            let mut settings = global_settings.clone();
            for (dimension, &choice) in combination.iter().enumerate() {
                directory.push(&fragments[dimension][choice]);
                settings.extend(dimensions[dimension][choice].iter().cloned());
            }
            if directory.as_os_str().is_empty() {
                return Err(BatchError::shape(
                    "SHAPE.NO_DIRECTORY",
                    "a request without variable dimensions needs a root directory",
                ));
            }

            let calculation = Calculation::new(Some(directory.clone()), None, settings)
                .map_err(|error| error.context(directory.display()))?;
            calculations.push(calculation);
        }

        debug!(
            dimensions = dimensions.len(),
            calculations = calculations.len(),
            globals = global_settings.len(),
            "generated calculations"
        );

        Ok(Generation {
            calculations,
            global_settings,
        })
    }

    fn resolve_dimension(&self, spec: &DimensionSpec) -> BatchResult<Vec<Vec<Setting>>> {
        match spec {
            DimensionSpec::Alias(alias) => self.shortcuts.resolve_variable(alias),
            DimensionSpec::Variants(variants) => self.shortcuts.resolve_groups(variants),
        }
    }

    fn resolve_fragments(
        &self,
        names: &[NameDimension],
        dimensions: &[Vec<Vec<Setting>>],
    ) -> BatchResult<Vec<Vec<String>>> {
        if names.len() != dimensions.len() {
            return Err(BatchError::shape(
                "SHAPE.DIMENSION_COUNT",
                format!(
                    "{} name dimensions given for {} variable dimensions",
                    names.len(),
                    dimensions.len()
                ),
            ));
        }

        let mut fragments = Vec::with_capacity(names.len());
        for (index, (name, dimension)) in names.iter().zip(dimensions).enumerate() {
            let resolved = match name {
                NameDimension::Alias(alias) => self.shortcuts.resolve_names(alias)?,
                NameDimension::Names(names) => names.clone(),
            };
            if resolved.len() != dimension.len() {
                return Err(BatchError::shape(
                    "SHAPE.DIMENSION_LENGTH",
                    format!(
                        "dimension {} has {} alternatives but {} directory names",
                        index + 1,
                        dimension.len(),
                        resolved.len()
                    ),
                ));
            }
            if let Some(bad) = resolved.iter().find(|fragment| !is_path_segment(fragment)) {
                return Err(BatchError::validation(
                    "VALIDATION.DIRECTORY_FRAGMENT",
                    format!(
                        "dimension {}: '{}' is not a single directory name",
                        index + 1,
                        bad
                    ),
                ));
            }
            fragments.push(resolved);
        }
        Ok(fragments)
    }
}

/// Appends defaults whose key no combination and no global sets.
fn fill_defaults(
    shortcuts: &ShortcutTable,
    dimensions: &[Vec<Vec<Setting>>],
    global_settings: &mut Vec<Setting>,
) -> BatchResult<()> {
    let specified: BTreeSet<String> = dimensions
        .iter()
        .flatten()
        .flatten()
        .chain(global_settings.iter())
        .map(|setting| setting.key().to_owned())
        .collect();

    let defaults = shortcuts.resolve_fixed(&[SettingToken::Alias(DEFAULTS_ALIAS.to_owned())])?;
    for setting in defaults {
        if specified.contains(setting.key()) {
            continue;
        }
        debug!(key = setting.key(), "filling default");
        global_settings.push(setting);
    }
    Ok(())
}

/// Index tuples of the cross product, last position varying fastest.
fn cartesian_indices(lengths: &[usize]) -> Vec<Vec<usize>> {
    let total: usize = lengths.iter().product();
    let mut combinations = Vec::with_capacity(total);
    let mut current = vec![0; lengths.len()];

    for _ in 0..total {
        combinations.push(current.clone());
        for position in (0..lengths.len()).rev() {
            current[position] += 1;
            if current[position] < lengths[position] {
                break;
            }
            current[position] = 0;
        }
    }
    combinations
}

fn is_path_segment(fragment: &str) -> bool {
    !fragment.is_empty()
        && fragment != "."
        && fragment != ".."
        && !fragment.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::{
        CalculationGenerator, DimensionSpec, GenerationRequest, NameDimension, cartesian_indices,
    };
    use crate::domain::BatchErrorCategory;
    use crate::schema::SchemaRegistry;
    use crate::serialization::parse_keyword_line;
    use crate::setting::Setting;
    use crate::shortcuts::{SettingToken, ShortcutTable};
    use std::path::PathBuf;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().expect("schema")
    }

    fn token(registry: &SchemaRegistry, line: &str) -> SettingToken {
        SettingToken::Setting(parse_keyword_line(line, registry).expect("valid line"))
    }

    fn variants(registry: &SchemaRegistry, lines: &[&str]) -> DimensionSpec {
        DimensionSpec::Variants(
            lines
                .iter()
                .map(|line| vec![token(registry, line)])
                .collect(),
        )
    }

    #[test]
    fn cartesian_indices_vary_last_dimension_fastest() {
        assert_eq!(
            cartesian_indices(&[2, 3]),
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
        assert_eq!(cartesian_indices(&[]), vec![Vec::<usize>::new()]);
        assert!(cartesian_indices(&[2, 0]).is_empty());
    }

    #[test]
    fn two_by_two_generation_uses_padded_directories() {
        let registry = registry();
        let shortcuts = ShortcutTable::builtin(&registry).expect("shortcuts");
        let generator = CalculationGenerator::new(&shortcuts, 3);
        let request = GenerationRequest {
            variables: vec![
                variants(&registry, &["cut_off_energy : 300 ev", "cut_off_energy : 400 ev"]),
                variants(&registry, &["kpoints_mp_grid : 2 2 2", "kpoints_mp_grid : 4 4 4"]),
            ],
            globals: vec![token(&registry, "task : singlepoint")],
            ..GenerationRequest::default()
        };

        let generation = generator.generate(&request).expect("generation");
        let directories: Vec<_> = generation
            .calculations
            .iter()
            .map(|calculation| calculation.directory().expect("directory").to_path_buf())
            .collect();
        assert_eq!(
            directories,
            vec![
                PathBuf::from("001/001"),
                PathBuf::from("001/002"),
                PathBuf::from("002/001"),
                PathBuf::from("002/002"),
            ]
        );

        let last = &generation.calculations[3];
        let rendered: Vec<_> = last.settings().iter().map(Setting::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "kpoints_mp_grid: 4 4 4",
                "task: singlepoint",
                "cut_off_energy: 400.0000 ev"
            ]
        );
    }

    #[test]
    fn generation_is_repeatable() {
        let registry = registry();
        let shortcuts = ShortcutTable::builtin(&registry).expect("shortcuts");
        let generator = CalculationGenerator::new(&shortcuts, 3);
        let request = GenerationRequest {
            variables: vec![
                DimensionSpec::Alias("xc".into()),
                DimensionSpec::Alias("spin_states".into()),
            ],
            names: Some(vec![
                NameDimension::Alias("xc".into()),
                NameDimension::Alias("spin_states".into()),
            ]),
            fill_defaults: true,
            root: Some(PathBuf::from("scan")),
            ..GenerationRequest::default()
        };

        let first = generator.generate(&request).expect("first");
        let second = generator.generate(&request).expect("second");
        assert_eq!(first, second);
        assert_eq!(first.calculations.len(), 6);
        assert_eq!(
            first.calculations[1].directory(),
            Some(PathBuf::from("scan/lda/spin").as_path())
        );
    }

    #[test]
    fn defaults_skip_keys_set_by_any_combination() {
        let registry = registry();
        let shortcuts = ShortcutTable::builtin(&registry).expect("shortcuts");
        let generator = CalculationGenerator::new(&shortcuts, 3);
        let request = GenerationRequest {
            variables: vec![DimensionSpec::Variants(vec![
                vec![token(&registry, "iprint : 1")],
                vec![token(&registry, "cut_off_energy : 800 ev")],
            ])],
            globals: vec![token(&registry, "xc_functional : lda")],
            fill_defaults: true,
            ..GenerationRequest::default()
        };

        let generation = generator.generate(&request).expect("generation");
        let global_keys: Vec<_> = generation
            .global_settings
            .iter()
            .map(Setting::key)
            .collect();
        assert!(!global_keys.contains(&"cut_off_energy"));
        assert_eq!(
            global_keys.iter().filter(|key| **key == "xc_functional").count(),
            1
        );
        assert!(global_keys.contains(&"task"));
        assert!(global_keys.contains(&"kpoints_mp_spacing"));

        let first = &generation.calculations[0];
        assert!(first.setting("cut_off_energy").is_none());
        assert_eq!(
            first.setting("xc_functional").expect("global").value_string(),
            "lda"
        );
    }

    #[test]
    fn fixed_only_requests_need_a_root() {
        let registry = registry();
        let shortcuts = ShortcutTable::builtin(&registry).expect("shortcuts");
        let generator = CalculationGenerator::new(&shortcuts, 3);
        let mut request = GenerationRequest {
            globals: vec![token(&registry, "task : singlepoint")],
            ..GenerationRequest::default()
        };

        let error = generator.generate(&request).expect_err("no directory");
        assert_eq!(error.category(), BatchErrorCategory::Shape);
        assert_eq!(error.placeholder(), "SHAPE.NO_DIRECTORY");

        request.root = Some(PathBuf::from("single"));
        let generation = generator.generate(&request).expect("rooted request");
        assert_eq!(generation.calculations.len(), 1);
        assert_eq!(
            generation.calculations[0].directory(),
            Some(PathBuf::from("single").as_path())
        );
    }

    #[test]
    fn shape_mismatches_fail_without_truncating() {
        let registry = registry();
        let shortcuts = ShortcutTable::builtin(&registry).expect("shortcuts");
        let generator = CalculationGenerator::new(&shortcuts, 3);
        let base = GenerationRequest {
            variables: vec![
                variants(&registry, &["iprint : 0", "iprint : 1"]),
                DimensionSpec::Alias("xc".into()),
            ],
            ..GenerationRequest::default()
        };

        let count = GenerationRequest {
            names: Some(vec![NameDimension::Names(vec!["a".into(), "b".into()])]),
            ..base.clone()
        };
        let error = generator.generate(&count).expect_err("count mismatch");
        assert_eq!(error.category(), BatchErrorCategory::Shape);
        assert_eq!(error.placeholder(), "SHAPE.DIMENSION_COUNT");

        let length = GenerationRequest {
            names: Some(vec![
                NameDimension::Names(vec!["a".into(), "b".into()]),
                NameDimension::Names(vec!["lda".into(), "pbe".into()]),
            ]),
            ..base
        };
        let error = generator.generate(&length).expect_err("length mismatch");
        assert_eq!(error.placeholder(), "SHAPE.DIMENSION_LENGTH");
    }

    #[test]
    fn conflicting_keys_in_one_combination_are_rejected() {
        let registry = registry();
        let shortcuts = ShortcutTable::builtin(&registry).expect("shortcuts");
        let generator = CalculationGenerator::new(&shortcuts, 3);
        let request = GenerationRequest {
            variables: vec![variants(&registry, &["task : singlepoint", "task : phonon"])],
            globals: vec![token(&registry, "task : singlepoint")],
            ..GenerationRequest::default()
        };
        let error = generator.generate(&request).expect_err("duplicate task");
        assert_eq!(error.category(), BatchErrorCategory::DuplicateKey);
        assert!(error.message().starts_with("001"), "{}", error.message());
    }

    #[test]
    fn unknown_aliases_and_bad_fragments_fail() {
        let registry = registry();
        let shortcuts = ShortcutTable::builtin(&registry).expect("shortcuts");
        let generator = CalculationGenerator::new(&shortcuts, 3);

        let unknown = GenerationRequest {
            variables: vec![DimensionSpec::Alias("nope".into())],
            ..GenerationRequest::default()
        };
        assert_eq!(
            generator
                .generate(&unknown)
                .expect_err("unknown alias")
                .category(),
            BatchErrorCategory::Schema
        );

        let fragment = GenerationRequest {
            variables: vec![variants(&registry, &["iprint : 0"])],
            names: Some(vec![NameDimension::Names(vec!["a/b".into()])]),
            ..GenerationRequest::default()
        };
        assert_eq!(
            generator
                .generate(&fragment)
                .expect_err("nested fragment")
                .placeholder(),
            "VALIDATION.DIRECTORY_FRAGMENT"
        );
    }
}
