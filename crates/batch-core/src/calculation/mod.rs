//! A single job: where it lives, what it is called and which settings it
//! runs with.

mod filesystem;
mod naming;
mod status;

pub use filesystem::{JobFilesystem, LocalFilesystem, MemoryFilesystem};
pub use naming::{NameDeriver, POSITION_BLOCK_KEYS, SpeciesFormulaNamer};

use crate::config::FileLayout;
use crate::domain::{BatchError, BatchResult, CalculationStatus, Category, CreateMode};
use crate::schema::SchemaRegistry;
use crate::serialization::{parse_settings, render_input_file};
use crate::setting::Setting;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Everything a calculation needs to look at its directory: the filesystem,
/// the naming rule and the file layout.
pub struct JobEnvironment {
    filesystem: Box<dyn JobFilesystem>,
    namer: Box<dyn NameDeriver>,
    layout: FileLayout,
}

impl JobEnvironment {
    pub fn new(
        filesystem: Box<dyn JobFilesystem>,
        namer: Box<dyn NameDeriver>,
        layout: FileLayout,
    ) -> Self {
        Self {
            filesystem,
            namer,
            layout,
        }
    }

    /// Real disk, formula names.
    pub fn local(layout: FileLayout) -> Self {
        Self::new(Box::new(LocalFilesystem), Box::new(SpeciesFormulaNamer), layout)
    }

    pub fn filesystem(&self) -> &dyn JobFilesystem {
        self.filesystem.as_ref()
    }

    pub fn namer(&self) -> &dyn NameDeriver {
        self.namer.as_ref()
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }
}

/// Extracts typed results from the engine output of a finished job.
pub trait OutputAnalyzer {
    type Record;

    fn analyze(&self, lines: &[String]) -> BatchResult<Self::Record>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    directory: Option<PathBuf>,
    name: Option<String>,
    settings: Vec<Setting>,
    #[serde(skip)]
    eta_seconds: Option<f64>,
}

impl Calculation {
    pub fn new(
        directory: Option<PathBuf>,
        name: Option<String>,
        mut settings: Vec<Setting>,
    ) -> BatchResult<Self> {
        ensure_unique_keys(&settings)?;
        settings.sort_by(Setting::file_order);
        Ok(Self {
            directory,
            name,
            settings,
            eta_seconds: None,
        })
    }

    /// Reads `<name>.cell` and `<name>.param` from an existing job
    /// directory. Without a name, the directory must hold exactly one cell
    /// file whose stem becomes the name.
    pub fn from_directory(
        env: &JobEnvironment,
        registry: &SchemaRegistry,
        directory: &Path,
        name: Option<&str>,
    ) -> BatchResult<Self> {
        let fs = env.filesystem();
        let layout = env.layout();
        if !fs.is_dir(directory) {
            return Err(BatchError::filesystem(
                "IO.DIRECTORY_MISSING",
                format!("job directory '{}' does not exist", directory.display()),
            ));
        }

        let stem = match name {
            Some(name) => name.to_owned(),
            None => discover_stem(fs, directory, &layout.cell_extension)?,
        };

        let mut settings = Vec::new();
        for extension in [&layout.cell_extension, &layout.param_extension] {
            let path = directory.join(layout.file_name(&stem, extension));
            if !fs.exists(&path) {
                continue;
            }
            let source = fs.read_to_string(&path).map_err(|source| {
                BatchError::filesystem(
                    "IO.INPUT_READ",
                    format!("failed to read '{}': {}", path.display(), source),
                )
            })?;
            let parsed = parse_settings(&source, registry)
                .map_err(|error| error.context(path.display()))?;
            settings.extend(parsed);
        }

        if settings.is_empty() {
            return Err(BatchError::filesystem(
                "IO.INPUT_MISSING",
                format!(
                    "no '{}' input files found in '{}'",
                    stem,
                    directory.display()
                ),
            ));
        }

        Self::new(Some(directory.to_path_buf()), Some(stem), settings)
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&Setting> {
        let key = key.trim().to_ascii_lowercase();
        self.settings.iter().find(|setting| setting.key() == key)
    }

    /// Seconds until completion from the last ETA estimate. Not persisted.
    pub fn eta_seconds(&self) -> Option<f64> {
        self.eta_seconds
    }

    pub(crate) fn set_eta_seconds(&mut self, eta: Option<f64>) {
        self.eta_seconds = eta;
    }

    /// The explicit name, else one derived from the positions block.
    pub fn name(&self, namer: &dyn NameDeriver) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        POSITION_BLOCK_KEYS
            .iter()
            .filter_map(|key| self.setting(key))
            .filter_map(Setting::block_lines)
            .find_map(|lines| namer.derive_name(lines))
    }

    pub fn require_name(&self, namer: &dyn NameDeriver) -> BatchResult<String> {
        self.name(namer).ok_or_else(|| {
            BatchError::state(
                "STATE.NAME_UNDETERMINED",
                format!(
                    "calculation in '{}' has no explicit name and no positions block to derive one from",
                    self.directory_label()
                ),
            )
        })
    }

    /// Replaces settings with the same key and adds the rest.
    pub fn update_settings(&mut self, settings: Vec<Setting>) -> BatchResult<()> {
        ensure_unique_keys(&settings)?;
        let incoming: BTreeSet<String> = settings
            .iter()
            .map(|setting| setting.key().to_owned())
            .collect();
        self.settings
            .retain(|setting| !incoming.contains(setting.key()));
        self.settings.extend(settings);
        self.settings.sort_by(Setting::file_order);
        ensure_unique_keys(&self.settings)
    }

    /// Drops settings by key; returns how many were removed.
    pub fn remove_settings(&mut self, keys: &[&str]) -> usize {
        let keys: BTreeSet<String> = keys.iter().map(|key| key.trim().to_ascii_lowercase()).collect();
        let before = self.settings.len();
        self.settings.retain(|setting| !keys.contains(setting.key()));
        before - self.settings.len()
    }

    /// Writes the cell and param files. Returns `false` when an existing
    /// directory was skipped in passive mode.
    pub fn create(&self, env: &JobEnvironment, mode: CreateMode) -> BatchResult<bool> {
        let directory = self.require_directory()?;
        let name = self.require_name(env.namer())?;
        let fs = env.filesystem();
        let layout = env.layout();

        if fs.exists(directory) && !mode.force {
            if mode.passive {
                debug!(directory = %directory.display(), "skipping existing job directory");
                return Ok(false);
            }
            return Err(BatchError::filesystem(
                "IO.DIRECTORY_EXISTS",
                format!(
                    "job directory '{}' already exists; use force to overwrite",
                    directory.display()
                ),
            ));
        }

        fs.create_dir_all(directory).map_err(|source| {
            BatchError::filesystem(
                "IO.DIRECTORY_CREATE",
                format!("failed to create '{}': {}", directory.display(), source),
            )
        })?;

        for category in Category::ALL {
            if !self.settings.iter().any(|setting| setting.category() == category) {
                continue;
            }
            let extension = match category {
                Category::Cell => &layout.cell_extension,
                Category::Param => &layout.param_extension,
            };
            let path = directory.join(layout.file_name(&name, extension));
            let content = render_input_file(&self.settings, category);
            fs.write(&path, &content).map_err(|source| {
                BatchError::filesystem(
                    "IO.INPUT_WRITE",
                    format!("failed to write '{}': {}", path.display(), source),
                )
            })?;
        }

        info!(directory = %directory.display(), name = %name, "created job directory");
        Ok(true)
    }

    /// Queues the job: appends `<directory> <name>` to the queue file and
    /// leaves the submission marker in the job directory.
    pub fn submit(&self, env: &JobEnvironment, queue_file: &Path) -> BatchResult<()> {
        let status = self.status(env)?;
        if status != CalculationStatus::Created {
            return Err(BatchError::state(
                "STATE.NOT_SUBMITTABLE",
                format!(
                    "calculation in '{}' is {} and cannot be submitted",
                    self.directory_label(),
                    status
                ),
            ));
        }

        let directory = self.require_directory()?;
        let name = self.require_name(env.namer())?;
        let fs = env.filesystem();
        let marker = self.artifact_path(env, &env.layout().submission_extension)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        fs.append(queue_file, &format!("{} {}\n", directory.display(), name))
            .map_err(|source| {
                BatchError::filesystem(
                    "IO.QUEUE_APPEND",
                    format!("failed to append to '{}': {}", queue_file.display(), source),
                )
            })?;
        fs.write(&marker, &format!("{}\n", stamp)).map_err(|source| {
            BatchError::filesystem(
                "IO.MARKER_WRITE",
                format!("failed to write '{}': {}", marker.display(), source),
            )
        })?;

        info!(directory = %directory.display(), name = %name, "submitted job");
        Ok(())
    }

    /// Feeds the output of a completed job to `analyzer`.
    pub fn analyze<A: OutputAnalyzer>(
        &self,
        env: &JobEnvironment,
        analyzer: &A,
    ) -> BatchResult<A::Record> {
        let status = self.status(env)?;
        if status != CalculationStatus::Completed {
            return Err(BatchError::state(
                "STATE.NOT_COMPLETED",
                format!(
                    "calculation in '{}' is {}; only completed jobs can be analyzed",
                    self.directory_label(),
                    status
                ),
            ));
        }

        let lines = self.output_lines(env)?.unwrap_or_default();
        analyzer.analyze(&lines)
    }

    pub(crate) fn require_directory(&self) -> BatchResult<&Path> {
        self.directory().ok_or_else(|| {
            BatchError::state(
                "STATE.NO_DIRECTORY",
                "calculation has no directory assigned",
            )
        })
    }

    /// `<directory>/<name>.<extension>`.
    pub fn artifact_path(&self, env: &JobEnvironment, extension: &str) -> BatchResult<PathBuf> {
        let directory = self.require_directory()?;
        let name = self.require_name(env.namer())?;
        Ok(directory.join(env.layout().file_name(&name, extension)))
    }

    pub(crate) fn directory_label(&self) -> String {
        self.directory
            .as_ref()
            .map(|directory| directory.display().to_string())
            .unwrap_or_else(|| "<no directory>".to_owned())
    }
}

fn ensure_unique_keys(settings: &[Setting]) -> BatchResult<()> {
    let mut seen = BTreeSet::new();
    for setting in settings {
        if !seen.insert(setting.key()) {
            return Err(BatchError::duplicate_key(
                "DUPLICATE.SETTING_KEY",
                format!("setting '{}' is specified more than once", setting.key()),
            ));
        }
    }
    Ok(())
}

fn discover_stem(
    fs: &dyn JobFilesystem,
    directory: &Path,
    cell_extension: &str,
) -> BatchResult<String> {
    let suffix = format!(".{}", cell_extension);
    let names = fs.file_names(directory).map_err(|source| {
        BatchError::filesystem(
            "IO.DIRECTORY_READ",
            format!("failed to list '{}': {}", directory.display(), source),
        )
    })?;
    let stems: Vec<&str> = names
        .iter()
        .filter_map(|name| name.strip_suffix(suffix.as_str()))
        .collect();

    match stems.as_slice() {
        [stem] => Ok((*stem).to_owned()),
        [] => Err(BatchError::filesystem(
            "IO.INPUT_MISSING",
            format!("no '*{}' file found in '{}'", suffix, directory.display()),
        )),
        _ => Err(BatchError::state(
            "STATE.AMBIGUOUS_NAME",
            format!(
                "'{}' holds several '*{}' files ({}); pass a name explicitly",
                directory.display(),
                suffix,
                stems.join(", ")
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{Calculation, JobEnvironment, MemoryFilesystem, OutputAnalyzer, SpeciesFormulaNamer};
    use crate::config::FileLayout;
    use crate::domain::{BatchErrorCategory, BatchResult, CreateMode};
    use crate::schema::SchemaRegistry;
    use crate::serialization::parse_keyword_line;
    use crate::setting::Setting;
    use std::path::{Path, PathBuf};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().expect("builtin schema")
    }

    fn line(registry: &SchemaRegistry, text: &str) -> Setting {
        parse_keyword_line(text, registry).expect("valid line")
    }

    fn positions(registry: &SchemaRegistry) -> Setting {
        Setting::block(registry, "positions_frac", ["Si 0 0 0", "Si 0.25 0.25 0.25"])
            .expect("positions")
    }

    fn memory_env() -> JobEnvironment {
        JobEnvironment::new(
            Box::new(MemoryFilesystem::new()),
            Box::new(SpeciesFormulaNamer),
            FileLayout::default(),
        )
    }

    #[test]
    fn construction_rejects_duplicate_keys_and_sorts() {
        let registry = registry();
        let duplicate = Calculation::new(
            None,
            None,
            vec![
                line(&registry, "task : singlepoint"),
                line(&registry, "task : phonon"),
            ],
        )
        .expect_err("duplicate task");
        assert_eq!(duplicate.category(), BatchErrorCategory::DuplicateKey);

        let calculation = Calculation::new(
            None,
            None,
            vec![
                line(&registry, "cut_off_energy : 400 ev"),
                line(&registry, "task : singlepoint"),
                positions(&registry),
            ],
        )
        .expect("valid calculation");
        let keys: Vec<_> = calculation.settings().iter().map(Setting::key).collect();
        assert_eq!(keys, vec!["positions_frac", "task", "cut_off_energy"]);
    }

    #[test]
    fn mutations_keep_keys_unique_and_sorted() {
        let registry = registry();
        let mut calculation = Calculation::new(
            None,
            None,
            vec![
                line(&registry, "task : singlepoint"),
                line(&registry, "cut_off_energy : 400 ev"),
            ],
        )
        .expect("calculation");

        calculation
            .update_settings(vec![
                line(&registry, "cut_off_energy : 600 ev"),
                line(&registry, "kpoints_mp_grid : 2 2 2"),
            ])
            .expect("update");
        assert_eq!(calculation.settings().len(), 3);
        assert_eq!(
            calculation
                .setting("cut_off_energy")
                .expect("cutoff kept")
                .value_string(),
            "600.0000"
        );
        assert_eq!(calculation.settings()[0].key(), "kpoints_mp_grid");

        let error = calculation
            .update_settings(vec![
                line(&registry, "iprint : 1"),
                line(&registry, "iprint : 2"),
            ])
            .expect_err("duplicate in update");
        assert_eq!(error.category(), BatchErrorCategory::DuplicateKey);
        assert_eq!(calculation.settings().len(), 3);

        assert_eq!(calculation.remove_settings(&["TASK", "missing"]), 1);
        let keys: Vec<_> = calculation.settings().iter().map(Setting::key).collect();
        assert_eq!(keys, vec!["kpoints_mp_grid", "cut_off_energy"]);
    }

    #[test]
    fn name_prefers_explicit_then_positions_block() {
        let registry = registry();
        let derived = Calculation::new(None, None, vec![positions(&registry)]).expect("calc");
        assert_eq!(derived.name(&SpeciesFormulaNamer).as_deref(), Some("Si2"));

        let explicit = Calculation::new(None, Some("quartz".into()), vec![positions(&registry)])
            .expect("calc");
        assert_eq!(explicit.name(&SpeciesFormulaNamer).as_deref(), Some("quartz"));

        let anonymous = Calculation::new(None, None, vec![line(&registry, "task : singlepoint")])
            .expect("calc");
        assert_eq!(anonymous.name(&SpeciesFormulaNamer), None);
        let error = anonymous
            .require_name(&SpeciesFormulaNamer)
            .expect_err("strict name");
        assert_eq!(error.placeholder(), "STATE.NAME_UNDETERMINED");
    }

    #[test]
    fn create_refuses_existing_directories_unless_forced_or_passive() {
        let registry = registry();
        let env = memory_env();
        let calculation = Calculation::new(
            Some(PathBuf::from("runs/001")),
            None,
            vec![positions(&registry), line(&registry, "task : singlepoint")],
        )
        .expect("calc");

        assert!(calculation.create(&env, CreateMode::default()).expect("first create"));
        let cell = env
            .filesystem()
            .read_to_string(Path::new("runs/001/Si2.cell"))
            .expect("cell written");
        assert!(cell.starts_with("%block positions_frac\n"));
        let param = env
            .filesystem()
            .read_to_string(Path::new("runs/001/Si2.param"))
            .expect("param written");
        assert_eq!(param, "task : singlepoint\n");

        let error = calculation
            .create(&env, CreateMode::default())
            .expect_err("existing directory");
        assert_eq!(error.placeholder(), "IO.DIRECTORY_EXISTS");
        assert!(!calculation.create(&env, CreateMode::passive()).expect("passive skip"));
        assert!(calculation.create(&env, CreateMode::forced()).expect("forced"));
        let rewritten = env
            .filesystem()
            .read_to_string(Path::new("runs/001/Si2.cell"))
            .expect("cell rewritten");
        assert_eq!(rewritten, cell);
    }

    #[test]
    fn create_skips_empty_categories() {
        let registry = registry();
        let env = memory_env();
        let calculation = Calculation::new(
            Some(PathBuf::from("only-param")),
            Some("job".into()),
            vec![line(&registry, "task : singlepoint")],
        )
        .expect("calc");

        calculation.create(&env, CreateMode::default()).expect("create");
        assert!(!env.filesystem().exists(Path::new("only-param/job.cell")));
        assert!(env.filesystem().exists(Path::new("only-param/job.param")));
    }

    #[test]
    fn created_directory_reads_back_into_equal_calculation() {
        let registry = registry();
        let env = memory_env();
        let original = Calculation::new(
            Some(PathBuf::from("roundtrip")),
            Some("Si2".into()),
            vec![
                positions(&registry),
                line(&registry, "kpoints_mp_grid : 4 4 4"),
                line(&registry, "task : singlepoint"),
                line(&registry, "cut_off_energy : 450 ev"),
            ],
        )
        .expect("calc");
        original.create(&env, CreateMode::default()).expect("create");

        let restored = Calculation::from_directory(&env, &registry, Path::new("roundtrip"), None)
            .expect("read back");
        assert_eq!(restored, original);
    }

    #[test]
    fn written_inputs_keep_small_and_precise_floats() {
        let registry = registry();
        let env = memory_env();
        let original = Calculation::new(
            Some(PathBuf::from("tight")),
            Some("Si2".into()),
            vec![
                positions(&registry),
                Setting::keyword(&registry, "kpoints_mp_offset", [0.0625, 0.333333, -0.123456], None)
                    .expect("offset"),
                Setting::keyword(&registry, "elec_energy_tol", 1.0e-6, Some("eV")).expect("tol"),
                Setting::keyword(&registry, "geom_energy_tol", 2.5e-7, Some("eV")).expect("geom tol"),
                Setting::keyword(&registry, "smearing_width", 1.23456789, Some("eV")).expect("width"),
            ],
        )
        .expect("calc");
        original.create(&env, CreateMode::default()).expect("create");

        let param = env
            .filesystem()
            .read_to_string(Path::new("tight/Si2.param"))
            .expect("param written");
        assert!(param.contains("elec_energy_tol : 1e-6 ev"), "{}", param);

        let restored = Calculation::from_directory(&env, &registry, Path::new("tight"), None)
            .expect("read back");
        assert_eq!(restored, original);
    }

    #[test]
    fn from_directory_reports_missing_and_ambiguous_inputs() {
        let registry = registry();
        let env = memory_env();
        let missing = Calculation::from_directory(&env, &registry, Path::new("nowhere"), None)
            .expect_err("missing directory");
        assert_eq!(missing.category(), BatchErrorCategory::Filesystem);

        let fs = env.filesystem();
        fs.create_dir_all(Path::new("two")).expect("dir");
        fs.write(Path::new("two/a.cell"), "symmetry_generate\n").expect("a");
        fs.write(Path::new("two/b.cell"), "symmetry_generate\n").expect("b");
        let ambiguous = Calculation::from_directory(&env, &registry, Path::new("two"), None)
            .expect_err("two cell files");
        assert_eq!(ambiguous.placeholder(), "STATE.AMBIGUOUS_NAME");

        let chosen = Calculation::from_directory(&env, &registry, Path::new("two"), Some("b"))
            .expect("explicit name");
        assert_eq!(chosen.explicit_name(), Some("b"));
    }

    struct LineCounter;

    impl OutputAnalyzer for LineCounter {
        type Record = usize;

        fn analyze(&self, lines: &[String]) -> BatchResult<usize> {
            Ok(lines.len())
        }
    }

    #[test]
    fn analyze_requires_completed_job() {
        let registry = registry();
        let env = memory_env();
        let calculation = Calculation::new(
            Some(PathBuf::from("analyze")),
            Some("job".into()),
            vec![line(&registry, "task : singlepoint")],
        )
        .expect("calc");
        calculation.create(&env, CreateMode::default()).expect("create");

        let error = calculation
            .analyze(&env, &LineCounter)
            .expect_err("not completed");
        assert_eq!(error.category(), BatchErrorCategory::State);

        env.filesystem()
            .write(
                Path::new("analyze/job.castep"),
                "header\nFinal energy = -10.0 eV\nTotal time          =         12.30 s\n",
            )
            .expect("output");
        assert_eq!(calculation.analyze(&env, &LineCounter).expect("analyzed"), 3);
    }

    #[test]
    fn submit_appends_queue_and_writes_marker() {
        let registry = registry();
        let env = memory_env();
        let calculation = Calculation::new(
            Some(PathBuf::from("queue/001")),
            Some("job".into()),
            vec![line(&registry, "task : singlepoint")],
        )
        .expect("calc");

        let early = calculation
            .submit(&env, Path::new("queue.txt"))
            .expect_err("not created yet");
        assert_eq!(early.placeholder(), "STATE.NOT_SUBMITTABLE");

        calculation.create(&env, CreateMode::default()).expect("create");
        calculation.submit(&env, Path::new("queue.txt")).expect("submit");
        assert_eq!(
            env.filesystem()
                .read_to_string(Path::new("queue.txt"))
                .expect("queue"),
            "queue/001 job\n"
        );
        assert!(env.filesystem().exists(Path::new("queue/001/job.sub")));

        let again = calculation
            .submit(&env, Path::new("queue.txt"))
            .expect_err("already submitted");
        assert_eq!(again.category(), BatchErrorCategory::State);
    }
}
