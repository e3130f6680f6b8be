//! Reader and writer for the `.cell` / `.param` line format.

use crate::domain::{BatchError, BatchResult, Category};
use crate::schema::SchemaRegistry;
use crate::setting::{Setting, SettingValue};

const COMMENT_MARKER: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTokenLine {
    pub source_line: usize,
    pub raw: String,
    pub tokens: Vec<String>,
}

/// Content lines with comments and blank lines removed, numbered from 1.
pub fn content_lines(source: &str) -> Vec<(usize, String)> {
    source
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let stripped = strip_comment(line).trim();
            (!stripped.is_empty()).then(|| (index + 1, stripped.to_owned()))
        })
        .collect()
}

pub fn tokenize_keyword_line(source_line: usize, line: &str) -> InputTokenLine {
    let separated = line.replace([':', '='], " ");
    InputTokenLine {
        source_line,
        raw: line.to_owned(),
        tokens: separated.split_whitespace().map(str::to_owned).collect(),
    }
}

pub fn parse_settings(source: &str, registry: &SchemaRegistry) -> BatchResult<Vec<Setting>> {
    let lines = content_lines(source);
    let mut settings = Vec::new();
    let mut cursor = lines.iter();

    while let Some((source_line, line)) = cursor.next() {
        let Some(key) = block_key(line, "%block") else {
            let setting = parse_keyword_line(line, registry)
                .map_err(|error| error.context(format!("line {}", source_line)))?;
            settings.push(setting);
            continue;
        };

        let mut body = Vec::new();
        let mut closed = false;
        for (end_line, inner) in cursor.by_ref() {
            if let Some(end_key) = block_key(inner, "%endblock") {
                if !end_key.eq_ignore_ascii_case(&key) {
                    return Err(BatchError::validation(
                        "VALIDATION.BLOCK_MISMATCH",
                        format!(
                            "line {}: '%endblock {}' does not close '%block {}' opened at line {}",
                            end_line, end_key, key, source_line
                        ),
                    ));
                }
                closed = true;
                break;
            }
            body.push(inner.clone());
        }

        if !closed {
            return Err(BatchError::validation(
                "VALIDATION.UNTERMINATED_BLOCK",
                format!("line {}: '%block {}' is never closed", source_line, key),
            ));
        }

        let setting = Setting::block(registry, &key, body)
            .map_err(|error| error.context(format!("line {}", source_line)))?;
        settings.push(setting);
    }

    Ok(settings)
}

/// Parses one keyword line: `flag`, `key value`, `key value unit` or
/// `key x y z`.
pub fn parse_keyword_line(line: &str, registry: &SchemaRegistry) -> BatchResult<Setting> {
    let token_line = tokenize_keyword_line(0, strip_comment(line).trim());
    let tokens: Vec<&str> = token_line.tokens.iter().map(String::as_str).collect();

    match tokens.as_slice() {
        [key] => Setting::flag(registry, key),
        [key, value] => Setting::keyword(registry, key, SettingValue::detect(value), None),
        [key, value, unit] => {
            Setting::keyword(registry, key, SettingValue::detect(value), Some(*unit))
        }
        [key, x, y, z] => {
            Setting::keyword(registry, key, SettingValue::detect_vector([*x, *y, *z])?, None)
        }
        _ => Err(BatchError::validation(
            "VALIDATION.TOKEN_COUNT",
            format!(
                "expected 1 to 4 tokens in '{}', found {}",
                token_line.raw,
                tokens.len()
            ),
        )),
    }
}

/// Renders the file for `category`: matching settings in priority order,
/// keyword keys padded to a common width. The param file separates integer
/// priority buckets with a blank line.
pub fn render_input_file<'a, I>(settings: I, category: Category) -> String
where
    I: IntoIterator<Item = &'a Setting>,
{
    let mut selected: Vec<&Setting> = settings
        .into_iter()
        .filter(|setting| setting.category() == category)
        .collect();
    selected.sort_by(|a, b| a.file_order(b));

    let key_width = selected
        .iter()
        .filter(|setting| !setting.is_block())
        .map(|setting| setting.key().len())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::new();
    let mut previous_bucket = None;
    for setting in selected {
        let bucket = setting.priority_bucket();
        if category == Category::Param
            && previous_bucket.is_some_and(|previous| previous != bucket)
        {
            lines.push(String::new());
        }
        previous_bucket = Some(bucket);
        lines.extend(setting.render_lines(key_width));
    }

    normalize_text_artifact(&lines.join("\n"))
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT_MARKER) {
        Some(index) => &line[..index],
        None => line,
    }
}

fn block_key(line: &str, directive: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if !first.eq_ignore_ascii_case(directive) {
        return None;
    }
    Some(tokens.next().unwrap_or_default().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{content_lines, normalize_text_artifact, parse_keyword_line, parse_settings, render_input_file};
    use crate::domain::Category;
    use crate::schema::SchemaRegistry;
    use crate::setting::{Setting, SettingValue};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().expect("builtin schema")
    }

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let lines = content_lines("! header\n\ntask : singlepoint ! trailing\n   \n");
        assert_eq!(lines, vec![(3, "task : singlepoint".to_string())]);
    }

    #[test]
    fn keyword_lines_follow_token_count_rules() {
        let registry = registry();

        let flag = parse_keyword_line("SPIN_POLARIZED", &registry).expect("flag");
        assert_eq!(flag.value(), Some(&SettingValue::Bool(true)));

        let task = parse_keyword_line("task = GeometryOptimization", &registry).expect("task");
        assert_eq!(
            task.value(),
            Some(&SettingValue::Text("geometryoptimization".into()))
        );

        let cutoff = parse_keyword_line("cut_off_energy : 450 eV", &registry).expect("cutoff");
        assert_eq!(cutoff.value(), Some(&SettingValue::Float(450.0)));
        assert_eq!(cutoff.unit(), Some("ev"));

        let grid = parse_keyword_line("kpoints_mp_grid 4 4 2", &registry).expect("grid");
        assert_eq!(grid.value(), Some(&SettingValue::IntVector([4, 4, 2])));

        let error = parse_keyword_line("kpoints_mp_grid 4 4 2 1", &registry)
            .expect_err("too many tokens");
        assert_eq!(error.placeholder(), "VALIDATION.TOKEN_COUNT");
    }

    #[test]
    fn blocks_keep_inner_lines_verbatim() {
        let source = "%BLOCK positions_frac\nSi 0.0 0.0 0.0 ! origin\n  Si 0.25 0.25 0.25\n%ENDBLOCK POSITIONS_FRAC\nsymmetry_generate\n";
        let settings = parse_settings(source, &registry()).expect("parsed cell");

        assert_eq!(settings.len(), 2);
        assert_eq!(settings[0].key(), "positions_frac");
        assert_eq!(
            settings[0].block_lines().expect("block lines"),
            ["Si 0.0 0.0 0.0", "Si 0.25 0.25 0.25"]
        );
        assert_eq!(settings[1].key(), "symmetry_generate");
    }

    #[test]
    fn mismatched_or_unterminated_blocks_are_fatal() {
        let registry = registry();
        let mismatch = parse_settings("%block positions_frac\nSi 0 0 0\n%endblock lattice_cart\n", &registry)
            .expect_err("mismatched block");
        assert_eq!(mismatch.placeholder(), "VALIDATION.BLOCK_MISMATCH");

        let open = parse_settings("%block positions_frac\nSi 0 0 0\n", &registry)
            .expect_err("unterminated block");
        assert_eq!(open.placeholder(), "VALIDATION.UNTERMINATED_BLOCK");
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let error = parse_settings("task : singlepoint\n\ncut_off_energy : -3\n", &registry())
            .expect_err("negative cutoff");
        assert_eq!(error.placeholder(), "VALIDATION.OUT_OF_RANGE");
        assert!(error.message().starts_with("line 3:"), "{}", error.message());
    }

    #[test]
    fn param_file_groups_priority_buckets() {
        let registry = registry();
        let settings = vec![
            Setting::keyword(&registry, "max_scf_cycles", 100, None).unwrap(),
            Setting::keyword(&registry, "task", "singlepoint", None).unwrap(),
            Setting::keyword(&registry, "elec_energy_tol", 1.0e-4, Some("eV")).unwrap(),
            Setting::keyword(&registry, "xc_functional", "pbe", None).unwrap(),
            Setting::keyword(&registry, "spin_polarized", false, None).unwrap(),
            Setting::keyword(&registry, "kpoints_mp_grid", [2_i64, 2, 2], None).unwrap(),
        ];

        let rendered = render_input_file(&settings, Category::Param);
        assert_eq!(
            rendered,
            "task            : singlepoint\n\
             \n\
             xc_functional   : pbe\n\
             spin_polarized  : false\n\
             \n\
             elec_energy_tol : 0.0001 ev\n\
             max_scf_cycles  : 100\n"
        );

        let cell = render_input_file(&settings, Category::Cell);
        assert_eq!(cell, "kpoints_mp_grid : 2 2 2\n");
    }

    #[test]
    fn rendered_lines_parse_back_to_equal_settings() {
        let registry = registry();
        let originals = vec![
            Setting::keyword(&registry, "task", "SinglePoint", None).unwrap(),
            Setting::keyword(&registry, "cut_off_energy", 425.5, Some("eV")).unwrap(),
            Setting::keyword(&registry, "max_scf_cycles", 60, None).unwrap(),
            Setting::keyword(&registry, "calculate_stress", true, None).unwrap(),
            Setting::keyword(&registry, "kpoints_mp_offset", [0.25, 0.25, 0.0], None).unwrap(),
            Setting::keyword(&registry, "kpoints_mp_offset", [0.0625, 0.333333, -0.123456], None)
                .unwrap(),
            Setting::keyword(&registry, "elec_energy_tol", 1.0e-6, Some("eV")).unwrap(),
            Setting::keyword(&registry, "geom_energy_tol", 2.5e-7, Some("eV")).unwrap(),
            Setting::keyword(&registry, "smearing_width", 1.23456789, Some("eV")).unwrap(),
            Setting::keyword(&registry, "kpoints_mp_grid", [3_i64, 3, 1], None).unwrap(),
            Setting::block(&registry, "positions_frac", ["Si 0 0 0", "O 0.5 0.5 0.5"]).unwrap(),
            Setting::block(&registry, "devel_code", ["PP=T", "MD:PRINT=T:ENDMD"]).unwrap(),
        ];

        for original in &originals {
            let rendered = original.render_lines(0).join("\n");
            let parsed = parse_settings(&rendered, &registry).expect("rendered line parses");
            assert_eq!(parsed, vec![original.clone()], "round trip of {}", rendered);
        }
    }

    #[test]
    fn text_artifacts_use_canonical_line_endings() {
        assert_eq!(normalize_text_artifact("alpha\r\nbeta\rgamma"), "alpha\nbeta\ngamma\n");
        assert_eq!(normalize_text_artifact(""), "");
    }
}
