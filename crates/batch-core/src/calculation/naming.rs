/// Keys whose block content identifies the structure being computed.
pub const POSITION_BLOCK_KEYS: [&str; 2] = ["positions_frac", "positions_abs"];

/// Turns the literal lines of a positions block into a short identifier.
pub trait NameDeriver {
    fn derive_name(&self, lines: &[String]) -> Option<String>;
}

impl<F> NameDeriver for F
where
    F: Fn(&[String]) -> Option<String>,
{
    fn derive_name(&self, lines: &[String]) -> Option<String> {
        self(lines)
    }
}

/// Formula-style names: species in order of first appearance, each followed
/// by its count when above one (`Si2O4`). Unit lines and lines without three
/// coordinates are ignored; `Si:1` style labels count as `Si`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeciesFormulaNamer;

impl NameDeriver for SpeciesFormulaNamer {
    fn derive_name(&self, lines: &[String]) -> Option<String> {
        let mut counts: Vec<(String, usize)> = Vec::new();

        for line in lines {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 4 {
                continue;
            }
            let species = tokens[0].split(':').next().unwrap_or(tokens[0]);
            if species.is_empty() {
                continue;
            }
            match counts.iter_mut().find(|(existing, _)| existing == species) {
                Some((_, count)) => *count += 1,
                None => counts.push((species.to_owned(), 1)),
            }
        }

        if counts.is_empty() {
            return None;
        }

        Some(
            counts
                .into_iter()
                .map(|(species, count)| {
                    if count == 1 {
                        species
                    } else {
                        format!("{}{}", species, count)
                    }
                })
                .collect(),
        )
    }
}
