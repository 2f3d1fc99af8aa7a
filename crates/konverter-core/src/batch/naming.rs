//! Descriptive output file names.

use std::collections::HashMap;

use crate::format::OutputFormat;

/// Strip the last extension from a file name.
///
/// Only a trailing `.ext` whose extension is non-empty and contains neither
/// `/` nor `.` is removed, so `archive.tar.gz` becomes `archive.tar` and
/// `name.` stays as is.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    }
}

/// Build `<basename>[_s<scale>][_q<quality>].<ext>`.
///
/// The scale suffix is written when scale differs from 100 and the quality
/// suffix when quality differs from 100. Both follow the settings whatever
/// resize mode is active.
///
/// # Examples
///
/// ```ignore
/// let name = output_file_name("photo.png", OutputFormat::Webp, 50, 80);
/// assert_eq!(name, "photo_s50_q80.webp");
/// ```
pub fn output_file_name(
    original: &str,
    format: OutputFormat,
    scale: u32,
    quality: u8,
) -> String {
    let mut name = strip_extension(original).to_string();
    if scale != 100 {
        name.push_str(&format!("_s{}", scale));
    }
    if quality != 100 {
        name.push_str(&format!("_q{}", quality));
    }
    name.push('.');
    name.push_str(format.extension());
    name
}

/// Hands out unique names within one archive.
///
/// A repeated name gets `_2`, `_3`, ... inserted before its extension.
#[derive(Debug, Default)]
pub struct UniqueNames {
    seen: HashMap<String, usize>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: String) -> String {
        let count = self.seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return name;
        }

        let stem = strip_extension(&name);
        let extension = &name[stem.len()..];
        let mut n = *count;
        loop {
            let candidate = format!("{}_{}{}", stem, n, extension);
            if !self.seen.contains_key(&candidate) {
                self.seen.insert(candidate.clone(), 1);
                return candidate;
            }
            n += 1;
        }
    }
}
