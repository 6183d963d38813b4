//! Filesystem-safe, collision-free file names for entry titles.
//!
//! Pure functions: no state, no I/O. Given the same title, extension and set
//! of existing names, [`generate_filename`] always returns the same answer.

use std::collections::HashSet;

/// Longest base name (before the extension), in characters.
pub const MAX_BASENAME_LEN: usize = 200;

/// Replacement for characters that are illegal in file names.
pub const PLACEHOLDER: char = '_';

/// Characters rejected by at least one common filesystem (NTFS, FAT).
const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '^'];

/// Generate a legal file name for `title` that does not collide,
/// case-insensitively, with anything in `existing`.
///
/// Collisions are resolved by appending ` 1`, ` 2`, ... before the extension,
/// since some target filesystems fold case.
pub fn generate_filename<S: AsRef<str>>(title: &str, extension: &str, existing: &[S]) -> String {
    let base = base_filename(title);
    let taken: HashSet<String> = existing
        .iter()
        .map(|name| name.as_ref().to_lowercase())
        .collect();

    let mut filename = format!("{base}{extension}");
    let mut count: u64 = 1;
    while taken.contains(&filename.to_lowercase()) {
        filename = format!("{base} {count}{extension}");
        count += 1;
    }
    filename
}

/// Sanitize, transliterate and truncate a title into a base file name.
///
/// The result is never empty and never starts with `.`: loading and watching
/// skip dot-files, so such a name would not survive a restart.
pub fn base_filename(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if ILLEGAL.contains(&c) || c.is_whitespace() || (i == 0 && c == '.') {
                PLACEHOLDER
            } else {
                c
            }
        })
        .collect();

    let mut base = transliterate(&sanitized);
    if let Some((cut, _)) = base.char_indices().nth(MAX_BASENAME_LEN) {
        base.truncate(cut);
    }
    if base.is_empty() {
        base.push(PLACEHOLDER);
    }
    base
}

/// Best-effort Cyrillic to Latin transliteration.
///
/// Characters without a mapping pass through unchanged. This is a fixed,
/// lossy table, not Unicode normalization.
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match transliterate_char(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

fn transliterate_char(c: char) -> Option<&'static str> {
    // Capitals map to capitals, 'А' included.
    let latin = match c {
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Е' => "E",
        'Ё' => "YO",
        'Ж' => "ZH",
        'З' => "Z",
        'И' => "I",
        'Й' => "I",
        'К' => "K",
        'Л' => "L",
        'М' => "M",
        'Н' => "N",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'У' => "U",
        'Ф' => "F",
        'Х' => "H",
        'Ц' => "TS",
        'Ч' => "CH",
        'Ш' => "SH",
        'Щ' => "SCH",
        'Ъ' => "'",
        'Ы' => "I",
        'Ь' => "'",
        'Э' => "E",
        'Ю' => "YU",
        'Я' => "Ya",
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "i",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' => "'",
        'ы' => "i",
        'ь' => "'",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}
