//! Name normalization used to match salesperson names across data sources.
//!
//! Sales exports and hand-maintained group tables spell the same person in
//! different ways ("José Pérez", "JOSE PEREZ", "jose  perez."). Every lookup
//! keyed by a person goes through [`normalize_name`] first.

/// Uppercases, strips Latin diacritics, drops punctuation and collapses
/// whitespace. Digits are kept. Folding covers the Spanish and Portuguese
/// accented letters only; others such as `ø`, `ł` or `ś` are kept as they
/// are and will not match a plain-ASCII spelling.
pub fn normalize_name(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch.is_whitespace() || matches!(ch, '_' | '-' | '/') {
            pending_space = !output.is_empty();
            continue;
        }

        let Some(folded) = fold_char(ch) else {
            continue;
        };

        if pending_space {
            output.push(' ');
            pending_space = false;
        }
        for upper in folded.to_uppercase() {
            output.push(upper);
        }
    }

    output
}

fn fold_char(ch: char) -> Option<char> {
    let folded = match ch {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' | 'Á' | 'À' | 'Ä' | 'Â' | 'Ã' | 'Å' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' | 'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        'ý' | 'ÿ' | 'Ý' => 'y',
        other if other.is_alphanumeric() => other,
        _ => return None,
    };
    Some(folded)
}
