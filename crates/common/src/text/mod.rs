//! Text canonicalization
//!
//! One canonical form feeds the whole pipeline: lowercase, accents
//! stripped, punctuation collapsed to spaces. The reverse synonym index,
//! the dialect lexicon, and the scorer all compare in this space.

/// Canonicalize text: case-fold, strip diacritics, replace characters
/// outside `[a-z0-9\s-]` with space, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars().flat_map(|c| c.to_lowercase()) {
        let folded = fold_diacritic(c);
        if folded.is_ascii_alphanumeric() || folded == '-' {
            out.push(folded);
        } else {
            out.push(' ');
        }
    }

    // Collapse whitespace
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map accented characters of the French alphabet to their base letter.
/// Anything else passes through unchanged.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' => 'i',
        'ô' | 'ö' | 'ó' | 'õ' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        'ÿ' => 'y',
        'ñ' => 'n',
        'œ' => 'o',
        'æ' => 'a',
        _ => c,
    }
}

/// Tokenize normalized text keeping only tokens longer than 2 characters.
/// This is the token set synonym expansion operates on.
pub fn long_tokens(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// Tokenize normalized text preserving short tokens ("av", "ar", "g",
/// "d"). Position detection needs these; synonym matching does not.
pub fn all_tokens(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

/// Word-boundary containment check over normalized text.
pub fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|t| t == word)
}

/// Containment check for multi-word phrases over normalized text.
/// Falls back to [`contains_word`] for single tokens.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if !phrase.contains(' ') {
        return contains_word(haystack, phrase);
    }
    // Phrase match must land on word boundaries on both ends
    let padded_h = format!(" {} ", haystack);
    let padded_p = format!(" {} ", phrase);
    padded_h.contains(&padded_p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accents() {
        assert_eq!(normalize("Référence Éclairée"), "reference eclairee");
        assert_eq!(normalize("pièce détachée"), "piece detachee");
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize("l'arrière, s.v.p!"), "l arriere s v p");
        assert_eq!(normalize("pare-chocs   avant"), "pare-chocs avant");
    }

    #[test]
    fn test_token_sets() {
        let norm = normalize("amortisseur AV g");
        assert_eq!(long_tokens(&norm), vec!["amortisseur"]);
        assert_eq!(all_tokens(&norm), vec!["amortisseur", "av", "g"]);
    }

    #[test]
    fn test_word_boundaries() {
        assert!(contains_word("amortisseur av g swift", "av"));
        assert!(!contains_word("lavage auto", "av"));
        assert!(contains_phrase("plaquette frein av celerio", "plaquette frein"));
        assert!(!contains_phrase("plaquette de frein", "plaquette frein"));
    }
}
