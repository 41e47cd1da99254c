//! Light Porter-style suffix stripper.
//!
//! Collapses plurals, `-ed`/`-ing` forms and doubled-consonant endings to a
//! shared stem. Every strip is guarded by a vowel check on the residue, so a
//! word is never reduced to a stem without a vowel.

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn has_vowel(s: &str) -> bool {
    s.chars().any(is_vowel)
}

/// A vowel immediately followed by a non-vowel somewhere in `s`.
fn has_vowel_consonant(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).any(|w| is_vowel(w[0]) && !is_vowel(w[1]))
}

/// A vowel followed by at least one more character before the final `s`.
fn has_vowel_before_plural_s(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    chars.len() >= 3 && chars[..chars.len() - 2].iter().copied().any(is_vowel)
}

fn ends_with_double_consonant(s: &str) -> bool {
    let mut rev = s.chars().rev();
    match (rev.next(), rev.next()) {
        (Some(a), Some(b)) => a == b && !is_vowel(a),
        _ => false,
    }
}

fn strip_plural(word: &mut String) {
    if word.ends_with("sses") {
        word.truncate(word.len() - 2);
    } else if word.ends_with("ies") || word.ends_with("ied") {
        let long = word.chars().count() > 4;
        word.truncate(word.len() - 3);
        word.push_str(if long { "i" } else { "ie" });
    } else if word.ends_with('s')
        && !word.ends_with("us")
        && !word.ends_with("ss")
        && has_vowel_before_plural_s(word)
    {
        word.pop();
    }
}

const VERBAL_SUFFIXES: [&str; 4] = ["ed", "edly", "ing", "ingly"];

fn strip_verbal(word: &mut String) {
    if word.ends_with("eed") || word.ends_with("eedly") {
        let (suffix_len, keep) = if word.ends_with("eed") { (3, 2) } else { (5, 2) };
        let stem_part = &word[..word.len() - suffix_len];
        if has_vowel_consonant(stem_part) {
            // "eed" -> "ee", "eedly" -> "ee"
            let new_len = word.len() - suffix_len + keep;
            word.truncate(new_len);
        }
        return;
    }

    let Some(suffix) = VERBAL_SUFFIXES.iter().find(|s| word.ends_with(*s)) else {
        return;
    };
    let stem = &word[..word.len() - suffix.len()];
    if !has_vowel(stem) {
        return;
    }
    let mut stem = stem.to_string();
    if stem.ends_with("at") || stem.ends_with("bl") || stem.ends_with("iz") {
        stem.push('e');
    } else if ends_with_double_consonant(&stem)
        && !(stem.ends_with("ll") || stem.ends_with("ss") || stem.ends_with("zz"))
    {
        stem.pop();
    } else if stem.chars().count() <= 3 {
        stem.push('e');
    }
    *word = stem;
}

/// Stem a lower-cased token.
pub fn stem(token: &str) -> String {
    let mut word = token.to_string();
    strip_plural(&mut word);
    strip_verbal(&mut word);
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plurals_collapse() {
        assert_eq!(stem("cats"), "cat");
        assert_eq!(stem("dogs"), "dog");
        assert_eq!(stem("classes"), "class");
        assert_eq!(stem("ponies"), "poni");
        assert_eq!(stem("ties"), "tie");
    }

    #[test]
    fn short_and_latin_endings_are_kept() {
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("this"), "this");
        assert_eq!(stem("bus"), "bus");
        assert_eq!(stem("glass"), "glass");
    }

    #[test]
    fn verbal_forms_collapse() {
        assert_eq!(stem("running"), "run");
        assert_eq!(stem("sitting"), "sit");
        assert_eq!(stem("hoped"), "hope");
        assert_eq!(stem("related"), "relate");
        assert_eq!(stem("troubled"), "trouble");
        assert_eq!(stem("falling"), "fall");
        assert_eq!(stem("agreed"), "agree");
    }

    #[test]
    fn stripping_requires_a_vowel_in_the_residue() {
        assert_eq!(stem("sing"), "sing");
        assert_eq!(stem("bed"), "bed");
        assert_eq!(stem("feed"), "feed");
    }

    #[test]
    fn unchanged_words_pass_through() {
        assert_eq!(stem("sat"), "sat");
        assert_eq!(stem("cat"), "cat");
        assert_eq!(stem("2024"), "2024");
    }
}
