//! Slug generation with Russian-to-Latin transliteration.

use crate::validators::SLUG_MAX_LENGTH;

fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
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
        'й' => "j",
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
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}

/// Lowercase, transliterate and hyphenate `value` into a URL-safe slug.
///
/// `&` reads as "and" and anything that is neither ASCII alphanumeric,
/// Cyrillic, `-` nor `_` is dropped. Surrounding whitespace is trimmed after
/// that, then every run of whitespace and hyphens becomes one hyphen. Hyphens
/// written at either end of the name survive, so `"-Tom-"` gives `"-tom-"`.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase().replace('&', " and ");

    let mut kept = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_whitespace() || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            kept.push(c);
        } else if let Some(latin) = transliterate(c) {
            kept.push_str(latin);
        }
    }

    let mut slug = String::with_capacity(kept.len());
    let mut in_separator = false;
    for c in kept.trim().chars() {
        if c.is_whitespace() || c == '-' {
            if !in_separator {
                slug.push('-');
            }
            in_separator = true;
        } else {
            slug.push(c);
            in_separator = false;
        }
    }
    slug
}

/// Slug derived from a kitten name, capped at the column length.
pub fn derive_slug(name: &str) -> String {
    slugify(name).chars().take(SLUG_MAX_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_names() {
        assert_eq!(slugify("Tom Cat"), "tom-cat");
        assert_eq!(slugify("  Salt & Pepper  "), "salt-and-pepper");
        assert_eq!(slugify("a -- b"), "a-b");
    }

    #[test]
    fn test_cyrillic_transliteration() {
        assert_eq!(slugify("Барсик"), "barsik");
        assert_eq!(slugify("Пушистый Ёжик"), "pushistyj-yozhik");
        assert_eq!(slugify("Щучка-Мурка"), "schuchka-murka");
    }

    #[test]
    fn test_symbols_dropped() {
        assert_eq!(slugify("Kitty!!! #1"), "kitty-1");
    }

    #[test]
    fn test_edges() {
        assert_eq!(slugify("Tom "), "tom");
        assert_eq!(slugify("Tom !"), "tom");
        assert_eq!(slugify("ъ Мурка"), "murka");
        assert_eq!(slugify("-Tom-"), "-tom-");
        assert_eq!(slugify("--Tom  --"), "-tom-");
    }

    #[test]
    fn test_derive_slug_truncates() {
        let name = "щ".repeat(40);
        let slug = derive_slug(&name);
        assert_eq!(slug.len(), SLUG_MAX_LENGTH);
        assert!(slug.starts_with("schsch"));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(derive_slug("Мурзик Второй"), derive_slug("Мурзик Второй"));
    }
}
