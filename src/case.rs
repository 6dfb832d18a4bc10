//! Identifier inflection: model names -> snake_case table names, singular -> plural.

/// Convert a single identifier from CamelCase/camelCase to snake_case.
/// e.g. "BookLoan" -> "book_loan", "authorId" -> "author_id"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("ox", "oxen"),
];

const UNCOUNTABLE: &[&str] = &["equipment", "information", "money", "news", "series", "species", "sheep", "fish"];

/// English pluralization for table names.
/// e.g. "author" -> "authors", "country" -> "countries", "box" -> "boxes", "person" -> "people"
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    // Only the last word of a snake_case compound inflects.
    let (head, stem) = match word.rfind('_') {
        Some(i) => word.split_at(i + 1),
        None => ("", word),
    };
    let last = stem.to_lowercase();
    let last = last.as_str();
    if UNCOUNTABLE.contains(&last) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == last) {
        return format!("{}{}", head, plural);
    }
    if last.ends_with('y') && !ends_with_vowel_before_y(last) {
        let cut = stem.char_indices().last().map_or(0, |(i, _)| i);
        return format!("{}{}ies", head, &stem[..cut]);
    }
    if last.ends_with("ss")
        || last.ends_with('x')
        || last.ends_with('z')
        || last.ends_with("ch")
        || last.ends_with("sh")
    {
        return format!("{}es", word);
    }
    if last.ends_with('s') {
        return word.to_string();
    }
    format!("{}s", word)
}

fn ends_with_vowel_before_y(word: &str) -> bool {
    let mut chars = word.chars().rev();
    chars.next();
    matches!(chars.next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_from_model_names() {
        assert_eq!(to_snake_case("Book"), "book");
        assert_eq!(to_snake_case("BookLoan"), "book_loan");
        assert_eq!(to_snake_case("parentBookId"), "parent_book_id");
    }

    #[test]
    fn pluralize_common_words() {
        assert_eq!(pluralize("author"), "authors");
        assert_eq!(pluralize("country"), "countries");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("branch"), "branches");
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("news"), "news");
        assert_eq!(pluralize("parent_book"), "parent_books");
        assert_eq!(pluralize("book_category"), "book_categories");
        assert_eq!(pluralize("users"), "users");
    }

    #[test]
    fn pluralize_keeps_non_ascii_intact() {
        assert_eq!(pluralize("ȺȺ_by"), "ȺȺ_bies");
        assert_eq!(pluralize("İİ_city"), "İİ_cities");
        assert_eq!(pluralize("café"), "cafés");
    }
}
