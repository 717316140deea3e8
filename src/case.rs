//! Inflection helpers for labels and aliases: "author_id" -> "Author", "blog_posts" -> "BlogPosts".

/// "created_at" -> "Created At". Underscores become spaces, each word is capitalized.
pub fn humanize(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// "blog_posts" -> "BlogPosts".
pub fn camelize(s: &str) -> String {
    s.split('_').filter(|w| !w.is_empty()).map(capitalize).collect()
}

/// Display label of a column: a trailing `_id` is dropped before humanizing.
pub fn column_label(column: &str) -> String {
    humanize(column.strip_suffix("_id").unwrap_or(column))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
