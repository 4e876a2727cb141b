//! Noun-phrase keyword extraction for retrieval queries.
//!
//! Heuristic, no dependencies:
//! - all-uppercase or digit-bearing tokens are kept verbatim (ticket keys, ids)
//! - runs of capitalized words are joined into one phrase
//! - the final token of the text is always included as a recall safety net
//! - case-insensitive de-duplication, first occurrence wins

/// Capitalized only because they open a sentence
const SENTENCE_OPENERS: &[&str] = &[
    "a", "an", "and", "are", "but", "can", "could", "did", "do", "does", "give", "have", "how",
    "i", "if", "is", "let's", "okay", "so", "tell", "that", "the", "then", "walk", "was", "we",
    "what", "when", "where", "which", "who", "why", "would", "you",
];

const SENTENCE_END: &[char] = &['.', '?', '!', '。', '？', '！', '؟'];

pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    let mut last_token = None;

    for raw in text.split_whitespace() {
        let token = clean_token(raw);
        if token.is_empty() {
            continue;
        }
        last_token = Some(token);

        if is_identifier(token) {
            flush_run(&mut run, &mut keywords);
            keywords.push(token.to_string());
        } else if starts_uppercase(token) {
            run.push(token);
        } else {
            flush_run(&mut run, &mut keywords);
        }

        if raw.ends_with(SENTENCE_END) {
            flush_run(&mut run, &mut keywords);
        }
    }
    flush_run(&mut run, &mut keywords);

    if let Some(token) = last_token {
        keywords.push(token.to_string());
    }

    dedup_case_insensitive(keywords)
}

/// Join keywords into one query string, or fall back to `default`
pub fn build_query(keywords: &[String], default: &str) -> String {
    if keywords.is_empty() {
        default.to_string()
    } else {
        keywords.join(" ")
    }
}

fn clean_token(raw: &str) -> &str {
    raw.trim_matches(|c: char| !c.is_alphanumeric())
}

fn is_identifier(token: &str) -> bool {
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    let all_upper = letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase());
    has_digit || all_upper
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_uppercase())
}

fn flush_run(run: &mut Vec<&str>, keywords: &mut Vec<String>) {
    match run.as_slice() {
        [] => {}
        [single] if SENTENCE_OPENERS.contains(&single.to_lowercase().as_str()) => {}
        words => keywords.push(words.join(" ")),
    }
    run.clear();
}

fn dedup_case_insensitive(keywords: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .filter(|k| seen.insert(k.to_lowercase()))
        .collect()
}
