//! Incremental title search.
//!
//! A title matches when every query character appears in it, in order,
//! ignoring case. Matches are ranked by how tightly the characters cluster
//! and whether they land on word starts.

const MATCH: i64 = 16;
const CONSECUTIVE_BONUS: i64 = 24;
const WORD_START_BONUS: i64 = 20;
const FIRST_CHAR_BONUS: i64 = 12;
const GAP_PENALTY: i64 = 3;
const LEADING_GAP_PENALTY: i64 = 1;

/// Score `title` against `query`, `None` if it does not match.
pub fn score(query: &str, title: &str) -> Option<i64> {
    let mut query_chars = query.chars().flat_map(char::to_lowercase).peekable();
    if query_chars.peek().is_none() {
        return Some(0);
    }

    let mut total = 0;
    let mut last_match: Option<usize> = None;
    let mut prev: Option<char> = None;

    for (pos, c) in title.chars().enumerate() {
        let Some(&wanted) = query_chars.peek() else {
            break;
        };
        let lower = c.to_lowercase().next().unwrap_or(c);

        if lower == wanted {
            total += MATCH;
            match last_match {
                Some(last) if last + 1 == pos => total += CONSECUTIVE_BONUS,
                Some(last) => total -= GAP_PENALTY * (pos - last - 1) as i64,
                None => total -= LEADING_GAP_PENALTY * pos as i64,
            }
            if pos == 0 {
                total += FIRST_CHAR_BONUS;
            }
            if is_word_start(prev, c) {
                total += WORD_START_BONUS;
            }
            last_match = Some(pos);
            query_chars.next();
        }
        prev = Some(c);
    }

    query_chars.peek().is_none().then_some(total)
}

fn is_word_start(prev: Option<char>, c: char) -> bool {
    match prev {
        None => true,
        Some(p) => !p.is_alphanumeric() || (p.is_lowercase() && c.is_uppercase()),
    }
}

/// Indices of the titles matching `query`, best first, at most `limit`.
///
/// Ties keep the original order. An empty query returns every index in order.
pub fn rank<'a>(
    query: &str,
    titles: impl IntoIterator<Item = &'a str>,
    limit: usize,
) -> Vec<usize> {
    let titles = titles.into_iter();
    if query.trim().is_empty() {
        return titles.enumerate().map(|(i, _)| i).collect();
    }

    let mut scored: Vec<(i64, usize)> = titles
        .enumerate()
        .filter_map(|(i, title)| score(query, title).map(|s| (s, i)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(limit);
    scored.into_iter().map(|(_, i)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsequence_matching_ignores_case() {
        assert!(score("gml", "GMail").is_some());
        assert!(score("GMAIL", "gmail").is_some());
        assert!(score("lmg", "gmail").is_none());
        assert!(score("gmailx", "gmail").is_none());
    }

    #[test]
    fn test_empty_query_lists_everything() {
        let titles = ["b", "a", "c"];
        assert_eq!(rank("", titles, 1), vec![0, 1, 2]);
        assert_eq!(rank("   ", titles, 1), vec![0, 1, 2]);
    }

    #[test]
    fn test_tight_matches_rank_first() {
        let titles = ["Big Old Archive", "bank", "GitHub", "Bob"];
        let ranked = rank("ba", titles, 10);
        assert_eq!(ranked[0], 1);
        assert!(ranked.contains(&0));
        assert!(!ranked.contains(&2));
    }

    #[test]
    fn test_word_starts_beat_inner_matches() {
        let titles = ["submarine", "Server Mail"];
        assert_eq!(rank("sm", titles, 10), vec![1, 0]);
    }

    #[test]
    fn test_limit_caps_results() {
        let titles = ["mail 1", "mail 2", "mail 3", "mail 4"];
        assert_eq!(rank("mail", titles, 2), vec![0, 1]);
    }
}
