use keyscope_core::{HashField, PendingMessage, StreamEntryId, ZSetMember};

/// `count` members `member:000`.. with scores `0, 1, 2, ...`.
pub fn zset_members(count: usize) -> Vec<ZSetMember> {
    (0..count)
        .map(|i| ZSetMember::new(format!("member:{:03}", i), i as f64))
        .collect()
}

pub fn zset(pairs: &[(&str, f64)]) -> Vec<ZSetMember> {
    pairs
        .iter()
        .map(|(name, score)| ZSetMember::new(*name, *score))
        .collect()
}

pub fn hash_fields(count: usize) -> Vec<HashField> {
    (0..count)
        .map(|i| HashField::new(format!("field:{:03}", i), format!("value {}", i)))
        .collect()
}

pub fn pending_message(id: &str, consumer: &str, idle_ms: u64) -> PendingMessage {
    PendingMessage {
        id: id.parse().unwrap_or(StreamEntryId::new(0, 0)),
        consumer: consumer.to_string(),
        idle_ms,
        delivered_count: 1,
    }
}

/// Redis-style glob match: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

fn match_from(pattern: &[char], text: &[char]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return text.is_empty();
    };

    match first {
        '*' => (0..=text.len()).any(|skip| match_from(rest, &text[skip..])),
        '?' => !text.is_empty() && match_from(rest, &text[1..]),
        '[' => {
            let Some((&ch, remaining)) = text.split_first() else {
                return false;
            };
            match class_match(rest, ch) {
                Some((matched, after)) => matched && match_from(after, remaining),
                None => ch == '[' && match_from(rest, remaining),
            }
        }
        '\\' if !rest.is_empty() => {
            !text.is_empty() && text[0] == rest[0] && match_from(&rest[1..], &text[1..])
        }
        literal => !text.is_empty() && text[0] == literal && match_from(rest, &text[1..]),
    }
}

/// Matches `ch` against a class body; returns the verdict and the pattern after `]`.
fn class_match(body: &[char], ch: char) -> Option<(bool, &[char])> {
    let (negated, mut i) = match body.first() {
        Some('^') => (true, 1),
        _ => (false, 0),
    };

    let mut matched = false;
    while i < body.len() {
        match body[i] {
            ']' => return Some((matched != negated, &body[i + 1..])),
            '\\' if i + 1 < body.len() => {
                matched |= body[i + 1] == ch;
                i += 2;
            }
            start if i + 2 < body.len() && body[i + 1] == '-' && body[i + 2] != ']' => {
                let end = body[i + 2];
                let (low, high) = if start <= end { (start, end) } else { (end, start) };
                matched |= (low..=high).contains(&ch);
                i += 3;
            }
            other => {
                matched |= other == ch;
                i += 1;
            }
        }
    }

    None
}
