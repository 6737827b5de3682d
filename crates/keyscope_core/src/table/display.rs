use crate::member::KeyType;

pub const NO_RESULTS_FOUND_TEXT: &str = "No results found.";

/// Names longer than this are shortened in tooltips.
pub const LONG_NAME_LIMIT: usize = 500;
const LONG_NAME_TAIL: usize = 50;

/// Text rendered inside a cell: at most `max_chars` characters.
pub fn cell_content(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Tooltip text for a possibly huge member name.
pub fn format_long_name(name: &str) -> String {
    let length = name.chars().count();
    if length <= LONG_NAME_LIMIT {
        return name.to_string();
    }

    let head_len = LONG_NAME_LIMIT - LONG_NAME_TAIL;
    let head: String = name.chars().take(head_len).collect();
    let tail: String = name.chars().skip(length - LONG_NAME_TAIL).collect();
    format!("{}...{}", head, tail)
}

// --- Test identifiers ---

/// `{type}-{column}-value-{value}`, e.g. `zset-member-value-a` or `zset-score-value-5`.
pub fn value_cell_id(key_type: KeyType, column: &str, value: &str) -> String {
    format!("{}-{}-value-{}", key_type.test_id_prefix(), column, value)
}

pub fn edit_button_id(key_type: KeyType, member_key: &str) -> String {
    format!("{}-edit-button-{}", key_type.test_id_prefix(), member_key)
}

pub fn remove_button_id(key_type: KeyType, member_key: &str) -> String {
    format!("{}-remove-button-{}", key_type.test_id_prefix(), member_key)
}

pub fn progress_id(key_type: KeyType) -> String {
    format!("progress-key-{}", key_type.test_id_prefix())
}

/// Id of the delete confirmation popover, unique per member and key type.
pub fn delete_popover_id(key_type: KeyType, member_key: &str) -> String {
    format!("{}_{}", member_key, key_type.test_id_prefix())
}
