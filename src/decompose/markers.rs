//! Sub-query marker parsing
//!
//! The decomposition model writes up to five sub-queries wrapped in indexed
//! markers:
//!
//! ```text
//! <|sub0_start|>perfume scent quality<|sub0_end|>
//! <|sub1_start|>perfume smell reviews<|sub1_end|>
//! <|deep_search_end|>
//! ```

/// Opens a decomposition prompt
pub const DEEP_SEARCH_START: &str = "<|deep_search_start|>";

/// The model emits this when it is done
pub const DEEP_SEARCH_END: &str = "<|deep_search_end|>";

/// Number of sub-query slots the model was trained with
pub const MAX_SUB_QUERIES: usize = 5;

/// Wrap a query in the decomposition template
pub fn apply_template(query: &str) -> String {
    format!("{}{}\n", DEEP_SEARCH_START, query)
}

fn start_marker(index: usize) -> String {
    format!("<|sub{}_start|>", index)
}

fn end_marker(index: usize) -> String {
    format!("<|sub{}_end|>", index)
}

/// Extract sub-queries from generated text
///
/// Slot N is read from the first `<|subN_start|>` to the first `<|subN_end|>`
/// after it. Slots with a missing marker, an end marker only before the start,
/// or blank content are skipped. Output follows slot order.
pub fn extract_sub_queries(generated: &str) -> Vec<String> {
    (0..MAX_SUB_QUERIES)
        .filter_map(|index| extract_slot(generated, index))
        .collect()
}

fn extract_slot(generated: &str, index: usize) -> Option<String> {
    let open = start_marker(index);
    let close = end_marker(index);

    let content_start = generated.find(&open)? + open.len();
    let rest = &generated[content_start..];
    let content_len = rest.find(&close)?;

    let sub_query = rest[..content_len].trim();
    if sub_query.is_empty() {
        None
    } else {
        Some(sub_query.to_string())
    }
}
