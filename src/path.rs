//! Path-string normalization and round-trip construction.
//!
//! User-facing commands and logged packet dumps spell paths several ways:
//! `"01,7a,55"`, `"01 7a 55"`, `"017a55"`, even `"01,5f (2 hops)"`. Everything
//! downstream wants one canonical shape: lowercase fixed-width hex tokens,
//! one per hop.

/// Hex characters per hop for 1-byte hash prefixes (the common case).
pub const PREFIX_HEX_CHARS: usize = 2;

/// Hex characters per hop when the mesh runs 2-byte prefixes.
pub const WIDE_PREFIX_HEX_CHARS: usize = 4;

/// Parse a free-form path string into normalized lowercase hex hop tokens.
///
/// Accepts comma, colon, or whitespace separators as well as contiguous hex,
/// and strips a trailing `"(n hops)"` annotation. `prefix_hex_chars` selects
/// the token width (2 or 4); when a 4-char grouping does not divide evenly,
/// parsing falls back to 2-char tokens rather than dropping hops. Stray
/// trailing nibbles are discarded.
pub fn parse_path_string(path_str: &str, prefix_hex_chars: usize) -> Vec<String> {
    let cleaned = strip_hop_suffix(path_str);

    // Collect maximal runs of hex digits; separators just end a run.
    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in cleaned.chars() {
        if ch.is_ascii_hexdigit() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    if prefix_hex_chars == WIDE_PREFIX_HEX_CHARS {
        let wide = chunk_runs(&runs, WIDE_PREFIX_HEX_CHARS);
        if !wide.is_empty() {
            return wide;
        }
        // Input too short for any 4-char group: treat as 1-byte prefixes.
    }
    chunk_runs(&runs, PREFIX_HEX_CHARS)
}

fn chunk_runs(runs: &[String], width: usize) -> Vec<String> {
    let mut tokens = Vec::new();
    for run in runs {
        let mut i = 0;
        while i + width <= run.len() {
            tokens.push(run[i..i + width].to_string());
            i += width;
        }
    }
    tokens
}

/// Drop a trailing parenthesized hop-count annotation, e.g. `" (2 hops)"`.
fn strip_hop_suffix(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('(') {
        let (before, paren) = rest.split_at(open);
        out.push_str(before);
        match paren.find(')') {
            Some(close) if paren[..close].to_ascii_lowercase().contains("hop") => {
                rest = &paren[close + 1..];
            }
            Some(close) => {
                out.push_str(&paren[..=close]);
                rest = &paren[close + 1..];
            }
            None => {
                out.push_str(paren);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Build a round-trip path: `[a,b,c] -> [a,b,c,b,a]`.
///
/// The return leg is the reverse of the outbound path minus its final node,
/// so the far end is visited once and the echo retraces the same repeaters.
/// Paths shorter than two hops come back unchanged.
pub fn build_reciprocal(nodes: &[String]) -> Vec<String> {
    if nodes.len() < 2 {
        return nodes.to_vec();
    }
    let mut path = nodes.to_vec();
    path.extend(nodes[..nodes.len() - 1].iter().rev().cloned());
    path
}

/// Render a hop list as the wire path string: comma-joined lowercase hex,
/// each hop cut down to its 2-char prefix (longer identifiers such as full
/// public keys keep only the leading byte). An empty path means a flood
/// probe and has no wire string.
pub fn path_to_wire(nodes: &[String]) -> Option<String> {
    let tokens: Vec<String> = nodes
        .iter()
        .map(|n| n.trim().to_ascii_lowercase())
        .filter_map(|n| n.get(..PREFIX_HEX_CHARS).map(str::to_string))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_comma_separated() {
        assert_eq!(parse_path_string("01,5f,ab", 2), v(&["01", "5f", "ab"]));
    }

    #[test]
    fn parses_space_and_colon_separated() {
        assert_eq!(parse_path_string("01 5f ab", 2), v(&["01", "5f", "ab"]));
        assert_eq!(parse_path_string("01:5f:ab", 2), v(&["01", "5f", "ab"]));
    }

    #[test]
    fn parses_contiguous_hex() {
        assert_eq!(parse_path_string("015fab", 2), v(&["01", "5f", "ab"]));
    }

    #[test]
    fn strips_hop_count_suffix() {
        assert_eq!(parse_path_string("01,5f (2 hops)", 2), v(&["01", "5f"]));
        assert_eq!(parse_path_string("01 (1 hop)", 2), v(&["01"]));
    }

    #[test]
    fn normalizes_case() {
        assert_eq!(parse_path_string("01,5F,aB", 2), v(&["01", "5f", "ab"]));
    }

    #[test]
    fn empty_input_yields_empty_path() {
        assert_eq!(parse_path_string("", 2), Vec::<String>::new());
        assert_eq!(parse_path_string("  ,, ", 2), Vec::<String>::new());
    }

    #[test]
    fn drops_trailing_odd_nibble() {
        assert_eq!(parse_path_string("015", 2), v(&["01"]));
    }

    #[test]
    fn wide_prefix_grouping() {
        assert_eq!(parse_path_string("01025fab", 4), v(&["0102", "5fab"]));
        assert_eq!(
            parse_path_string("0102,5fab,abcd", 4),
            v(&["0102", "5fab", "abcd"])
        );
    }

    #[test]
    fn wide_prefix_falls_back_when_too_short() {
        assert_eq!(parse_path_string("01", 4), v(&["01"]));
    }

    #[test]
    fn reciprocal_three_hops() {
        assert_eq!(
            build_reciprocal(&v(&["01", "7a", "55"])),
            v(&["01", "7a", "55", "7a", "01"])
        );
    }

    #[test]
    fn reciprocal_short_paths_unchanged() {
        assert_eq!(build_reciprocal(&v(&["01"])), v(&["01"]));
        assert_eq!(build_reciprocal(&[]), Vec::<String>::new());
    }

    #[test]
    fn wire_string_forms() {
        assert_eq!(
            path_to_wire(&v(&["01", "7A", " 55 "])),
            Some("01,7a,55".to_string())
        );
        assert_eq!(path_to_wire(&[]), None);
        assert_eq!(path_to_wire(&v(&["", "a"])), None);
    }

    #[test]
    fn wire_string_truncates_to_prefix_width() {
        // Callers sometimes hand over full keys; only the leading byte goes
        // on the wire.
        assert_eq!(
            path_to_wire(&v(&["7abc", "01aaaa"])),
            Some("7a,01".to_string())
        );
    }
}
