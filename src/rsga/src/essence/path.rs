//! Path algebra for the aliased, case-insensitive, `\`-separated path
//! space SGA archives expose (`data:\scenarios\mp\map.sgb`).
//!
//! `/` is accepted everywhere and normalized to `\`; comparisons inside
//! the filesystem are case-folded, and names are stored lowercased.

pub const SEP: char = '\\';
pub const ROOT: &str = "\\";

/// Splits `alias:rest` at the first `:`; paths without an alias yield
/// `None`.
pub fn parse(path: &str) -> (Option<&str>, &str) {
    match path.split_once(':') {
        Some((alias, rest)) => (Some(alias), rest),
        None => (None, path),
    }
}

pub fn fix_separators(path: &str) -> String {
    path.replace('/', "\\")
}

pub fn fix_case(path: &str) -> String {
    path.to_lowercase()
}

pub fn split_parts(path: &str, include_root: bool) -> Vec<String> {
    let path = fix_separators(path);

    if path == ROOT {
        return if include_root {
            vec![ROOT.to_string()]
        } else {
            Vec::new()
        };
    }
    if path.is_empty() {
        return Vec::new();
    }

    let mut parts: Vec<String> = path.split(SEP).map(str::to_string).collect();
    if path.starts_with(SEP) {
        if include_root {
            parts[0] = ROOT.to_string();
        } else {
            parts.remove(0);
        }
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Concatenates components, collapsing adjacent separators. A component
/// that starts with `\` resets the accumulator to itself.
pub fn join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = String::new();
    for part in parts {
        let part = fix_separators(part.as_ref());
        if part.is_empty() {
            continue;
        }
        if part.starts_with(SEP) || result.is_empty() {
            result = part;
        } else if !result.ends_with(SEP) {
            result.push(SEP);
            result.push_str(&part);
        } else {
            result.push_str(&part);
        }
    }
    result
}

/// Splits off the last component: `(parent, basename)`.
pub fn split(path: &str) -> (String, String) {
    let parts = split_parts(path, true);
    match parts.split_last() {
        Some((last, parents)) => (join(parents.iter()), last.clone()),
        None => (String::new(), path.to_string()),
    }
}

pub fn basename(path: &str) -> String {
    split(path).1
}

pub fn dirname(path: &str) -> String {
    split(path).0
}

pub fn strip_root(path: &str) -> &str {
    path.strip_prefix(ROOT).unwrap_or(path)
}

/// Builds a full path, inserting the alias prefix and a leading `\` when
/// an alias is given.
pub fn build<I, S>(parts: I, alias: Option<&str>) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut full = join(parts);
    match alias {
        Some(alias) => {
            if full.is_empty() {
                full = ROOT.to_string();
            } else if !full.starts_with(SEP) {
                full.insert(0, SEP);
            }
            format!("{alias}:{full}")
        }
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_the_first_colon() {
        assert_eq!(parse("data:\\a\\b"), (Some("data"), "\\a\\b"));
        assert_eq!(parse("\\a\\b"), (None, "\\a\\b"));
        assert_eq!(parse("data:"), (Some("data"), ""));
    }

    #[test]
    fn separators_normalize_to_backslash() {
        assert_eq!(fix_separators("a/b\\c/d"), "a\\b\\c\\d");
    }

    #[test]
    fn join_collapses_and_resets() {
        assert_eq!(join(["a", "b"]), "a\\b");
        assert_eq!(join(["a\\", "b"]), "a\\b");
        assert_eq!(join(["\\", "a"]), "\\a");
        assert_eq!(join(["a", "\\b", "c"]), "\\b\\c");
        assert_eq!(join(["", "a", ""]), "a");
    }

    #[test]
    fn split_peels_the_basename() {
        assert_eq!(split("a\\b\\c"), ("a\\b".to_string(), "c".to_string()));
        assert_eq!(split("\\a"), ("\\".to_string(), "a".to_string()));
        assert_eq!(split("\\"), ("".to_string(), "\\".to_string()));
        assert_eq!(split("a"), ("".to_string(), "a".to_string()));
    }

    #[test]
    fn split_parts_handles_the_root() {
        assert_eq!(split_parts("\\", true), vec!["\\"]);
        assert!(split_parts("\\", false).is_empty());
        assert_eq!(split_parts("\\a\\b", false), vec!["a", "b"]);
        assert_eq!(split_parts("a/b", false), vec!["a", "b"]);
        assert!(split_parts("", true).is_empty());
    }

    #[test]
    fn build_inserts_alias_and_root() {
        assert_eq!(build(["a", "b"], Some("data")), "data:\\a\\b");
        assert_eq!(build(Vec::<&str>::new(), Some("data")), "data:\\");
        assert_eq!(build(["a"], None), "a");
    }

    #[test]
    fn strip_root_only_removes_a_leading_separator() {
        assert_eq!(strip_root("\\a\\b"), "a\\b");
        assert_eq!(strip_root("a\\b"), "a\\b");
    }
}
