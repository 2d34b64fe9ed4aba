///
/// Identifier quoting.
///
/// Everything the engine emits is double-quote escaped so reserved words and
/// mixed-case names survive any ANSI-ish dialect.
///

/// Quote one identifier.
#[must_use]
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an alias-qualified column reference.
#[must_use]
pub fn qualify(alias: &str, column: &str) -> String {
    format!("{}.{}", quote(alias), quote(column))
}

/// Pick a table alias not already taken. Self-referential chains join a
/// table to itself, so collisions get a numeric suffix.
#[must_use]
pub fn unique_alias(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|a| a == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken.iter().any(|a| a == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
        assert_eq!(qualify("t", "c"), r#""t"."c""#);
    }

    #[test]
    fn alias_collisions_get_suffixes() {
        let taken = vec!["employees".to_string(), "employees_2".to_string()];
        assert_eq!(unique_alias("employees", &taken), "employees_3");
        assert_eq!(unique_alias("posts", &taken), "posts");
    }
}
