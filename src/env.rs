//! Exposing cached secrets as environment variables
//!
//! Kept apart from the cache so rendering and applying can be tested
//! without touching the current process's environment.

use tokio::process::Command;

use crate::source::SecretEntry;

/// Variable name a secret is exposed under
pub fn exposed_name(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

/// Whether `name` is a portable shell variable identifier
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Single-quote a value so a POSIX shell reads it back verbatim
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Entries with a usable variable name, paired with that name
fn exportable<'a>(
    entries: &'a [SecretEntry],
    prefix: &'a str,
) -> impl Iterator<Item = (String, &'a SecretEntry)> + 'a {
    entries.iter().filter_map(move |entry| {
        let name = exposed_name(prefix, &entry.key);
        if is_valid_name(&name) {
            Some((name, entry))
        } else {
            log::warn!("Skipping secret '{}': not a valid variable name", name);
            None
        }
    })
}

/// `export NAME='value'` lines for `eval` in a shell
pub fn render_exports(entries: &[SecretEntry], prefix: &str) -> String {
    exportable(entries, prefix)
        .map(|(name, entry)| format!("export {}={}\n", name, shell_quote(&entry.value)))
        .collect()
}

/// Set each secret on a child process's environment.
///
/// Returns how many variables were set.
pub fn apply(entries: &[SecretEntry], prefix: &str, command: &mut Command) -> usize {
    let mut count = 0;
    for (name, entry) in exportable(entries, prefix) {
        command.env(name, &entry.value);
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("DB_URL"));
        assert!(is_valid_name("_private"));
        assert!(is_valid_name("a1"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1ABC"));
        assert!(!is_valid_name("MY-KEY"));
        assert!(!is_valid_name("MY KEY"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME `id` \"x\""), "'$HOME `id` \"x\"'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_render_exports_with_prefix() {
        let entries = vec![
            SecretEntry::new("DB_URL", "postgres://u:p@h/db"),
            SecretEntry::new("bad-name", "x"),
            SecretEntry::new("QUOTE", "a'b"),
        ];

        let rendered = render_exports(&entries, "APP_");
        assert_eq!(
            rendered,
            "export APP_DB_URL='postgres://u:p@h/db'\nexport APP_QUOTE='a'\\''b'\n"
        );
    }

    #[test]
    fn test_render_exports_empty() {
        assert_eq!(render_exports(&[], ""), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exports_survive_shell_reparse() {
        let tricky = "a'b\"c $d `e` \\f\nnext line; rm -rf /";
        let entries = vec![SecretEntry::new("TRICKY", tricky)];
        let script = format!("{}printf '%s' \"$TRICKY\"", render_exports(&entries, ""));

        let output = Command::new("sh")
            .arg("-c")
            .arg(script)
            .output()
            .await
            .unwrap();

        assert_eq!(String::from_utf8(output.stdout).unwrap(), tricky);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_apply_sets_child_env() {
        let entries = vec![
            SecretEntry::new("A", "1"),
            SecretEntry::new("not valid", "2"),
        ];
        let mut command = Command::new("sh");
        command.arg("-c").arg("printf '%s' \"$P_A\"");

        assert_eq!(apply(&entries, "P_", &mut command), 1);
        let output = command.output().await.unwrap();
        assert_eq!(String::from_utf8(output.stdout).unwrap(), "1");
    }
}
