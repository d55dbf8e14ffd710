/// A command typed into a message after the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `a <name> <text...>`
    Add {
        name: Option<String>,
        text: Option<String>,
    },
    /// `d <name>`
    Delete { name: Option<String> },
    /// `s <name>`
    Send { name: Option<String> },
    /// `l`
    List,
    Unknown(String),
}

impl Command {
    /// `None` when the content does not start with `prefix` or names no
    /// command. The text of `a` keeps its inner spacing.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let rest = content.strip_prefix(prefix)?;
        let (cmd, rest) = next_word(rest)?;
        let (name, text) = match next_word(rest) {
            Some((name, rest)) => {
                let text = rest.trim_start();
                (
                    Some(name.to_string()),
                    (!text.is_empty()).then(|| text.to_string()),
                )
            }
            None => (None, None),
        };

        Some(match cmd {
            "a" => Command::Add { name, text },
            "d" => Command::Delete { name },
            "s" => Command::Send { name },
            "l" => Command::List,
            other => Command::Unknown(other.to_string()),
        })
    }
}

fn next_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(s.split_at(s.find(char::is_whitespace).unwrap_or(s.len())))
}
