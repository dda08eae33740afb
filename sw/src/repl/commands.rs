//! Editor command parsing

use std::path::PathBuf;

use crate::domain::{Sequence, StepId, StepPatch};

/// Step reference typed by the user: a 1-based position or an id (prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRef {
    Position(usize),
    Id(String),
}

impl StepRef {
    pub fn parse(token: &str) -> Self {
        match token.parse::<usize>() {
            Ok(n) => StepRef::Position(n),
            Err(_) => StepRef::Id(token.to_string()),
        }
    }

    /// Resolve against a sequence
    pub fn resolve(&self, sequence: &Sequence) -> Result<StepId, String> {
        match self {
            StepRef::Position(n) => {
                if *n == 0 || *n > sequence.len() {
                    return Err(format!("no step at position {} (1-{})", n, sequence.len()));
                }
                Ok(sequence[n - 1].id.clone())
            }
            StepRef::Id(reference) => match sequence.resolve(reference) {
                Ok(Some(id)) => Ok(id),
                Ok(None) => Err(format!("no step matches '{}'", reference)),
                Err(candidates) => {
                    let names: Vec<String> = candidates.iter().map(|id| id.to_string()).collect();
                    Err(format!("'{}' is ambiguous: {}", reference, names.join(", ")))
                }
            },
        }
    }
}

/// One line of editor input
#[derive(Debug, Clone, PartialEq)]
pub enum EditorInput {
    List,
    Show(StepRef),
    /// 1-based positions
    Move { from: usize, to: usize },
    Delete(StepRef),
    Set { step: StepRef, patch: StepPatch },
    Revise { step: StepRef, prompt: String },
    Retry(StepRef),
    Undo,
    Redo,
    History,
    Reset,
    Approve(Option<PathBuf>),
    Help,
    Quit,
}

fn arg<'a>(parts: &[&'a str], index: usize, usage: &str) -> Result<&'a str, String> {
    parts.get(index).copied().ok_or_else(|| format!("usage: {}", usage))
}

fn position(token: &str) -> Result<usize, String> {
    token
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("'{}' is not a step position", token))
}

/// Parse one input line
pub fn parse(line: &str) -> Result<EditorInput, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&cmd) = parts.first() else {
        return Err("empty command".to_string());
    };
    let rest = |from: usize| parts.get(from..).map(|p| p.join(" ")).unwrap_or_default();

    match cmd.to_lowercase().as_str() {
        "list" | "ls" | "l" => Ok(EditorInput::List),
        "show" | "s" => Ok(EditorInput::Show(StepRef::parse(arg(&parts, 1, "show <step>")?))),
        "move" | "mv" | "m" => {
            let usage = "move <from> <to>";
            Ok(EditorInput::Move {
                from: position(arg(&parts, 1, usage)?)?,
                to: position(arg(&parts, 2, usage)?)?,
            })
        }
        "delete" | "del" | "rm" => Ok(EditorInput::Delete(StepRef::parse(arg(&parts, 1, "delete <step>")?))),
        "set" => {
            let usage = "set <step> <field> <value>";
            let step = StepRef::parse(arg(&parts, 1, usage)?);
            let field = arg(&parts, 2, usage)?;
            let value = rest(3);
            if value.is_empty() {
                return Err(format!("usage: {}", usage));
            }
            let mut patch = StepPatch::default();
            patch.set_field(field, &value)?;
            Ok(EditorInput::Set { step, patch })
        }
        "revise" | "r" => {
            let usage = "revise <step> <instruction>";
            let step = StepRef::parse(arg(&parts, 1, usage)?);
            Ok(EditorInput::Revise { step, prompt: rest(2) })
        }
        "retry" => Ok(EditorInput::Retry(StepRef::parse(arg(&parts, 1, "retry <step>")?))),
        "undo" | "z" => Ok(EditorInput::Undo),
        "redo" | "y" => Ok(EditorInput::Redo),
        "history" | "h" => Ok(EditorInput::History),
        "reset" => Ok(EditorInput::Reset),
        "approve" | "done" => Ok(EditorInput::Approve(parts.get(1).map(PathBuf::from))),
        "help" | "?" => Ok(EditorInput::Help),
        "quit" | "q" | "exit" => Ok(EditorInput::Quit),
        other => Err(format!("unknown command '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Step;

    #[test]
    fn test_parse_move_is_one_based() {
        assert_eq!(parse("move 1 3").unwrap(), EditorInput::Move { from: 1, to: 3 });
        assert!(parse("move 0 3").is_err());
        assert!(parse("move 1").is_err());
    }

    #[test]
    fn test_parse_shortcuts() {
        assert_eq!(parse("z").unwrap(), EditorInput::Undo);
        assert_eq!(parse("y").unwrap(), EditorInput::Redo);
        assert_eq!(parse("Q").unwrap(), EditorInput::Quit);
    }

    #[test]
    fn test_parse_set_joins_value() {
        let input = parse("set 2 title Send a warm welcome").unwrap();
        assert_eq!(
            input,
            EditorInput::Set {
                step: StepRef::Position(2),
                patch: StepPatch::title("Send a warm welcome"),
            }
        );
        assert!(parse("set 2 colour red").is_err());
        assert!(parse("set 2 confidence high").is_err());
    }

    #[test]
    fn test_parse_revise_allows_empty_prompt() {
        // Blank prompts are ignored later, not rejected here
        assert_eq!(
            parse("revise abc").unwrap(),
            EditorInput::Revise {
                step: StepRef::Id("abc".to_string()),
                prompt: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_approve_with_path() {
        assert_eq!(parse("approve").unwrap(), EditorInput::Approve(None));
        assert_eq!(
            parse("approve out.json").unwrap(),
            EditorInput::Approve(Some(PathBuf::from("out.json")))
        );
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn test_step_ref_resolve() {
        let sequence = Sequence::new(vec![Step::new("abc-step-one", "One"), Step::new("abd-step-two", "Two")]);

        assert_eq!(StepRef::Position(2).resolve(&sequence).unwrap(), StepId::from("abd-step-two"));
        assert!(StepRef::Position(3).resolve(&sequence).is_err());
        assert_eq!(
            StepRef::Id("abc".to_string()).resolve(&sequence).unwrap(),
            StepId::from("abc-step-one")
        );
        assert!(StepRef::Id("ab".to_string()).resolve(&sequence).is_err());
    }
}
