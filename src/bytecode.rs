use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::flags::{FlagStore, Value};

/// One executable unit. Branching instructions carry indices resolved when
/// the script was parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Instruction {
    ShowDialogue(String),
    SetSpeaker(Option<String>),
    SetBackground(String),
    ClearBackground,
    PlayAudio(String),
    StopAudio,
    SetFlag(String, Value),
    If(Condition, usize),       // jump to the else body (or past endif) when false
    Else(usize),                // end of the true branch, jump past endif
    EndIf,
    BeginChoices(Vec<usize>),   // indices of the block's own Choice instructions
    Choice(String, usize),      // label, first instruction of its body
    EndChoices,
    SetAvatar(String, String),
    SetAvatarPos(String, String),
    ExitAvatar(String),
    SceneMarker(String),
    Goto(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// Set and truthy.
    Truthy(String),
    Equals(String, Value),
    NotEquals(String, Value),
}

impl Condition {
    /// An unset flag equals no literal.
    pub fn evaluate(&self, flags: &FlagStore) -> bool {
        match self {
            Condition::Truthy(name) => flags.get(name).is_some_and(Value::is_truthy),
            Condition::Equals(name, value) => flags.get(name) == Some(value),
            Condition::NotEquals(name, value) => flags.get(name) != Some(value),
        }
    }

    pub fn flag(&self) -> &str {
        match self {
            Condition::Truthy(name) | Condition::Equals(name, _) | Condition::NotEquals(name, _) => name,
        }
    }
}

/// A parsed script. Immutable once built by the parser.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Program {
    pub(crate) source: PathBuf,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) scenes: BTreeMap<String, usize>,
}

impl Program {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            instructions: Vec::new(),
            scenes: BTreeMap::new(),
        }
    }

    pub(crate) fn push(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Index of the marker for scene `id`.
    pub fn scene(&self, id: &str) -> Option<usize> {
        self.scenes.get(id).copied()
    }

    pub fn scenes(&self) -> impl Iterator<Item = (&str, usize)> {
        self.scenes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn source(&self) -> &std::path::Path {
        &self.source
    }

    /// Every branch target stored in the program.
    pub fn targets(&self) -> impl Iterator<Item = usize> + '_ {
        self.instructions.iter().flat_map(|instruction| match instruction {
            Instruction::If(_, target)
            | Instruction::Else(target)
            | Instruction::Choice(_, target)
            | Instruction::Goto(target) => vec![*target],
            Instruction::BeginChoices(choices) => choices.clone(),
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flag_equals_no_literal() {
        let flags = FlagStore::new();
        assert!(!Condition::Equals("x".into(), Value::Int(0)).evaluate(&flags));
        assert!(!Condition::Equals("x".into(), Value::Str(String::new())).evaluate(&flags));
        assert!(Condition::NotEquals("x".into(), Value::Int(0)).evaluate(&flags));
        assert!(!Condition::Truthy("x".into()).evaluate(&flags));
    }

    #[test]
    fn comparisons_are_type_strict() {
        let mut flags = FlagStore::new();
        flags.set("x", Value::Int(1));
        assert!(Condition::Equals("x".into(), Value::Int(1)).evaluate(&flags));
        assert!(!Condition::Equals("x".into(), Value::Str("1".into())).evaluate(&flags));
        assert!(Condition::Truthy("x".into()).evaluate(&flags));
    }
}
