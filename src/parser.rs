use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bytecode::{Condition, Instruction, Program};
use crate::error::SyntaxError;
use crate::flags::Value;
use crate::lexer::Lexer;
use crate::token::{Kind, Token};

/// Lexes and parses `source` into a program. `path` is only used for
/// error reporting.
pub fn compile(source: &str, path: &Path) -> Result<Program, SyntaxError> {
    let tokens = Lexer::new(source, path).tokenize()?;
    Parser::new(tokens, path).parse()
}

/// A block still waiting for its closing directive.
#[derive(Debug)]
enum Block {
    If {
        open: Token,
        branch: usize,
        else_at: Option<usize>,
    },
    Choice {
        open: Token,
        begin: usize,
        exits: Vec<usize>,
        options: usize,
    },
}

impl Block {
    fn open(&self) -> &Token {
        match self {
            Block::If { open, .. } | Block::Choice { open, .. } => open,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Block::If { .. } => "if",
            Block::Choice { .. } => "choice",
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    file_path: PathBuf,
    program: Program,
    blocks: Vec<Block>,
    gotos: Vec<(usize, Token)>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>, file_name: &Path) -> Self {
        if tokens.last().map_or(true, |t| t.kind != Kind::EOF) {
            let line = tokens.last().map_or(0, |t| t.line);
            tokens.push(Token {
                line,
                position: 0,
                kind: Kind::EOF,
                value: "EndOfFile".to_string(),
            });
        }
        Self {
            tokens,
            current: 0,
            file_path: file_name.to_path_buf(),
            program: Program::new(file_name.to_path_buf()),
            blocks: Vec::new(),
            gotos: Vec::new(),
        }
    }

    fn at(&self) -> &Token {
        // `new` guarantees a trailing EOF.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> Kind {
        self.tokens
            .get(self.current + offset)
            .map_or(Kind::EOF, |t| t.kind)
    }

    fn next_token(&mut self) -> Token {
        let token = self.at().clone();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    fn is_eof(&self) -> bool {
        self.at().kind == Kind::EOF
    }

    fn error(&self, token: &Token, message: String) -> SyntaxError {
        SyntaxError::from_token(self.file_path.clone(), token, message)
    }

    fn eat(&mut self, expecting: Kind, what: &str) -> Result<Token, SyntaxError> {
        if self.at().kind != expecting {
            return Err(self.error(
                self.at(),
                format!("Expecting {} but got {:?}", what, self.at().value),
            ));
        }
        Ok(self.next_token())
    }

    pub fn parse(mut self) -> Result<Program, SyntaxError> {
        loop {
            while self.at().kind == Kind::Newline {
                self.next_token();
            }
            if self.is_eof() {
                break;
            }

            self.parse_line()?;

            match self.at().kind {
                Kind::Newline | Kind::EOF => {}
                _ => {
                    return Err(self.error(
                        self.at(),
                        format!("Unexpected {:?} at end of line", self.at().value),
                    ))
                }
            }
        }

        if let Some(block) = self.blocks.last() {
            return Err(self.error(
                block.open(),
                format!("`{}` block is never closed", block.describe()),
            ));
        }

        self.resolve_gotos()?;

        debug!(
            path = %self.file_path.display(),
            instructions = self.program.len(),
            scenes = self.program.scenes.len(),
            "Parsed script"
        );
        Ok(self.program)
    }

    fn parse_line(&mut self) -> Result<(), SyntaxError> {
        // `Name: "..."` takes priority so a speaker may share a keyword's spelling.
        let kind = self.at().kind;
        if self.peek_kind(1) == Kind::Colon
            && (matches!(kind, Kind::Identifier | Kind::StringLiteral) || kind.is_directive())
        {
            return self.parse_speech();
        }

        match self.at().kind {
            Kind::StringLiteral => {
                self.expect_statement()?;
                let text = self.next_token().value;
                self.emit(Instruction::SetSpeaker(None));
                self.emit(Instruction::ShowDialogue(text));
                Ok(())
            }
            Kind::Scene => self.parse_scene(),
            Kind::Goto => {
                self.expect_statement()?;
                self.next_token();
                let id = self.eat(Kind::Identifier, "scene name")?;
                let index = self.emit(Instruction::Goto(usize::MAX));
                self.gotos.push((index, id));
                Ok(())
            }
            Kind::Set => self.parse_set(),
            Kind::If => self.parse_if(),
            Kind::Else => self.parse_else(),
            Kind::EndIf => self.parse_endif(),
            Kind::Choice => {
                self.expect_statement()?;
                let open = self.next_token();
                let begin = self.emit(Instruction::BeginChoices(Vec::new()));
                self.blocks.push(Block::Choice {
                    open,
                    begin,
                    exits: Vec::new(),
                    options: 0,
                });
                Ok(())
            }
            Kind::Option => self.parse_option(),
            Kind::EndChoice => self.parse_endchoice(),
            Kind::Background => {
                self.expect_statement()?;
                self.next_token();
                if self.at().kind == Kind::StringLiteral {
                    let path = self.next_token().value;
                    self.emit(Instruction::SetBackground(path));
                } else {
                    self.eat_word("clear")?;
                    self.emit(Instruction::ClearBackground);
                }
                Ok(())
            }
            Kind::Audio => {
                self.expect_statement()?;
                self.next_token();
                if self.at().kind == Kind::StringLiteral {
                    let path = self.next_token().value;
                    self.emit(Instruction::PlayAudio(path));
                } else {
                    self.eat_word("stop")?;
                    self.emit(Instruction::StopAudio);
                }
                Ok(())
            }
            Kind::Avatar => self.parse_avatar(),
            _ => {
                let token = self.at().clone();
                Err(self.error(&token, format!("Unknown directive {:?}", token.value)))
            }
        }
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.program.push(instruction)
    }

    /// Anything that executes must sit inside an option once a choice block is open.
    fn expect_statement(&self) -> Result<(), SyntaxError> {
        if let Some(Block::Choice { options: 0, .. }) = self.blocks.last() {
            return Err(self.error(
                self.at(),
                format!("Expecting `option` after `choice` but got {:?}", self.at().value),
            ));
        }
        Ok(())
    }

    fn eat_word(&mut self, word: &str) -> Result<(), SyntaxError> {
        if self.at().kind == Kind::Identifier && self.at().value == word {
            self.next_token();
            Ok(())
        } else {
            Err(self.error(
                self.at(),
                format!("Expecting `{}` but got {:?}", word, self.at().value),
            ))
        }
    }

    fn parse_speech(&mut self) -> Result<(), SyntaxError> {
        self.expect_statement()?;
        let speaker = self.next_token().value;
        self.eat(Kind::Colon, "`:`")?;
        let text = self.eat(Kind::StringLiteral, "quoted dialogue")?.value;
        self.emit(Instruction::SetSpeaker(Some(speaker)));
        self.emit(Instruction::ShowDialogue(text));
        Ok(())
    }

    fn parse_scene(&mut self) -> Result<(), SyntaxError> {
        self.expect_statement()?;
        self.next_token();
        let id = self.eat(Kind::Identifier, "scene name")?;
        if let Some(existing) = self.program.scenes.get(&id.value) {
            return Err(self.error(
                &id,
                format!("Scene {:?} is already declared (instruction {})", id.value, existing),
            ));
        }
        let index = self.emit(Instruction::SceneMarker(id.value.clone()));
        self.program.scenes.insert(id.value, index);
        Ok(())
    }

    fn parse_literal(&mut self) -> Result<Value, SyntaxError> {
        let token = self.next_token();
        match token.kind {
            Kind::StringLiteral => Ok(Value::Str(token.value)),
            Kind::Number => token
                .value
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| self.error(&token, format!("Invalid number {:?}: {}", token.value, e))),
            _ => Err(self.error(
                &token,
                format!("Expecting a number or quoted string but got {:?}", token.value),
            )),
        }
    }

    fn parse_set(&mut self) -> Result<(), SyntaxError> {
        self.expect_statement()?;
        self.next_token();
        let name = self.eat(Kind::Identifier, "flag name")?.value;
        self.eat(Kind::Equals, "`=`")?;
        let value = self.parse_literal()?;
        self.emit(Instruction::SetFlag(name, value));
        Ok(())
    }

    fn parse_if(&mut self) -> Result<(), SyntaxError> {
        self.expect_statement()?;
        let open = self.next_token();
        let name = self.eat(Kind::Identifier, "flag name")?.value;

        let condition = if self.at().kind == Kind::ComparisonOperator {
            let operator = self.next_token();
            let value = self.parse_literal()?;
            if operator.value == "==" {
                Condition::Equals(name, value)
            } else {
                Condition::NotEquals(name, value)
            }
        } else {
            Condition::Truthy(name)
        };

        let branch = self.emit(Instruction::If(condition, usize::MAX));
        self.blocks.push(Block::If {
            open,
            branch,
            else_at: None,
        });
        Ok(())
    }

    fn parse_else(&mut self) -> Result<(), SyntaxError> {
        let token = self.next_token();
        let index = self.program.len();

        match self.blocks.last_mut() {
            Some(Block::If { else_at: Some(_), open, .. }) => {
                let line = open.line + 1;
                Err(self.error(&token, format!("Second `else` for the `if` on line {}", line)))
            }
            Some(Block::If { branch, else_at, .. }) => {
                *else_at = Some(index);
                let branch = *branch;
                self.emit(Instruction::Else(usize::MAX));
                self.patch(branch, index + 1);
                Ok(())
            }
            Some(block) => {
                let message = format!("`else` inside a `{}` block", block.describe());
                Err(self.error(&token, message))
            }
            None => Err(self.error(&token, "`else` without a matching `if`".to_string())),
        }
    }

    fn parse_endif(&mut self) -> Result<(), SyntaxError> {
        let token = self.next_token();
        match self.blocks.pop() {
            Some(Block::If { branch, else_at, .. }) => {
                let index = self.emit(Instruction::EndIf);
                match else_at {
                    Some(else_at) => self.patch(else_at, index + 1),
                    None => self.patch(branch, index + 1),
                }
                Ok(())
            }
            Some(block) => Err(self.error(
                &token,
                format!(
                    "`endif` closes the `{}` block opened on line {}",
                    block.describe(),
                    block.open().line + 1
                ),
            )),
            None => Err(self.error(&token, "`endif` without a matching `if`".to_string())),
        }
    }

    fn parse_option(&mut self) -> Result<(), SyntaxError> {
        let token = self.next_token();
        let Some(Block::Choice { options, .. }) = self.blocks.last() else {
            return Err(self.error(&token, "`option` outside of a `choice` block".to_string()));
        };

        // The previous option's body leaves the block instead of falling into this one.
        let exit = (*options > 0).then(|| self.emit(Instruction::Goto(usize::MAX)));
        let label = self.eat(Kind::StringLiteral, "quoted option label")?.value;
        let index = self.program.len();
        self.emit(Instruction::Choice(label, index + 1));

        if let Some(Block::Choice { begin, exits, options, .. }) = self.blocks.last_mut() {
            exits.extend(exit);
            *options += 1;
            let begin = *begin;
            if let Some(Instruction::BeginChoices(choices)) = self.program.instructions.get_mut(begin) {
                choices.push(index);
            }
        }
        Ok(())
    }

    fn parse_endchoice(&mut self) -> Result<(), SyntaxError> {
        let token = self.next_token();
        match self.blocks.pop() {
            Some(Block::Choice { options: 0, open, .. }) => Err(self.error(
                &token,
                format!("`choice` block opened on line {} has no options", open.line + 1),
            )),
            Some(Block::Choice { exits, .. }) => {
                let index = self.emit(Instruction::EndChoices);
                for exit in exits {
                    self.patch(exit, index + 1);
                }
                Ok(())
            }
            Some(block) => Err(self.error(
                &token,
                format!(
                    "`endchoice` closes the `{}` block opened on line {}",
                    block.describe(),
                    block.open().line + 1
                ),
            )),
            None => Err(self.error(&token, "`endchoice` without a matching `choice`".to_string())),
        }
    }

    fn parse_avatar(&mut self) -> Result<(), SyntaxError> {
        self.expect_statement()?;
        self.next_token();
        let name = match self.at().kind {
            Kind::Identifier | Kind::StringLiteral => self.next_token().value,
            _ => {
                return Err(self.error(
                    self.at(),
                    format!("Expecting avatar name but got {:?}", self.at().value),
                ))
            }
        };

        if self.at().kind == Kind::StringLiteral {
            let path = self.next_token().value;
            self.emit(Instruction::SetAvatar(name, path));
            return Ok(());
        }

        let action = self.eat(Kind::Identifier, "avatar image, `pos` or `exit`")?;
        match action.value.as_str() {
            "pos" => {
                let pos = match self.at().kind {
                    Kind::Identifier | Kind::Number | Kind::StringLiteral => self.next_token().value,
                    _ => {
                        return Err(self.error(
                            self.at(),
                            format!("Expecting avatar position but got {:?}", self.at().value),
                        ))
                    }
                };
                self.emit(Instruction::SetAvatarPos(name, pos));
            }
            "exit" => {
                self.emit(Instruction::ExitAvatar(name));
            }
            other => {
                return Err(self.error(
                    &action,
                    format!("Expecting avatar image, `pos` or `exit` but got {:?}", other),
                ))
            }
        }
        Ok(())
    }

    fn patch(&mut self, index: usize, target: usize) {
        match self.program.instructions.get_mut(index) {
            Some(Instruction::If(_, t))
            | Some(Instruction::Else(t))
            | Some(Instruction::Goto(t)) => *t = target,
            other => debug_assert!(false, "patching non-branch instruction {:?}", other),
        }
    }

    fn resolve_gotos(&mut self) -> Result<(), SyntaxError> {
        for (index, id) in std::mem::take(&mut self.gotos) {
            let Some(target) = self.program.scene(&id.value) else {
                return Err(self.error(&id, format!("`goto` names unknown scene {:?}", id.value)));
            };
            self.patch(index, target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        compile(source, Path::new("test.scn")).unwrap()
    }

    fn parse_err(source: &str) -> SyntaxError {
        compile(source, Path::new("test.scn")).unwrap_err()
    }

    #[test]
    fn narration_and_speech() {
        let program = parse("\"Hello there.\"\nFloyd: \"Alright, now we're talking.\"\n");
        assert_eq!(
            program.instructions(),
            &[
                Instruction::SetSpeaker(None),
                Instruction::ShowDialogue("Hello there.".into()),
                Instruction::SetSpeaker(Some("Floyd".into())),
                Instruction::ShowDialogue("Alright, now we're talking.".into()),
            ]
        );
    }

    #[test]
    fn if_else_targets_are_back_patched() {
        let program = parse(
            "if door == \"open\"\n\"A\"\nelse\n\"B\"\nendif\n\"C\"\n",
        );
        assert_eq!(
            program.instructions(),
            &[
                Instruction::If(Condition::Equals("door".into(), Value::Str("open".into())), 4),
                Instruction::SetSpeaker(None),
                Instruction::ShowDialogue("A".into()),
                Instruction::Else(7),
                Instruction::SetSpeaker(None),
                Instruction::ShowDialogue("B".into()),
                Instruction::EndIf,
                Instruction::SetSpeaker(None),
                Instruction::ShowDialogue("C".into()),
            ]
        );
    }

    #[test]
    fn if_without_else_skips_past_endif() {
        let program = parse("if seen\nset seen = 0\nendif");
        assert_eq!(
            program.instructions(),
            &[
                Instruction::If(Condition::Truthy("seen".into()), 3),
                Instruction::SetFlag("seen".into(), Value::Int(0)),
                Instruction::EndIf,
            ]
        );
    }

    #[test]
    fn choice_block_layout() {
        let program = parse(
            "choice\noption \"One\"\n\"1\"\noption \"Two\"\noption \"Three\"\n\"3\"\nendchoice\n",
        );
        assert_eq!(
            program.instructions(),
            &[
                Instruction::BeginChoices(vec![1, 5, 7]),
                Instruction::Choice("One".into(), 2),
                Instruction::SetSpeaker(None),
                Instruction::ShowDialogue("1".into()),
                Instruction::Goto(11),
                Instruction::Choice("Two".into(), 6),
                Instruction::Goto(11),
                Instruction::Choice("Three".into(), 8),
                Instruction::SetSpeaker(None),
                Instruction::ShowDialogue("3".into()),
                Instruction::EndChoices,
            ]
        );
    }

    #[test]
    fn nested_choice_collects_only_its_own_options() {
        let program = parse(
            "choice\noption \"A\"\nchoice\noption \"A1\"\noption \"A2\"\nendchoice\noption \"B\"\nendchoice",
        );
        match &program.instructions()[0] {
            Instruction::BeginChoices(choices) => {
                let labels: Vec<_> = choices
                    .iter()
                    .map(|&i| match &program.instructions()[i] {
                        Instruction::Choice(label, _) => label.as_str(),
                        other => panic!("expected choice, got {:?}", other),
                    })
                    .collect();
                assert_eq!(labels, vec!["A", "B"]);
            }
            other => panic!("expected BeginChoices, got {:?}", other),
        }
    }

    #[test]
    fn forward_goto_resolves_to_scene_marker() {
        let program = parse("goto ending\n\"skipped\"\nscene ending\n\"end\"");
        assert_eq!(program.instructions()[0], Instruction::Goto(3));
        assert_eq!(program.scene("ending"), Some(3));
    }

    #[test]
    fn all_targets_are_in_bounds() {
        let program = parse(
            "scene start\nif a\nchoice\noption \"x\"\nif b != 2\n\"y\"\nendif\noption \"z\"\ngoto start\nendchoice\nendif",
        );
        assert!(program.targets().all(|t| t <= program.len()));
    }

    #[test]
    fn avatar_directives() {
        let program = parse("avatar Floyd \"floyd.png\"\navatar Floyd pos left\navatar Floyd pos 3\navatar Floyd exit");
        assert_eq!(
            program.instructions(),
            &[
                Instruction::SetAvatar("Floyd".into(), "floyd.png".into()),
                Instruction::SetAvatarPos("Floyd".into(), "left".into()),
                Instruction::SetAvatarPos("Floyd".into(), "3".into()),
                Instruction::ExitAvatar("Floyd".into()),
            ]
        );
    }

    #[test]
    fn background_and_audio() {
        let program = parse("bg \"room.png\"\nbg clear\naudio \"theme.ogg\"\naudio stop");
        assert_eq!(
            program.instructions(),
            &[
                Instruction::SetBackground("room.png".into()),
                Instruction::ClearBackground,
                Instruction::PlayAudio("theme.ogg".into()),
                Instruction::StopAudio,
            ]
        );
    }

    #[test]
    fn unbalanced_blocks_cite_lines() {
        assert_eq!(parse_err("\"a\"\nendif").line(), 2);
        assert_eq!(parse_err("\"a\"\nelse").line(), 2);
        assert_eq!(parse_err("if a\n\"a\"\n").line(), 1);
        assert_eq!(parse_err("if a\nelse\nelse\nendif").line(), 3);
        assert_eq!(parse_err("choice\noption \"a\"\nendif").line(), 3);
        assert_eq!(parse_err("if a\nendchoice").line(), 2);
        assert_eq!(parse_err("option \"a\"").line(), 1);
    }

    #[test]
    fn choice_requires_options() {
        let err = parse_err("choice\nendchoice");
        assert_eq!(err.line(), 2);
        assert!(err.message().contains("no options"));

        let err = parse_err("choice\n\"stray\"\noption \"a\"\nendchoice");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn unknown_directive() {
        let err = parse_err("\"fine\"\nteleport home");
        assert_eq!(err.line(), 2);
        assert!(err.message().contains("Unknown directive"));
    }

    #[test]
    fn scene_errors() {
        let err = parse_err("scene a\nscene a");
        assert_eq!(err.line(), 2);
        let err = parse_err("goto nowhere");
        assert_eq!(err.line(), 1);
        assert!(err.message().contains("unknown scene"));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert_eq!(parse_err("set a = 1 2").line(), 1);
    }
}
