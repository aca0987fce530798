use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bytecode::{Instruction, Program};
use crate::command::{Command, Effect};
use crate::context::{AmbientState, ContextStack};
use crate::error::{NmfeError, RuntimeError};
use crate::flags::{FlagStore, Value};
use crate::parser;
use crate::view::{View, ViewHandle};

/// Upper bound on control-only instructions executed by a single `step`.
const MAX_CONTROL_INSTRUCTIONS: usize = 100_000;

/// Name of the flag that receives the last 1-based choice selection.
pub const CHOICE_FLAG: &str = "choice";

/// Where a script comes from.
#[derive(Debug, Clone)]
pub enum ScriptSource {
    Path(PathBuf),
    Text(String),
}

impl From<&Path> for ScriptSource {
    fn from(path: &Path) -> Self {
        ScriptSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ScriptSource {
    fn from(path: PathBuf) -> Self {
        ScriptSource::Path(path)
    }
}

#[derive(Debug)]
struct PendingChoice {
    targets: Vec<usize>,
    selection: Option<usize>,
}

/// Steps a parsed program, emitting one [`Command`] per observable action.
pub struct Runtime<V: View> {
    view: ViewHandle<V>,
    program: Program,
    pc: usize,
    flags: FlagStore,
    contexts: ContextStack,
    ambient: AmbientState,
    pending: Option<PendingChoice>,
}

impl<V: View> Runtime<V> {
    pub fn new(view: ViewHandle<V>) -> Self {
        Self {
            view,
            program: Program::default(),
            pc: 0,
            flags: FlagStore::new(),
            contexts: ContextStack::new(),
            ambient: AmbientState::default(),
            pending: None,
        }
    }

    /// Parses a script and resets all playthrough state.
    pub fn read(&mut self, source: impl Into<ScriptSource>) -> Result<(), NmfeError> {
        let program = match source.into() {
            ScriptSource::Path(path) => {
                let text = fs::read_to_string(&path)?;
                parser::compile(&text, &path)?
            }
            ScriptSource::Text(text) => parser::compile(&text, Path::new("<memory>"))?,
        };
        self.load(program);
        Ok(())
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<(), NmfeError> {
        self.read(path.as_ref())
    }

    pub fn read_str(&mut self, source: &str) -> Result<(), NmfeError> {
        self.read(ScriptSource::Text(source.to_string()))
    }

    /// Installs an already parsed program and resets all playthrough state.
    pub fn load(&mut self, program: Program) {
        debug!(
            source = %program.source().display(),
            instructions = program.len(),
            "Loaded program"
        );
        self.program = program;
        self.pc = 0;
        self.flags.clear();
        self.contexts.clear();
        self.ambient = AmbientState::default();
        self.pending = None;
    }

    /// Runs control instructions until one produces a view effect, and returns
    /// that effect unexecuted.
    pub fn step(&mut self) -> Result<Command<V>, RuntimeError> {
        if let Some(pending) = &self.pending {
            let selection = pending.selection.ok_or(RuntimeError::NoSelectionMade)?;
            let target = pending.targets[selection - 1];
            self.pending = None;
            self.flags.set(CHOICE_FLAG, Value::Int(selection as i64));
            debug!(selection, target, "Resolved choice");
            self.pc = target;
        }

        let mut executed = 0;
        loop {
            let index = self.pc;
            let Some(instruction) = self.program.get(index) else {
                return Err(RuntimeError::EndOfProgram);
            };
            self.pc += 1;

            let effect = match instruction {
                Instruction::ShowDialogue(text) => Some(Effect::ShowDialogue(text.clone())),
                Instruction::SetSpeaker(speaker) => {
                    // Already speaking: nothing for the view to do.
                    (self.ambient.speaker != *speaker).then(|| Effect::SetSpeaker(speaker.clone()))
                }
                Instruction::SetBackground(path) => Some(Effect::SetBackground(path.clone())),
                Instruction::ClearBackground => Some(Effect::ClearBackground),
                Instruction::PlayAudio(path) => Some(Effect::PlayAudio(path.clone())),
                Instruction::StopAudio => Some(Effect::StopAudio),
                Instruction::SetAvatar(name, path) => Some(Effect::SetAvatar(name.clone(), path.clone())),
                Instruction::SetAvatarPos(name, pos) => {
                    Some(Effect::SetAvatarPos(name.clone(), pos.clone()))
                }
                Instruction::ExitAvatar(name) => Some(Effect::ExitAvatar(name.clone())),
                Instruction::BeginChoices(choices) => {
                    let mut labels = Vec::with_capacity(choices.len());
                    let mut targets = Vec::with_capacity(choices.len());
                    for &choice in choices {
                        if let Some(Instruction::Choice(label, target)) = self.program.get(choice) {
                            labels.push(label.clone());
                            targets.push(*target);
                        }
                    }
                    self.pending = Some(PendingChoice {
                        targets,
                        selection: None,
                    });
                    Some(Effect::ShowChoices(labels))
                }
                Instruction::SetFlag(name, value) => {
                    trace!(flag = %name, %value, "Set flag");
                    self.flags.set(name.clone(), value.clone());
                    None
                }
                Instruction::If(condition, else_target) => {
                    if !condition.evaluate(&self.flags) {
                        trace!(flag = condition.flag(), target = else_target, "Condition false");
                        self.pc = *else_target;
                    }
                    None
                }
                Instruction::Else(end_target) => {
                    self.pc = *end_target;
                    None
                }
                Instruction::Goto(target) => {
                    trace!(from = index, to = target, "Goto");
                    self.pc = *target;
                    None
                }
                Instruction::SceneMarker(id) => {
                    trace!(scene = %id, "Entered scene");
                    None
                }
                Instruction::Choice(..) | Instruction::EndChoices | Instruction::EndIf => None,
            };

            if let Some(effect) = effect {
                let visit = self.contexts.record(index, &self.ambient);
                self.ambient.apply(&effect);
                trace!(visit, index, ?effect, "Emitting command");
                return Ok(Command::new(effect, Rc::clone(&self.view)));
            }

            executed += 1;
            if executed >= MAX_CONTROL_INSTRUCTIONS {
                return Err(RuntimeError::RunawayStep(executed));
            }
        }
    }

    /// Records the player's 1-based answer to the prompt returned by the last
    /// `step`. May be called again to change the answer before stepping.
    pub fn select(&mut self, selection: usize) -> Result<(), RuntimeError> {
        let pending = self.pending.as_mut().ok_or(RuntimeError::NoPendingChoice)?;
        let count = pending.targets.len();
        if selection == 0 || selection > count {
            return Err(RuntimeError::InvalidSelection { selection, count });
        }
        pending.selection = Some(selection);
        Ok(())
    }

    /// Whether a choice prompt is waiting for `select`.
    pub fn awaiting_selection(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| p.selection.is_none())
    }

    /// Returns to the point of visit `visit` (zero-based, in the order points
    /// were first reached), replaying its ambient state onto the view. The
    /// landing instruction itself runs on the next `step`. Fails with
    /// `ViewBusy`, changing nothing, while the host holds a borrow of the view.
    pub fn jump_with_context(&mut self, visit: usize) -> Result<(), RuntimeError> {
        let snapshot = self
            .contexts
            .get(visit)
            .cloned()
            .ok_or(RuntimeError::InvalidContext(visit))?;

        let mut effects = self.ambient.departures(&snapshot.state);
        effects.extend(snapshot.state.restoration());
        debug!(visit, landing = snapshot.landing, effects = effects.len(), "Restoring context");
        self.view
            .try_borrow_mut()
            .map_err(|_| RuntimeError::ViewBusy)?
            .restore_context(&effects);

        self.ambient = snapshot.state;
        self.pending = None;
        self.pc = snapshot.landing;
        Ok(())
    }

    pub fn get_flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.has(name)
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.flags.set(name, value.into());
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_counter(&self) -> usize {
        self.pc
    }

    /// Number of distinct landing points recorded so far.
    pub fn visits(&self) -> usize {
        self.contexts.len()
    }

    /// Ambient presentation state as of the last emitted command.
    pub fn ambient(&self) -> &AmbientState {
        &self.ambient
    }

    /// True once no further instruction can produce a command. Does not
    /// execute anything, so a trailing run of control instructions that ends
    /// in a backward `goto` still counts as unfinished.
    pub fn is_finished(&self) -> bool {
        self.pending.is_none() && self.pc >= self.program.len()
    }

    pub fn view(&self) -> &ViewHandle<V> {
        &self.view
    }
}
