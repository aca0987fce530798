use std::fmt;

use serde::Serialize;

use crate::error::RuntimeError;
use crate::view::{View, ViewHandle};

/// Payload of a single observable action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Effect {
    ShowDialogue(String),
    SetSpeaker(Option<String>),
    SetBackground(String),
    ClearBackground,
    PlayAudio(String),
    StopAudio,
    ShowChoices(Vec<String>),
    SetAvatar(String, String),
    SetAvatarPos(String, String),
    ExitAvatar(String),
}

impl Effect {
    /// Ambient effects make up the persistent presentation state; dialogue and
    /// choice prompts advance the story and are never replayed.
    pub fn is_ambient(&self) -> bool {
        !matches!(self, Effect::ShowDialogue(_) | Effect::ShowChoices(_))
    }

    pub fn apply<V: View + ?Sized>(&self, view: &mut V) {
        match self {
            Effect::ShowDialogue(text) => view.display_dialogue(text),
            Effect::SetSpeaker(speaker) => view.set_speaker(speaker.as_deref()),
            Effect::SetBackground(path) => view.set_background(path),
            Effect::ClearBackground => view.clear_background(),
            Effect::PlayAudio(path) => view.play_audio(path),
            Effect::StopAudio => view.stop_audio(),
            Effect::ShowChoices(labels) => view.display_choices(labels),
            Effect::SetAvatar(name, path) => view.set_avatar(name, path),
            Effect::SetAvatarPos(name, pos) => view.set_avatar_pos(name, pos),
            Effect::ExitAvatar(name) => view.exit_avatar(name),
        }
    }
}

/// A deferred effect bound to the view it will act upon. Returned by
/// [`Runtime::step`](crate::runtime::Runtime::step); nothing reaches the view
/// until [`Command::execute`] is called.
pub struct Command<V: View> {
    effect: Effect,
    view: ViewHandle<V>,
}

impl<V: View> Command<V> {
    pub(crate) fn new(effect: Effect, view: ViewHandle<V>) -> Self {
        Self { effect, view }
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Labels offered to the player when this command opens a choice prompt.
    pub fn choices(&self) -> Option<&[String]> {
        match &self.effect {
            Effect::ShowChoices(labels) => Some(labels),
            _ => None,
        }
    }

    /// Applies the effect to the bound view. Fails with `ViewBusy`, leaving
    /// the view untouched, while the host holds a borrow of it.
    pub fn execute(&self) -> Result<(), RuntimeError> {
        let mut view = self.view.try_borrow_mut().map_err(|_| RuntimeError::ViewBusy)?;
        self.effect.apply(&mut *view);
        Ok(())
    }

    pub fn into_effect(self) -> Effect {
        self.effect
    }
}

impl<V: View> fmt::Debug for Command<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Command").field("effect", &self.effect).finish()
    }
}
