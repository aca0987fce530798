use std::collections::HashMap;

use crate::command::Effect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub name: String,
    pub path: Option<String>,
    pub pos: Option<String>,
}

/// Presentation state that persists across lines: who is speaking, what is
/// behind them, what is playing and who is on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientState {
    pub speaker: Option<String>,
    pub background: Option<String>,
    pub audio: Option<String>,
    /// In order of first appearance.
    pub avatars: Vec<Avatar>,
}

impl AmbientState {
    /// Folds an effect into the state. Non-ambient effects are ignored.
    pub fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::SetSpeaker(speaker) => self.speaker = speaker.clone(),
            Effect::SetBackground(path) => self.background = Some(path.clone()),
            Effect::ClearBackground => self.background = None,
            Effect::PlayAudio(path) => self.audio = Some(path.clone()),
            Effect::StopAudio => self.audio = None,
            Effect::SetAvatar(name, path) => self.avatar_mut(name).path = Some(path.clone()),
            Effect::SetAvatarPos(name, pos) => self.avatar_mut(name).pos = Some(pos.clone()),
            Effect::ExitAvatar(name) => self.avatars.retain(|a| &a.name != name),
            Effect::ShowDialogue(_) | Effect::ShowChoices(_) => {}
        }
    }

    fn avatar_mut(&mut self, name: &str) -> &mut Avatar {
        let index = match self.avatars.iter().position(|a| a.name == name) {
            Some(index) => index,
            None => {
                self.avatars.push(Avatar {
                    name: name.to_string(),
                    path: None,
                    pos: None,
                });
                self.avatars.len() - 1
            }
        };
        &mut self.avatars[index]
    }

    pub fn avatar(&self, name: &str) -> Option<&Avatar> {
        self.avatars.iter().find(|a| a.name == name)
    }

    /// Effects that rebuild this state on a view: background, audio, speaker,
    /// then each avatar's image and position.
    pub fn restoration(&self) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(3 + self.avatars.len() * 2);

        effects.push(match &self.background {
            Some(path) => Effect::SetBackground(path.clone()),
            None => Effect::ClearBackground,
        });
        effects.push(match &self.audio {
            Some(path) => Effect::PlayAudio(path.clone()),
            None => Effect::StopAudio,
        });
        effects.push(Effect::SetSpeaker(self.speaker.clone()));

        for avatar in &self.avatars {
            if let Some(path) = &avatar.path {
                effects.push(Effect::SetAvatar(avatar.name.clone(), path.clone()));
            }
            if let Some(pos) = &avatar.pos {
                effects.push(Effect::SetAvatarPos(avatar.name.clone(), pos.clone()));
            }
        }

        effects
    }

    /// Exits for avatars present now that `target` cannot rebuild on top of:
    /// absent there, or holding an image or position that `target` lacks.
    /// `restoration()` of `target` brings the survivors back.
    pub fn departures(&self, target: &AmbientState) -> Vec<Effect> {
        self.avatars
            .iter()
            .filter(|a| match target.avatar(&a.name) {
                None => true,
                Some(t) => (a.path.is_some() && t.path.is_none()) || (a.pos.is_some() && t.pos.is_none()),
            })
            .map(|a| Effect::ExitAvatar(a.name.clone()))
            .collect()
    }
}

/// Ambient state captured when the runtime landed on `landing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub landing: usize,
    pub state: AmbientState,
}

/// Record of landing points in the order they were first reached, indexed by
/// zero-based visit number. A landing is recorded once; replays after a jump
/// and passes around a loop reuse its visit.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    snapshots: Vec<ContextSnapshot>,
    visits: HashMap<usize, usize>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the visit number of `landing`, recording it with `state` when
    /// it has not been reached before.
    pub fn record(&mut self, landing: usize, state: &AmbientState) -> usize {
        let snapshots = &mut self.snapshots;
        *self.visits.entry(landing).or_insert_with(|| {
            snapshots.push(ContextSnapshot {
                landing,
                state: state.clone(),
            });
            snapshots.len() - 1
        })
    }

    pub fn visit_of(&self, landing: usize) -> Option<usize> {
        self.visits.get(&landing).copied()
    }

    pub fn get(&self, visit: usize) -> Option<&ContextSnapshot> {
        self.snapshots.get(visit)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.visits.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dialogue_does_not_change_state() {
        let mut state = AmbientState::default();
        state.apply(&Effect::ShowDialogue("hi".into()));
        state.apply(&Effect::ShowChoices(vec!["a".into()]));
        assert_eq!(state, AmbientState::default());
    }

    #[test]
    fn restoration_order() {
        let mut state = AmbientState::default();
        for effect in [
            Effect::SetAvatar("Dort".into(), "dort.png".into()),
            Effect::PlayAudio("theme.ogg".into()),
            Effect::SetSpeaker(Some("Floyd".into())),
            Effect::SetAvatar("Floyd".into(), "floyd.png".into()),
            Effect::SetAvatarPos("Dort".into(), "left".into()),
            Effect::SetBackground("room.png".into()),
        ] {
            state.apply(&effect);
        }

        assert_eq!(
            state.restoration(),
            vec![
                Effect::SetBackground("room.png".into()),
                Effect::PlayAudio("theme.ogg".into()),
                Effect::SetSpeaker(Some("Floyd".into())),
                Effect::SetAvatar("Dort".into(), "dort.png".into()),
                Effect::SetAvatarPos("Dort".into(), "left".into()),
                Effect::SetAvatar("Floyd".into(), "floyd.png".into()),
            ]
        );
    }

    #[test]
    fn empty_state_restores_cleared_view() {
        assert_eq!(
            AmbientState::default().restoration(),
            vec![Effect::ClearBackground, Effect::StopAudio, Effect::SetSpeaker(None)]
        );
    }

    #[test]
    fn exit_removes_avatar_and_departures_list_extras() {
        let mut earlier = AmbientState::default();
        earlier.apply(&Effect::SetAvatar("Floyd".into(), "f.png".into()));

        let mut now = earlier.clone();
        now.apply(&Effect::SetAvatar("Dort".into(), "d.png".into()));
        assert_eq!(now.departures(&earlier), vec![Effect::ExitAvatar("Dort".into())]);

        now.apply(&Effect::ExitAvatar("Dort".into()));
        assert_eq!(now, earlier);
    }

    #[test]
    fn later_image_or_position_forces_a_fresh_entrance() {
        let mut earlier = AmbientState::default();
        earlier.apply(&Effect::SetAvatar("Floyd".into(), "f.png".into()));
        earlier.apply(&Effect::SetAvatarPos("Dort".into(), "left".into()));

        let mut now = earlier.clone();
        now.apply(&Effect::SetAvatarPos("Floyd".into(), "right".into()));
        now.apply(&Effect::SetAvatar("Dort".into(), "d.png".into()));
        assert_eq!(
            now.departures(&earlier),
            vec![Effect::ExitAvatar("Floyd".into()), Effect::ExitAvatar("Dort".into())]
        );

        // A changed value that the target also holds is simply overwritten.
        let mut moved = earlier.clone();
        moved.apply(&Effect::SetAvatar("Floyd".into(), "g.png".into()));
        assert!(moved.departures(&earlier).is_empty());
    }

    #[test]
    fn visits_are_numbered_from_zero() {
        let mut stack = ContextStack::new();
        let state = AmbientState::default();
        assert_eq!(stack.record(4, &state), 0);
        assert_eq!(stack.record(9, &state), 1);
        assert_eq!(stack.get(1).map(|s| s.landing), Some(9));
        assert!(stack.get(2).is_none());
    }

    #[test]
    fn landing_is_recorded_once() {
        let mut stack = ContextStack::new();
        let mut state = AmbientState::default();
        assert_eq!(stack.record(4, &state), 0);
        state.apply(&Effect::SetBackground("later.png".into()));
        assert_eq!(stack.record(4, &state), 0);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.get(0).map(|s| s.state.background.clone()), Some(None));
        assert_eq!(stack.visit_of(4), Some(0));

        stack.clear();
        assert_eq!(stack.visit_of(4), None);
        assert_eq!(stack.record(7, &state), 0);
    }
}
