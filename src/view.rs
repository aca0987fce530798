use std::cell::RefCell;
use std::rc::Rc;

use crate::command::Effect;

/// Shared handle to the presentation layer. The host keeps one clone, the
/// runtime and every command it emits hold others.
pub type ViewHandle<V> = Rc<RefCell<V>>;

/// Capabilities the runtime needs from the presentation layer.
pub trait View {
    fn display_dialogue(&mut self, text: &str);
    fn set_speaker(&mut self, speaker: Option<&str>);
    fn set_background(&mut self, path: &str);
    fn clear_background(&mut self);
    fn play_audio(&mut self, path: &str);
    fn stop_audio(&mut self);
    fn display_choices(&mut self, labels: &[String]);
    fn set_avatar(&mut self, name: &str, path: &str);
    fn set_avatar_pos(&mut self, name: &str, pos: &str);
    fn exit_avatar(&mut self, name: &str);

    /// Applies the ambient effects replayed by a context jump. Views that
    /// animate transitions can override this to apply them all at once.
    fn restore_context(&mut self, effects: &[Effect]) {
        for effect in effects {
            effect.apply(self);
        }
    }
}
