use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nmfe::{Effect, Runtime, View};

#[derive(Debug, Default)]
pub struct MockView {
    pub dialogue: String,
    pub speaker: Option<String>,
    pub background_path: Option<String>,
    pub background_displaying: bool,
    pub audio_path: Option<String>,
    pub audio_playing: bool,
    pub choices: Vec<String>,
    pub avatars: HashMap<String, String>,
    pub avatar_pos: HashMap<String, String>,
    pub restorations: usize,
}

impl View for MockView {
    fn display_dialogue(&mut self, text: &str) {
        self.dialogue = text.to_string();
    }

    fn set_speaker(&mut self, speaker: Option<&str>) {
        self.speaker = speaker.map(str::to_string);
    }

    fn set_background(&mut self, path: &str) {
        self.background_path = Some(path.to_string());
        self.background_displaying = true;
    }

    fn clear_background(&mut self) {
        self.background_displaying = false;
    }

    fn play_audio(&mut self, path: &str) {
        self.audio_path = Some(path.to_string());
        self.audio_playing = true;
    }

    fn stop_audio(&mut self) {
        self.audio_path = None;
        self.audio_playing = false;
    }

    fn display_choices(&mut self, labels: &[String]) {
        self.choices = labels.to_vec();
    }

    fn set_avatar(&mut self, name: &str, path: &str) {
        self.avatars.insert(name.to_string(), path.to_string());
    }

    fn set_avatar_pos(&mut self, name: &str, pos: &str) {
        self.avatar_pos.insert(name.to_string(), pos.to_string());
    }

    fn exit_avatar(&mut self, name: &str) {
        self.avatars.remove(name);
        self.avatar_pos.remove(name);
    }

    fn restore_context(&mut self, effects: &[Effect]) {
        self.restorations += 1;
        for effect in effects {
            effect.apply(self);
        }
    }
}

pub fn setup(source: &str) -> (Rc<RefCell<MockView>>, Runtime<MockView>) {
    let view = Rc::new(RefCell::new(MockView::default()));
    let mut runtime = Runtime::new(Rc::clone(&view));
    runtime.read_str(source).expect("script should parse");
    (view, runtime)
}

pub fn auto_step(runtime: &mut Runtime<MockView>, n: usize) {
    for _ in 0..n {
        runtime.step().expect("step should produce a command").execute().unwrap();
    }
}

/// Steps to the end, executing every command, and returns the dialogue shown.
pub fn run_to_end(runtime: &mut Runtime<MockView>) -> Vec<String> {
    let mut shown = Vec::new();
    loop {
        match runtime.step() {
            Ok(command) => {
                command.execute().unwrap();
                if let Effect::ShowDialogue(text) = command.effect() {
                    shown.push(text.clone());
                }
            }
            Err(nmfe::RuntimeError::EndOfProgram) => return shown,
            Err(e) => panic!("unexpected runtime error: {}", e),
        }
    }
}
