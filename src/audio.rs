//! Sound cues.
//!
//! Games describe sounds as short synthesized tones; a sink plays them. A game
//! may also name a looping background `Melody`. When no audio backend is
//! available the engine runs with `Silence`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Square,
    Sine,
    Sawtooth,
    Triangle,
}

/// A single oscillator blip with a decaying envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    /// Seconds
    pub duration: f32,
    pub waveform: Waveform,
}

impl Tone {
    pub const fn new(frequency: f32, duration: f32, waveform: Waveform) -> Self {
        Self {
            frequency,
            duration,
            waveform,
        }
    }
}

/// Music volume used until the host sets one.
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.3;

/// One note of a background melody.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub frequency: f32,
    /// Seconds
    pub duration: f32,
}

const fn note(frequency: f32, duration: f32) -> Note {
    Note { frequency, duration }
}

const CRYPTO: [Note; 7] = [
    note(220.0, 0.5),
    note(277.0, 0.5),
    note(330.0, 0.5),
    note(440.0, 0.5),
    note(330.0, 0.5),
    note(277.0, 0.5),
    note(220.0, 1.0),
];

const BITCOIN: [Note; 7] = [
    note(261.0, 0.5),
    note(329.0, 0.5),
    note(392.0, 0.5),
    note(523.0, 0.5),
    note(392.0, 0.5),
    note(329.0, 0.5),
    note(261.0, 1.0),
];

const DEFI: [Note; 7] = [
    note(246.0, 0.5),
    note(311.0, 0.5),
    note(369.0, 0.5),
    note(493.0, 0.5),
    note(369.0, 0.5),
    note(311.0, 0.5),
    note(246.0, 1.0),
];

/// Background loops. Each is an arpeggio up and back down its root chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Melody {
    /// A major
    Crypto,
    /// C major
    Bitcoin,
    /// B major
    Defi,
}

impl Melody {
    pub fn notes(&self) -> &'static [Note] {
        match self {
            Melody::Crypto => &CRYPTO,
            Melody::Bitcoin => &BITCOIN,
            Melody::Defi => &DEFI,
        }
    }

    /// Length of one pass through the melody in seconds.
    pub fn loop_seconds(&self) -> f32 {
        self.notes().iter().map(|n| n.duration).sum()
    }
}

pub trait AudioSink {
    fn play(&mut self, tone: Tone);

    /// Loop `melody` until `stop_music`. A melody already playing is replaced.
    fn start_music(&mut self, _melody: Melody) {}

    fn stop_music(&mut self) {}

    /// Music volume, clamped to `0.0..=1.0`.
    fn set_volume(&mut self, _volume: f32) {}
}

/// Sink used when audio is unavailable or disabled.
#[derive(Debug, Default)]
pub struct Silence;

impl AudioSink for Silence {
    fn play(&mut self, _tone: Tone) {}
}

#[cfg(target_arch = "wasm32")]
pub use web::{browser_audio, WebAudio};

#[cfg(target_arch = "wasm32")]
mod web {
    use super::{AudioSink, Melody, Silence, Tone, Waveform, DEFAULT_MUSIC_VOLUME};
    use crate::error::{GameError, RenderError};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{AudioContext, AudioContextState, GainNode, OscillatorNode, OscillatorType};

    const GAIN: f32 = 0.1;
    const NOTE_ATTACK: f64 = 0.05;

    /// Background loop state shared with the timeout that schedules the next pass.
    struct MusicBus {
        ctx: AudioContext,
        gain: GainNode,
        /// Generation of the loop that may keep playing; `None` when stopped.
        active: Cell<Option<u64>>,
        voices: RefCell<Vec<OscillatorNode>>,
    }

    impl MusicBus {
        fn silence_voices(&self) {
            for voice in self.voices.borrow_mut().drain(..) {
                voice.stop().ok();
            }
        }

        fn schedule_note(&self, frequency: f32, start: f64, end: f64) -> Option<OscillatorNode> {
            let osc = self.ctx.create_oscillator().ok()?;
            let envelope = self.ctx.create_gain().ok()?;
            osc.set_type(OscillatorType::Sine);
            osc.connect_with_audio_node(&envelope).ok()?;
            envelope.connect_with_audio_node(&self.gain).ok()?;

            osc.frequency().set_value_at_time(frequency, start).ok();
            envelope.gain().set_value_at_time(0.0, start).ok();
            envelope
                .gain()
                .linear_ramp_to_value_at_time(1.0, start + NOTE_ATTACK)
                .ok();
            envelope.gain().linear_ramp_to_value_at_time(0.0, end).ok();
            osc.start_with_when(start).ok()?;
            osc.stop_with_when(end).ok()?;
            Some(osc)
        }
    }

    /// Queue one pass of `melody`, then a timeout that queues the next one.
    fn play_pass(bus: Rc<MusicBus>, melody: Melody, generation: u64) {
        if bus.active.get() != Some(generation) {
            return;
        }

        let mut at = bus.ctx.current_time();
        let mut voices = Vec::with_capacity(melody.notes().len());
        for note in melody.notes() {
            let end = at + note.duration as f64;
            if let Some(osc) = bus.schedule_note(note.frequency, at, end) {
                voices.push(osc);
            }
            at = end;
        }
        *bus.voices.borrow_mut() = voices;

        let Some(window) = web_sys::window() else {
            return;
        };
        let next = bus.clone();
        let callback = Closure::once_into_js(move || play_pass(next, melody, generation));
        let delay = (melody.loop_seconds() * 1000.0) as i32;
        if let Err(e) =
            window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
        {
            log::warn!("could not schedule background music: {:?}", e);
        }
    }

    pub struct WebAudio {
        ctx: AudioContext,
        music: Rc<MusicBus>,
        generation: u64,
    }

    impl WebAudio {
        pub fn new() -> Result<Self, GameError> {
            let backend = |e: JsValue| RenderError::Backend(format!("AudioContext: {:?}", e));
            let ctx = AudioContext::new().map_err(backend)?;
            let gain = ctx.create_gain().map_err(backend)?;
            gain.connect_with_audio_node(&ctx.destination()).map_err(backend)?;
            gain.gain().set_value(DEFAULT_MUSIC_VOLUME);

            let music = Rc::new(MusicBus {
                ctx: ctx.clone(),
                gain,
                active: Cell::new(None),
                voices: RefCell::new(Vec::new()),
            });
            Ok(Self {
                ctx,
                music,
                generation: 0,
            })
        }

        fn oscillator_type(waveform: Waveform) -> OscillatorType {
            match waveform {
                Waveform::Square => OscillatorType::Square,
                Waveform::Sine => OscillatorType::Sine,
                Waveform::Sawtooth => OscillatorType::Sawtooth,
                Waveform::Triangle => OscillatorType::Triangle,
            }
        }

        // Browsers keep the context suspended until a user gesture.
        fn wake(&self) {
            if self.ctx.state() == AudioContextState::Suspended {
                let _ = self.ctx.resume();
            }
        }
    }

    impl AudioSink for WebAudio {
        fn play(&mut self, tone: Tone) {
            self.wake();

            let (Ok(osc), Ok(gain)) = (self.ctx.create_oscillator(), self.ctx.create_gain()) else {
                return;
            };
            osc.set_type(Self::oscillator_type(tone.waveform));
            if osc.connect_with_audio_node(&gain).is_err()
                || gain.connect_with_audio_node(&self.ctx.destination()).is_err()
            {
                return;
            }

            let t = self.ctx.current_time();
            let end = t + tone.duration as f64;
            osc.frequency().set_value_at_time(tone.frequency, t).ok();
            gain.gain().set_value_at_time(GAIN, t).ok();
            gain.gain().exponential_ramp_to_value_at_time(0.01, end).ok();
            osc.start().ok();
            osc.stop_with_when(end).ok();
        }

        fn start_music(&mut self, melody: Melody) {
            self.stop_music();
            self.wake();
            self.generation += 1;
            self.music.active.set(Some(self.generation));
            log::debug!("music: looping {:?}", melody);
            play_pass(self.music.clone(), melody, self.generation);
        }

        fn stop_music(&mut self) {
            // A pending timeout sees the cleared generation and ends the loop.
            self.music.active.set(None);
            self.music.silence_voices();
        }

        fn set_volume(&mut self, volume: f32) {
            self.music.gain.gain().set_value(volume.clamp(0.0, 1.0));
        }
    }

    /// Web Audio when the browser allows it, silence otherwise.
    pub fn browser_audio() -> Box<dyn AudioSink> {
        match WebAudio::new() {
            Ok(audio) => Box::new(audio),
            Err(e) => {
                log::warn!("Audio not available, continuing without sound: {}", e);
                Box::new(Silence)
            }
        }
    }
}
