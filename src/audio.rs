//! Plays a sound while an alarm rings.
//!
//! The engine only says when to start and stop; decoding and output go to rodio.

use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::{alarm::AlarmId, communication::Event};

pub trait Playback {
    fn start(&mut self, alarm: AlarmId);
    fn stop(&mut self);
}

/// Loops a sound file until stopped.
pub struct SoundPlayback {
    stream: OutputStream,
    sound: PathBuf,
    gain: f32,
    sink: Option<Sink>,
}

impl SoundPlayback {
    /// Opens the default audio output.
    ///
    /// # Errors
    /// If there is no usable output device.
    pub fn open(sound: PathBuf, gain: f32) -> Result<Self, rodio::StreamError> {
        Ok(Self {
            stream: OutputStreamBuilder::open_default_stream()?,
            sound,
            gain,
            sink: None,
        })
    }
}

impl Playback for SoundPlayback {
    fn start(&mut self, alarm: AlarmId) {
        let file = match File::open(&self.sound) {
            Ok(file) => file,
            Err(e) => {
                error!("couldn't open sound file {}: {e}", self.sound.display());
                return;
            }
        };
        let source = match Decoder::new(BufReader::new(file)) {
            Ok(source) => source,
            Err(e) => {
                error!("couldn't decode {}: {e}", self.sound.display());
                return;
            }
        };
        // create sink that repeatedly plays the sound at the configured volume
        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(self.gain);
        sink.append(source.repeat_infinite());
        sink.play();
        info!("playing {} for alarm {alarm}", self.sound.display());
        self.sink = Some(sink);
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

/// Used when no sound is configured or there is no audio device.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayback;

impl Playback for SilentPlayback {
    fn start(&mut self, alarm: AlarmId) {
        info!("alarm {alarm} is ringing (no sound)");
    }

    fn stop(&mut self) {}
}

/// Starts and stops playback as events arrive, until the channel closes.
pub fn play_events(events: &Receiver<Event>, playback: &mut impl Playback) {
    let mut playing = None;
    for event in events {
        match event {
            Event::AlarmTriggered(id) => {
                if playing.is_some() {
                    playback.stop();
                }
                playback.start(id);
                playing = Some(id);
            }
            Event::AlarmStopped(id) if playing == Some(id) => {
                playback.stop();
                playing = None;
            }
            Event::AlarmStopped(id) => debug!("alarm {id} stopped but wasn't playing"),
        }
    }
}

/// Runs the player on its own thread. The audio output is opened on that thread.
///
/// # Errors
/// If the thread couldn't be spawned.
pub fn spawn_player(
    events: Receiver<Event>,
    sound: Option<PathBuf>,
    gain: f32,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("alarm-player".to_string())
        .spawn(move || match sound.map(|sound| SoundPlayback::open(sound, gain)) {
            Some(Ok(mut playback)) => play_events(&events, &mut playback),
            Some(Err(e)) => {
                error!("couldn't open an audio output, alarms will be silent: {e}");
                play_events(&events, &mut SilentPlayback);
            }
            None => play_events(&events, &mut SilentPlayback),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Playback for Recorder {
        fn start(&mut self, alarm: AlarmId) {
            self.0.push(format!("start {alarm}"));
        }

        fn stop(&mut self) {
            self.0.push("stop".to_string());
        }
    }

    fn play(events: &[Event]) -> Vec<String> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        for event in events {
            sender.send(*event).unwrap();
        }
        drop(sender);
        let mut recorder = Recorder::default();
        play_events(&receiver, &mut recorder);
        recorder.0
    }

    #[test]
    fn starts_and_stops_with_the_alarm() {
        assert_eq!(
            play(&[Event::AlarmTriggered(1), Event::AlarmStopped(1)]),
            vec!["start 1", "stop"]
        );
    }

    #[test]
    fn ignores_stops_for_other_alarms() {
        assert_eq!(
            play(&[Event::AlarmStopped(4), Event::AlarmTriggered(1), Event::AlarmStopped(2)]),
            vec!["start 1"]
        );
    }

    #[test]
    fn new_trigger_replaces_the_current_sound() {
        assert_eq!(
            play(&[Event::AlarmTriggered(1), Event::AlarmTriggered(2)]),
            vec!["start 1", "stop", "start 2"]
        );
    }
}
