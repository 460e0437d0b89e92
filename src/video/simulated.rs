use super::{MediaCommand, MediaEvent, MediaSample};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

enum Control {
    Command(MediaCommand),
    Scrub(f64),
}

/// Sends commands to a running [`SimulatedMedia`]. The engine stops once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl MediaHandle {
    pub fn send(&self, command: MediaCommand) -> bool {
        self.tx.send(Control::Command(command)).is_ok()
    }

    pub fn send_all(&self, commands: impl IntoIterator<Item = MediaCommand>) {
        for command in commands {
            if !self.send(command) {
                tracing::debug!("Media engine gone, dropping commands");
                return;
            }
        }
    }

    /// Act like the viewer dragging the scrubber.
    pub fn scrub(&self, position_secs: f64) -> bool {
        self.tx.send(Control::Scrub(position_secs)).is_ok()
    }
}

/// Headless stand-in for a media element. Plays the loaded source in real
/// time scaled by `speed`, emitting a time update every `tick`.
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    tick: Duration,
    speed: f64,
}

#[derive(Debug, Default)]
struct Playhead {
    generation: u64,
    duration_secs: f64,
    position_secs: f64,
    loaded: bool,
    playing: bool,
}

impl SimulatedMedia {
    pub fn new(tick: Duration, speed: f64) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
        Self {
            tick: tick.max(Duration::from_millis(1)),
            speed,
        }
    }

    pub fn spawn(self) -> (MediaHandle, mpsc::UnboundedReceiver<MediaSample>) {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Control>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<MediaSample>();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let step = self.tick.as_secs_f64() * self.speed;
            let mut head = Playhead::default();

            tracing::debug!(
                "Simulated media started: tick={:?}, speed={}",
                self.tick,
                self.speed
            );

            loop {
                let events = tokio::select! {
                    control = control_rx.recv() => match control {
                        Some(Control::Command(command)) => head.apply(command),
                        Some(Control::Scrub(position)) => head.scrub(position),
                        None => break,
                    },
                    _ = ticker.tick() => head.advance(step),
                };

                for event in events {
                    if event_tx.send(MediaSample::new(head.generation, event)).is_err() {
                        tracing::debug!("Media event receiver dropped, stopping engine");
                        return;
                    }
                }
            }

            tracing::debug!("Simulated media stopped");
        });

        (MediaHandle { tx: control_tx }, event_rx)
    }
}

impl Playhead {
    fn apply(&mut self, command: MediaCommand) -> Vec<MediaEvent> {
        match command {
            MediaCommand::Load {
                generation,
                source,
                duration_hint_secs,
            } => {
                self.generation = generation;
                self.position_secs = 0.0;
                self.playing = false;

                if !duration_hint_secs.is_finite() || duration_hint_secs <= 0.0 {
                    self.loaded = false;
                    return vec![MediaEvent::Error {
                        message: format!("cannot determine length of {}", source),
                    }];
                }

                self.loaded = true;
                self.duration_secs = duration_hint_secs;
                vec![MediaEvent::LoadedMetadata {
                    duration_secs: duration_hint_secs,
                }]
            }
            MediaCommand::Play => {
                if !self.loaded || self.playing || self.position_secs >= self.duration_secs {
                    return Vec::new();
                }
                self.playing = true;
                vec![MediaEvent::Playing]
            }
            MediaCommand::Pause => {
                if !self.playing {
                    return Vec::new();
                }
                self.playing = false;
                vec![MediaEvent::Pause]
            }
            MediaCommand::Seek { position_secs } => {
                if !self.loaded {
                    return Vec::new();
                }
                self.position_secs = position_secs.clamp(0.0, self.duration_secs);
                vec![MediaEvent::TimeUpdate {
                    position_secs: self.position_secs,
                }]
            }
        }
    }

    fn scrub(&mut self, position_secs: f64) -> Vec<MediaEvent> {
        if !self.loaded {
            return Vec::new();
        }
        self.position_secs = position_secs.clamp(0.0, self.duration_secs);
        vec![MediaEvent::Seeking {
            position_secs: self.position_secs,
        }]
    }

    fn advance(&mut self, step: f64) -> Vec<MediaEvent> {
        if !self.playing {
            return Vec::new();
        }

        self.position_secs += step;
        if self.position_secs < self.duration_secs {
            return vec![MediaEvent::TimeUpdate {
                position_secs: self.position_secs,
            }];
        }

        self.position_secs = self.duration_secs;
        self.playing = false;
        vec![
            MediaEvent::TimeUpdate {
                position_secs: self.duration_secs,
            },
            MediaEvent::Ended,
        ]
    }
}
