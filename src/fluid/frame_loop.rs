//! Frame loop: poll events, step, draw, wait.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use bevy::prelude::*;

use super::engine::PhysicsEngine;
use super::render::{RenderAdapter, Surface};
use super::simulation::Simulation;

/// Lifecycle of the loop. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopState {
    #[default]
    Running,
    Stopped,
}

/// Events the loop reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopEvent {
    /// Window closed or application asked to exit.
    Quit,
    /// Anything else, ignored.
    Other,
}

/// Where the loop gets its events from.
pub trait EventSource {
    /// Next pending event, `None` once the queue is drained.
    fn poll(&mut self) -> Option<LoopEvent>;
}

/// Queue of events pushed by the host.
#[derive(Clone, Debug, Default)]
pub struct PendingEvents {
    queue: VecDeque<LoopEvent>,
}

impl PendingEvents {
    pub fn push(&mut self, event: LoopEvent) {
        self.queue.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl EventSource for PendingEvents {
    fn poll(&mut self) -> Option<LoopEvent> {
        self.queue.pop_front()
    }
}

/// Asks to quit once a fixed number of frames has been polled. Used for
/// headless runs.
#[derive(Clone, Copy, Debug)]
pub struct FrameBudget {
    remaining: u64,
    quit_sent: bool,
}

impl FrameBudget {
    pub fn new(frames: u64) -> Self {
        Self {
            remaining: frames,
            quit_sent: false,
        }
    }
}

impl EventSource for FrameBudget {
    // A frame that is not quitting polls exactly once.
    fn poll(&mut self) -> Option<LoopEvent> {
        if self.remaining > 0 {
            self.remaining -= 1;
            None
        } else if !self.quit_sent {
            self.quit_sent = true;
            Some(LoopEvent::Quit)
        } else {
            None
        }
    }
}

/// Drives the simulation one visual frame at a time.
#[derive(Clone, Debug)]
pub struct FrameLoop {
    state: LoopState,
    frame_interval: Duration,
    frames: u64,
}

impl FrameLoop {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            state: LoopState::Running,
            frame_interval,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Frames that stepped.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// One iteration: drain events, step, draw and present.
    ///
    /// A quit request skips the step, the last frame is still drawn.
    pub fn run_frame<E, S, Ev>(
        &mut self,
        events: &mut Ev,
        simulation: &mut Simulation<E>,
        renderer: &RenderAdapter,
        surface: &mut S,
    ) -> LoopState
    where
        E: PhysicsEngine,
        S: Surface,
        Ev: EventSource,
    {
        if self.state == LoopState::Stopped {
            return self.state;
        }

        while let Some(event) = events.poll() {
            if event == LoopEvent::Quit {
                self.state = LoopState::Stopped;
            }
        }
        if self.state == LoopState::Stopped {
            info!("Quit requested after {} frames", self.frames);
        } else {
            simulation.step();
            self.frames += 1;
            debug!("Frame {} ({} particles)", self.frames, simulation.particle_count());
        }
        renderer.draw(simulation, surface);

        self.state
    }

    /// Run frames until stopped, sleeping a fixed delay between them.
    /// Returns the number of frames run.
    pub fn run<E, S, Ev>(
        &mut self,
        events: &mut Ev,
        simulation: &mut Simulation<E>,
        renderer: &RenderAdapter,
        surface: &mut S,
    ) -> u64
    where
        E: PhysicsEngine,
        S: Surface,
        Ev: EventSource,
    {
        let start = self.frames;
        while self.run_frame(events, simulation, renderer, surface) == LoopState::Running {
            thread::sleep(self.frame_interval);
        }
        self.frames - start
    }
}
