//! Scenario simulation
//!
//! Builds every timer of a scenario on a fresh [`TimerService`], drives the
//! synthetic loop and collects what each timer did.

use crate::config::{Scenario, TimerKind, TimerEntry};
use anyhow::{Context, Result};
use cadence_core::events::{handler, EventKind};
use cadence_core::OptionBag;
use cadence_timer::{
    Animation, AnimationRef, Callback, Queue, TimerPayload, TimerService, TimerValue,
};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

/// What one timer did over the run
#[derive(Debug, Clone, Serialize)]
pub struct TimerReport {
    pub name: String,
    pub kind: &'static str,
    pub fires: u32,
    pub skipped: u32,
    pub ends: u32,
    pub completed: bool,
    pub playing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_value: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub frames: u64,
    pub elapsed_ms: u64,
    pub active: usize,
    pub timers: Vec<TimerReport>,
}

type Reports = Rc<RefCell<Vec<TimerReport>>>;

/// Something timers can be created on
trait Spawner {
    fn spawn(
        &self,
        kind: TimerKind,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> cadence_core::Result<AnimationRef>;

    fn spawn_queue(&self, options: OptionBag) -> Rc<Queue>;
}

macro_rules! impl_spawner {
    ($($ty:ty),+) => {
        $(
            impl Spawner for $ty {
                fn spawn(
                    &self,
                    kind: TimerKind,
                    callback: Callback,
                    duration: f64,
                    options: OptionBag,
                ) -> cadence_core::Result<AnimationRef> {
                    let unit: AnimationRef = match kind {
                        TimerKind::Delay => self.delay(callback, duration, options)?,
                        TimerKind::Repeat => self.repeat(callback, duration, options)?,
                        TimerKind::Transition => self.transition(callback, duration, options)?,
                        TimerKind::Cycle => self.cycle(callback, duration, options)?,
                        TimerKind::Queue => self.queue(options),
                    };
                    Ok(unit)
                }

                fn spawn_queue(&self, options: OptionBag) -> Rc<Queue> {
                    self.queue(options)
                }
            }
        )+
    };
}

impl_spawner!(TimerService, Queue);

/// Timers built from a scenario, with their reports
pub struct Simulation {
    service: TimerService,
    /// Every unit built, queue children included, with its report slot
    units: RefCell<Vec<(usize, AnimationRef)>>,
    reports: Reports,
}

impl Simulation {
    /// Validate the scenario and build every timer
    pub fn build(scenario: &Scenario) -> Result<Self> {
        scenario.validate()?;
        let service = TimerService::new(scenario.driver.timer_config());
        let simulation = Self {
            service,
            units: RefCell::new(Vec::new()),
            reports: Rc::new(RefCell::new(Vec::new())),
        };

        for (index, entry) in scenario.timers.iter().enumerate() {
            simulation.build_unit(&simulation.service, entry, entry.label(index))?;
        }
        Ok(simulation)
    }

    /// Number of timers built, queue children included
    pub fn timer_count(&self) -> usize {
        self.reports.borrow().len()
    }

    fn build_unit(
        &self,
        spawner: &dyn Spawner,
        entry: &TimerEntry,
        label: String,
    ) -> Result<AnimationRef> {
        let slot = {
            let mut reports = self.reports.borrow_mut();
            reports.push(TimerReport {
                name: label.clone(),
                kind: entry.kind.name(),
                fires: 0,
                skipped: 0,
                ends: 0,
                completed: false,
                playing: false,
                last_value: None,
            });
            reports.len() - 1
        };

        let unit: AnimationRef = if entry.kind == TimerKind::Queue {
            let queue = spawner.spawn_queue(entry.options());
            for (index, step) in entry.steps.iter().enumerate() {
                let child_label = format!("{label}/{}", step.label(index));
                self.build_unit(&*queue, step, child_label)?;
            }
            queue as AnimationRef
        } else {
            let duration = entry
                .duration
                .millis()
                .with_context(|| format!("Invalid duration for `{label}`"))?;
            let callback = self.recording_callback(slot, &label);
            spawner
                .spawn(entry.kind, callback, duration, entry.options())
                .with_context(|| format!("Invalid timer `{label}`"))?
        };

        self.watch_events(&*unit, slot, &label);
        debug!(timer = %label, id = unit.id(), kind = entry.kind.name(), "timer built");
        self.units.borrow_mut().push((slot, unit.clone()));
        Ok(unit)
    }

    fn recording_callback(&self, slot: usize, label: &str) -> Callback {
        let reports = self.reports.clone();
        let label = label.to_string();
        Callback::function(move |payload: &TimerPayload| {
            let value = payload.value.as_ref().map(|value| match value {
                TimerValue::Scalar(v) => vec![*v],
                TimerValue::List(values) => values.clone(),
            });
            info!(
                timer = %label,
                frame = payload.frame,
                running_time = payload.running_time,
                count = payload.count,
                skipped = payload.skipped_count,
                value = ?value,
                "fired"
            );
            if let Some(report) = reports.borrow_mut().get_mut(slot) {
                report.fires += 1;
                report.skipped += payload.skipped_count;
                if value.is_some() {
                    report.last_value = value;
                }
            }
        })
    }

    fn watch_events(&self, unit: &dyn Animation, slot: usize, label: &str) {
        for kind in [EventKind::Complete, EventKind::End, EventKind::Stop] {
            let reports = self.reports.clone();
            let label = label.to_string();
            unit.attach(
                kind,
                handler(move |event| {
                    info!(timer = %label, event = %event.kind, count = ?event.count, "event");
                    if let Some(report) = reports.borrow_mut().get_mut(slot) {
                        match event.kind {
                            EventKind::Complete => report.completed = true,
                            EventKind::End => report.ends += 1,
                            _ => {}
                        }
                    }
                }),
            );
        }
    }

    /// Drive every tick of the loop and summarize
    pub fn run(self, scenario: &Scenario) -> Summary {
        let driver = &scenario.driver;
        let mut elapsed_ms = 0;
        for tick in 0..driver.frames {
            let (frame, duration) = driver.tick(tick);
            if Some(tick) == driver.rewind_at {
                info!(tick, "rewinding frame index");
            }
            self.service.run(frame, duration);
            elapsed_ms += duration;
        }

        let active = self.service.active_count();
        let mut timers = self.reports.borrow().clone();
        for (slot, unit) in self.units.borrow().iter() {
            if let Some(report) = timers.get_mut(*slot) {
                report.playing = unit.is_playing();
            }
        }

        Summary {
            frames: driver.frames,
            elapsed_ms,
            active,
            timers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(source: &str) -> Summary {
        let scenario = Scenario::parse(source).unwrap();
        Simulation::build(&scenario).unwrap().run(&scenario)
    }

    #[test]
    fn test_delay_and_repeat_reports() {
        let summary = simulate(
            r#"
[loop]
frames = 20

[[timers]]
name = "once"
kind = "delay"
duration = 100

[[timers]]
name = "tick"
kind = "repeat"
duration = 160
"#,
        );

        assert_eq!(summary.elapsed_ms, 320);
        let once = &summary.timers[0];
        assert_eq!(once.fires, 1);
        assert!(once.completed && !once.playing);

        let tick = &summary.timers[1];
        assert_eq!(tick.fires, 2);
        assert!(tick.playing && !tick.completed);
        assert_eq!(summary.active, 1);
    }

    #[test]
    fn test_stall_is_reported_as_skipped() {
        let summary = simulate(
            r#"
[loop]
frames = 4
stalls = [{ frame = 2, duration = 1000 }]

[[timers]]
kind = "repeat"
duration = 300
"#,
        );

        let repeat = &summary.timers[0];
        assert_eq!(repeat.fires, 2);
        assert_eq!(repeat.skipped, 2);
    }

    #[test]
    fn test_queue_children_are_reported() {
        let summary = simulate(
            r#"
[loop]
frames = 30

[[timers]]
name = "intro"
kind = "queue"

[[timers.steps]]
kind = "delay"
duration = 32

[[timers.steps]]
kind = "cycle"
duration = 64
values = [1, 2]
loop = 1
"#,
        );

        assert_eq!(summary.timers.len(), 3);
        assert_eq!(summary.timers[1].name, "intro/delay#0");
        assert_eq!(summary.timers[2].fires, 2);
        assert_eq!(summary.timers[2].last_value, Some(vec![2.0]));
        let queue = &summary.timers[0];
        assert_eq!(queue.ends, 1);
        assert!(queue.completed && !queue.playing);
        assert_eq!(summary.active, 0);
    }

    #[test]
    fn test_invalid_timer_fails_build() {
        let scenario = Scenario::parse(
            "[[timers]]\nkind = \"transition\"\nduration = 100\neasing = \"wobble\"\n",
        )
        .unwrap();
        assert!(Simulation::build(&scenario).is_err());
    }
}
