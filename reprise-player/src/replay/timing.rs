//! Async-mode timing loop.
//!
//! Runs on its own thread while the sender is in async mode. Each pass holds
//! the engine lock for one frame: wait until the frame is due, filter it,
//! deliver it. Waits are cut into poll-interval slices so pause, jump,
//! restart and stop requests are seen within one interval; an interrupted
//! wait keeps its frame pending for the next pass.

use log::{debug, error, info, warn};
use std::sync::{Arc, MutexGuard};
use std::thread;
use std::time::Duration;

use reprise_core::Pacing;

use super::sender::{Control, Engine, Shared};

pub(crate) fn run(shared: Arc<Shared>) {
    let control = &shared.control;
    debug!("Timing loop started");

    loop {
        if control.should_stop() {
            break;
        }

        if control.is_paused()
            && control.is_world_loaded()
            && !control.restart_requested()
            && control.hurry_target().is_none()
        {
            wait_while_paused(control);
            continue;
        }

        let mut engine = shared.engine();
        if engine.is_released() {
            break;
        }

        if control.restart_requested() {
            if let Err(e) = engine.restart(control) {
                error!("Failed to reopen packet log: {}", e);
                engine.fail(control, e);
                break;
            }
            continue;
        }

        let frame = match engine.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                end_of_log(control, engine);
                continue;
            }
            Err(e) if e.is_end_of_log() => {
                warn!("Packet log ends with a damaged frame: {}", e);
                end_of_log(control, engine);
                continue;
            }
            Err(e) => {
                warn!("Failed to read frame: {}", e);
                drop(engine);
                thread::sleep(control.poll_interval);
                continue;
            }
        };

        let hurry = control.hurry_target();
        if hurry.is_none() && control.is_world_loaded() && !wait_for_frame(control, frame.timestamp_ms)
        {
            engine.hold(frame);
            continue;
        }
        control.mark_sent();

        let timestamp = frame.timestamp_ms;
        let last = control.last_timestamp();
        let pacing = Pacing::Async {
            hurry_remaining_ms: hurry.map(|target| target as i64 - last as i64),
        };
        if let Err(e) = engine.process(frame, pacing, control) {
            engine.fail(control, e);
            break;
        }
        control.set_last_timestamp(timestamp);

        if let Some(target) = hurry {
            if timestamp > target && !control.restart_requested() {
                finish_hurry(&mut engine, control, target);
            }
        }
    }

    debug!("Timing loop stopped");
}

fn wait_while_paused(control: &Control) {
    while control.is_paused()
        && control.is_world_loaded()
        && !control.restart_requested()
        && control.hurry_target().is_none()
        && !control.should_stop()
    {
        thread::sleep(control.poll_interval);
    }
    control.mark_sent();
}

/// Sleep until the frame at `timestamp` is due.
///
/// Returns `false` if something happened that needs the frame to wait.
fn wait_for_frame(control: &Control, timestamp: u32) -> bool {
    let gap_ms = timestamp.saturating_sub(control.last_timestamp()) as f64;
    loop {
        if control.should_stop()
            || control.restart_requested()
            || control.hurry_target().is_some()
            || control.is_paused()
        {
            return false;
        }
        // Speed may change while waiting
        let due = Duration::try_from_secs_f64(gap_ms / control.speed() / 1000.0)
            .unwrap_or(Duration::MAX);
        let elapsed = control.since_last_sent();
        if elapsed >= due {
            return true;
        }
        thread::sleep((due - elapsed).min(control.poll_interval));
    }
}

fn finish_hurry(engine: &mut Engine, control: &Control, target: u32) {
    if !control.finish_hurry(target) {
        return;
    }
    debug!(
        "Caught up with jump to {}ms at {}ms",
        target,
        control.last_timestamp()
    );
    engine.move_camera_to_target();
    if control.pause_after_jump {
        control.set_paused(true);
    }
}

/// Pause at the end, then start over once resumed or asked to jump
fn end_of_log(control: &Control, mut engine: MutexGuard<'_, Engine>) {
    info!("Reached end of log at {}ms", control.last_timestamp());
    if let Some(target) = control.hurry_target() {
        // Jump target lies past the last frame
        finish_hurry(&mut engine, control, target);
    }
    engine.reached_end();
    control.set_paused(true);
    drop(engine);

    while control.is_paused()
        && control.hurry_target().is_none()
        && !control.restart_requested()
        && !control.should_stop()
    {
        thread::sleep(control.poll_interval);
    }
    if !control.should_stop() {
        control.request_restart();
    }
}
