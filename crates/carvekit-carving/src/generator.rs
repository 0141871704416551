//! The code-generation interface the carving engine emits into.

use crate::error::Result;

/// Receives toolpath primitives and serialises them to machine code.
///
/// A carving path is built up as: one `start_path`, any number of `move_to` /
/// arc calls, then `end_path`. Until `end_path` the generator only buffers;
/// passing `discard = true` drops the buffered path instead of emitting it.
/// Feed-rate changes apply to everything emitted afterwards and return the
/// previous rate so callers can restore it.
pub trait CodeGenerator {
    /// Called once before the first path of a job.
    fn start_job(&mut self) -> Result<()>;

    /// Called once after the last path of a job.
    fn end_job(&mut self) -> Result<()>;

    /// Sets the feed rate for horizontal cutting moves, returning the old
    /// rate in mm/min.
    fn change_horizontal_feed_rate(&mut self, new_rate: f64) -> f64;

    /// Sets the feed rate for vertical (plunge/retract) moves, returning the
    /// old rate in mm/min.
    fn change_vertical_feed_rate(&mut self, new_rate: f64) -> f64;

    /// Begins a new path at the given position, discarding any unfinished
    /// buffered path.
    fn start_path(&mut self, x: f64, y: f64, depth: f64);

    /// Appends a straight segment to the current path.
    fn move_to(&mut self, x: f64, y: f64, depth: f64);

    /// Appends a clockwise arc of the given radius ending at the position.
    fn cw_arc_to(&mut self, x: f64, y: f64, depth: f64, radius: f64);

    /// Appends a counter-clockwise arc of the given radius ending at the
    /// position.
    fn ccw_arc_to(&mut self, x: f64, y: f64, depth: f64, radius: f64);

    /// Finishes the current path: simplifies and emits it, or drops it when
    /// `discard` is set.
    fn end_path(&mut self, discard: bool) -> Result<()>;
}
