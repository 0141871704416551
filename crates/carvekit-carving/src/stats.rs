//! Statistics over a generated G-code program.
//!
//! Walks the emitted text and accumulates move counts, travelled distances
//! and a feed-rate-based duration estimate. Used by the CLI to report what a
//! job will cost before it is sent to a machine.

use carvekit_geom::Pt3;

/// Aggregate statistics for one G-code program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramStats {
    /// Total number of instruction lines.
    pub lines: usize,
    /// Rapid (G0) moves.
    pub rapid_moves: usize,
    /// Linear cutting (G1) moves.
    pub cutting_moves: usize,
    /// Arc (G2/G3) moves.
    pub arc_moves: usize,
    /// Distance covered by rapids, in mm.
    pub rapid_distance: f64,
    /// Distance covered at feed rate, in mm. Arcs contribute their chord.
    pub cutting_distance: f64,
    /// Deepest commanded Z, in mm.
    pub min_z: f64,
    /// Estimated machining time in seconds, from feed rates; rapids are
    /// assumed instantaneous.
    pub estimated_seconds: f64,
}

impl ProgramStats {
    /// Computes statistics for a program, starting from the machine origin.
    pub fn from_gcode(gcode: &str) -> Self {
        let mut stats = ProgramStats::default();
        let mut pos = Pt3::new(0.0, 0.0, 0.0);
        let mut feed_rate = 0.0;

        for line in gcode.lines() {
            if line.is_empty() {
                continue;
            }
            stats.lines += 1;

            let mut words = line.split_whitespace();
            let Some(command) = words.next() else {
                continue;
            };

            let mut target = pos;
            for word in words {
                let (letter, value) = word.split_at(1);
                let Ok(value) = value.parse::<f64>() else {
                    continue;
                };
                match letter {
                    "X" => target.x = value,
                    "Y" => target.y = value,
                    "Z" => target.z = value,
                    "F" => feed_rate = value,
                    _ => {}
                }
            }

            match command {
                "G0" => {
                    let dist = (target - pos).length();
                    stats.rapid_moves += 1;
                    stats.rapid_distance += dist;
                }
                "G1" | "G2" | "G3" => {
                    let dist = (target - pos).length();
                    if command == "G1" {
                        stats.cutting_moves += 1;
                    } else {
                        stats.arc_moves += 1;
                    }
                    stats.cutting_distance += dist;
                    if feed_rate > 0.0 {
                        stats.estimated_seconds += dist / feed_rate * 60.0;
                    }
                }
                // Homing and modal words do not move the tool in a way the
                // estimate cares about.
                _ => continue,
            }

            pos = target;
            stats.min_z = stats.min_z.min(pos.z);
        }

        stats
    }

    /// Total travelled distance, in mm.
    pub fn total_distance(&self) -> f64 {
        self.rapid_distance + self.cutting_distance
    }
}
